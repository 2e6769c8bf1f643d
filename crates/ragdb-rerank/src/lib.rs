//! ragdb-rerank
//!
//! Reordering of hydrated candidates by an external relevance service, with a
//! deterministic fallback whenever the service is missing, slow or failing.
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use ragdb_core::config::RerankSettings;
use ragdb_core::traits::{RerankProvider, RerankScore};
use ragdb_core::types::ScoredChunk;

pub mod jina;

pub use jina::JinaReranker;

pub struct Reranker {
    provider: Option<Arc<dyn RerankProvider>>,
    timeout: Duration,
}

impl Reranker {
    pub fn new(provider: Arc<dyn RerankProvider>, timeout: Duration) -> Self {
        Self { provider: Some(provider), timeout }
    }

    /// Reranker that always uses the fallback order.
    pub fn disabled() -> Self {
        Self { provider: None, timeout: Duration::ZERO }
    }

    pub fn from_settings(settings: &RerankSettings) -> Self {
        if !settings.enabled {
            debug!("rerank disabled by configuration");
            return Self::disabled();
        }
        match JinaReranker::from_settings(settings) {
            Ok(provider) => Self::new(Arc::new(provider), Duration::from_secs(settings.timeout_secs)),
            Err(e) => {
                warn!(error = %e, "rerank service not configured, using fallback order");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Reorder `candidates` by relevance to `query` and keep the best `k`.
    ///
    /// Never fails: when the provider is absent, errors, or misses `deadline`
    /// (or its own timeout, whichever is sooner) the result is
    /// [`fallback_order`]. On success every returned chunk carries the
    /// provider's relevance score.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
        k: usize,
        deadline: Option<Instant>,
    ) -> Vec<ScoredChunk> {
        if k == 0 || candidates.is_empty() {
            return Vec::new();
        }
        let Some(provider) = &self.provider else {
            return fallback_order(candidates, k);
        };
        let deadline = earliest(deadline, Instant::now().checked_add(self.timeout));
        let documents: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();

        let call = provider.rerank(query, &documents, k);
        let outcome = match deadline {
            Some(at) => tokio::time::timeout_at(at, call).await,
            None => Ok(call.await),
        };
        match outcome {
            Ok(Ok(scores)) => {
                let reranked = apply_scores(&candidates, &scores, k);
                if reranked.is_empty() {
                    warn!(returned = scores.len(), "rerank response had no usable indices, using fallback order");
                    return fallback_order(candidates, k);
                }
                reranked
            }
            Ok(Err(e)) => {
                error!(error = %e, "rerank failed, using fallback order");
                fallback_order(candidates, k)
            }
            Err(_) => {
                error!(timeout_ms = self.timeout.as_millis() as u64, "rerank timed out, using fallback order");
                fallback_order(candidates, k)
            }
        }
    }
}

/// The sooner of two optional deadlines. An unrepresentable one is `None`
/// and imposes no limit.
fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Candidates sorted by their existing score, highest first, ties in input
/// order, truncated to `k`.
pub fn fallback_order(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(k);
    candidates
}

/// Candidates named by `scores`, rescored with the provider's relevance and
/// sorted by it. Out-of-range and repeated indices are dropped.
pub fn apply_scores(candidates: &[ScoredChunk], scores: &[RerankScore], k: usize) -> Vec<ScoredChunk> {
    let mut seen = vec![false; candidates.len()];
    let mut out = Vec::with_capacity(scores.len().min(k));
    for s in scores {
        match candidates.get(s.index) {
            Some(c) if !seen[s.index] => {
                seen[s.index] = true;
                out.push(ScoredChunk { chunk: c.chunk.clone(), score: s.relevance });
            }
            Some(_) => debug!(index = s.index, "duplicate rerank index"),
            None => warn!(index = s.index, candidates = candidates.len(), "rerank index out of range"),
        }
    }
    out.sort_by(|a, b| b.score.total_cmp(&a.score));
    out.truncate(k);
    out
}
