use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use ragdb_core::config::RetrievalSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::store::ChunkStore;
use ragdb_core::traits::{Embedder, TextIndexer, VectorIndexer};
use ragdb_core::types::{ChunkId, DocumentScope, ScoredChunk};
use ragdb_rerank::Reranker;
use ragdb_text::LexicalIndex;

use crate::fusion::{fuse, FusionWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Embedding similarity only; no lexical signal, no rerank.
    VectorOnly,
    /// Vector and lexical signals fused, then reranked.
    #[default]
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub k: usize,
    pub mode: SearchMode,
    /// Document name (or content-hash key) to restrict the search to.
    pub document: Option<String>,
    /// Budget shared by the embedding and rerank calls.
    pub timeout: Option<Duration>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, k: usize) -> Self {
        Self { query: query.into(), k, mode: SearchMode::default(), document: None, timeout: None }
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn document(mut self, name: impl Into<String>) -> Self {
        self.document = Some(name.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Ranked chunks plus what the answer stage needs to cite them.
///
/// Scores are only comparable within one mode: vector-only results carry
/// similarities, hybrid results carry fused or reranker scores.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunks: Vec<ScoredChunk>,
    pub citation_keys: BTreeSet<u32>,
    pub scope: Option<DocumentScope>,
    pub mode: SearchMode,
}

impl RetrievalResult {
    fn new(chunks: Vec<ScoredChunk>, scope: Option<DocumentScope>, mode: SearchMode) -> Self {
        let citation_keys = chunks.iter().filter_map(|c| c.chunk.page).collect();
        Self { chunks, citation_keys, scope, mode }
    }
}

pub struct HybridRetriever<L, V>
where
    L: TextIndexer,
    V: VectorIndexer,
{
    store: Arc<ChunkStore>,
    vectors: Arc<V>,
    lexical: RwLock<Arc<L>>,
    embedder: Arc<dyn Embedder>,
    reranker: Reranker,
    weights: FusionWeights,
    settings: RetrievalSettings,
}

impl<L, V> HybridRetriever<L, V>
where
    L: TextIndexer,
    V: VectorIndexer,
{
    pub fn new(
        store: Arc<ChunkStore>,
        vectors: Arc<V>,
        lexical: L,
        embedder: Arc<dyn Embedder>,
        reranker: Reranker,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            store,
            vectors,
            lexical: RwLock::new(Arc::new(lexical)),
            embedder,
            reranker,
            weights: FusionWeights::from(&settings),
            settings,
        }
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Swap in a lexical index built by `build` from the store's current chunks.
    pub fn rebuild_lexical_with<F>(&self, build: F) -> anyhow::Result<()>
    where
        F: FnOnce(&[ragdb_core::types::Chunk]) -> anyhow::Result<L>,
    {
        let corpus = self.store.snapshot();
        let index = build(&corpus)?;
        *self.lexical.write() = Arc::new(index);
        info!(chunks = corpus.len(), "rebuilt lexical index");
        Ok(())
    }

    /// Run one retrieval request.
    ///
    /// Only an embedding failure or timeout is an error. A scope that matches
    /// nothing, a failing lexical search, missing chunks and an unavailable
    /// reranker all shrink or reorder the result instead.
    pub async fn retrieve(&self, req: &SearchRequest) -> Result<RetrievalResult> {
        let scope = match &req.document {
            Some(name) => self.resolve_scope(name).await?,
            None => None,
        };
        if req.k == 0 {
            return Ok(RetrievalResult::new(Vec::new(), scope, req.mode));
        }
        let budget = req.timeout.unwrap_or(Duration::from_millis(self.settings.request_timeout_ms));
        // `None` when the budget does not fit in an `Instant`: no deadline at all.
        let deadline = Instant::now().checked_add(budget);

        let embedding = self.embedder.embed(&req.query);
        let outcome = match deadline {
            Some(at) => tokio::time::timeout_at(at, embedding).await,
            None => Ok(embedding.await),
        };
        let query_vec = match outcome {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(Error::unavailable("embedding", format!("timed out after {}ms", budget.as_millis())))
            }
        };

        let scope_key = scope.as_ref().map(|s| s.key.as_str());
        let pool = req.k.max(self.settings.candidate_pool);
        let vector_hits = self.vectors.search_vec(&query_vec, pool, scope_key);
        debug!(hits = vector_hits.len(), scope = scope_key, "vector candidates");

        let chunks = match req.mode {
            SearchMode::VectorOnly => {
                let ranked = vector_hits.iter().map(|c| (c.id.clone(), c.similarity())).collect();
                self.hydrate(ranked, req.k).await?
            }
            SearchMode::Hybrid => {
                let lexical = self.lexical.read().clone();
                let lexical_hits = lexical.search(&req.query, pool, scope_key).unwrap_or_else(|e| {
                    warn!(error = %e, "lexical search failed, continuing with vector candidates only");
                    Vec::new()
                });
                debug!(hits = lexical_hits.len(), "lexical candidates");

                let limit = req.k.max(self.settings.hydrate_limit);
                let ranked = fuse(&vector_hits, &lexical_hits, &self.weights)
                    .into_iter()
                    .take(limit)
                    .map(|hit| (hit.id, hit.score))
                    .collect();
                let hydrated = self.hydrate(ranked, limit).await?;
                self.reranker.rerank(&req.query, hydrated, req.k, deadline).await
            }
        };

        info!(mode = ?req.mode, returned = chunks.len(), scoped = scope.is_some(), "retrieval complete");
        Ok(RetrievalResult::new(chunks, scope, req.mode))
    }

    /// Name lookups may read every source file, so they run on the blocking pool.
    async fn resolve_scope(&self, name: &str) -> Result<Option<DocumentScope>> {
        let store = Arc::clone(&self.store);
        let wanted = name.to_string();
        let resolved = tokio::task::spawn_blocking(move || store.resolve_scope(&wanted))
            .await
            .map_err(|e| Error::Operation(format!("scope resolution task failed: {e}")))?;
        match &resolved {
            Some(s) => debug!(requested = name, key = %s.key, document = %s.name, "resolved document scope"),
            None => warn!(error = %Error::ScopeNotFound(name.to_string()), "searching all documents"),
        }
        Ok(resolved)
    }

    /// Chunks for `ranked` ids in rank order, stopping at `limit`. Ids that
    /// cannot be hydrated are dropped. A cache miss scans the source
    /// directory, so lookups run on the blocking pool.
    async fn hydrate(&self, ranked: Vec<(ChunkId, f32)>, limit: usize) -> Result<Vec<ScoredChunk>> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::with_capacity(limit.min(ranked.len()));
            for (id, score) in ranked {
                if out.len() == limit {
                    break;
                }
                match store.get(&id) {
                    Some(chunk) => out.push(ScoredChunk { chunk, score }),
                    None => warn!(chunk_id = %id, "ranked id has no chunk, dropping"),
                }
            }
            out
        })
        .await
        .map_err(|e| Error::Operation(format!("chunk hydration task failed: {e}")))
    }
}

impl<V: VectorIndexer> HybridRetriever<LexicalIndex, V> {
    /// Rebuild the BM25 index from every chunk the store currently knows.
    pub fn rebuild_lexical(&self) -> anyhow::Result<()> {
        self.rebuild_lexical_with(LexicalIndex::build)
    }
}
