use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::Candidate;

/// Upstream embedding provider.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    /// Largest number of texts accepted by one `embed_batch` call.
    fn max_batch(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::unavailable("embedding", "empty response"))
    }
}

/// Relevance score for the document at `index` of a rerank request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerankScore {
    pub index: usize,
    pub relevance: f32,
}

/// Upstream cross-encoder style relevance service.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankScore>>;
}

pub trait TextIndexer: Send + Sync {
    /// Up to `k` strictly positive keyword matches, optionally limited to one document.
    fn search(&self, query: &str, k: usize, scope: Option<&str>) -> anyhow::Result<Vec<Candidate>>;
}

pub trait VectorIndexer: Send + Sync {
    /// Top `k` neighbours of `query`, from one shard when `scope` is set.
    fn search_vec(&self, query: &[f32], k: usize, scope: Option<&str>) -> Vec<Candidate>;
}
