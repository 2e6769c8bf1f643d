//! ragdb-embed
//!
//! Embedding providers behind the `ragdb_core::traits::Embedder` seam: a
//! deterministic hashing embedder for development and tests, and an
//! OpenAI-compatible HTTP client.
use tracing::info;

use ragdb_core::config::{EmbeddingBackend, EmbeddingSettings};
use ragdb_core::error::Result;
use ragdb_core::traits::Embedder;

pub mod batch;
pub mod hash;
pub mod http;

pub use batch::embed_in_batches;
pub use hash::HashEmbedder;
pub use http::HttpEmbedder;

/// True when `APP_USE_FAKE_EMBEDDINGS` is `1` or `true`.
pub fn fake_embeddings_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Embedder selected by `settings`, overridden by `APP_USE_FAKE_EMBEDDINGS`.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if fake_embeddings_requested() || settings.provider == EmbeddingBackend::Hash {
        info!(dim = settings.dimension, "using hash embedder");
        return Ok(Box::new(HashEmbedder::new(settings.dimension).with_max_batch(settings.max_batch)));
    }
    info!(model = %settings.model, base_url = %settings.base_url, "using HTTP embedder");
    Ok(Box::new(HttpEmbedder::from_settings(settings)?))
}
