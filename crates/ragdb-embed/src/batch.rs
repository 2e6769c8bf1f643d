use tracing::debug;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Embedder;

/// Embed `texts` in slices of at most `embedder.max_batch()`, calling
/// `on_batch` with the number of texts finished after each slice.
///
/// Output order matches input order. A provider returning the wrong number of
/// vectors for a slice fails the whole call.
pub async fn embed_in_batches<F>(embedder: &dyn Embedder, texts: &[String], mut on_batch: F) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(usize),
{
    let size = embedder.max_batch().max(1);
    let mut out = Vec::with_capacity(texts.len());
    for (n, slice) in texts.chunks(size).enumerate() {
        let vectors = embedder.embed_batch(slice).await?;
        if vectors.len() != slice.len() {
            return Err(Error::unavailable(
                "embedding",
                format!("batch {n}: sent {} texts, got {} vectors", slice.len(), vectors.len()),
            ));
        }
        out.extend(vectors);
        debug!(batch = n, done = out.len(), total = texts.len(), "embedded batch");
        on_batch(out.len());
    }
    Ok(out)
}
