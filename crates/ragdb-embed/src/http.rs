//! OpenAI-compatible embeddings client (`POST {base_url}/embeddings`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use ragdb_core::config::EmbeddingSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Embedder;

const SERVICE: &str = "embedding";

pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
    max_batch: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::unavailable(SERVICE, e))?;
        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
            dim: settings.dimension,
            max_batch: settings.max_batch.max(1),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let mut req = self.client.post(&url).json(&EmbeddingRequest { input: texts, model: &self.model });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.map_err(|e| Error::unavailable(SERVICE, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::unavailable(SERVICE, format!("API error {status}: {body}")));
        }

        let mut parsed: EmbeddingResponse =
            response.json().await.map_err(|e| Error::unavailable(SERVICE, format!("parse error: {e}")))?;
        parsed.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        if parsed.data.len() != texts.len() {
            return Err(Error::unavailable(
                SERVICE,
                format!("sent {} texts, got {} embeddings", texts.len(), parsed.data.len()),
            ));
        }
        if let Some(bad) = parsed.data.iter().find(|d| d.embedding.len() != self.dim) {
            return Err(Error::unavailable(
                SERVICE,
                format!("embedding dimension {} does not match configured {}", bad.embedding.len(), self.dim),
            ));
        }
        debug!(count = parsed.data.len(), "generated embeddings");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_batch(&self) -> usize {
        self.max_batch
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for slice in texts.chunks(self.max_batch) {
            out.extend(self.request(slice).await?);
        }
        Ok(out)
    }
}
