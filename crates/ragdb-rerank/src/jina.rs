//! Jina-style rerank endpoint: `{model, query, documents, top_n}` in,
//! `{results: [{index, relevance_score}]}` out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use ragdb_core::config::RerankSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{RerankProvider, RerankScore};

const SERVICE: &str = "rerank";

pub struct JinaReranker {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    #[serde(default)]
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    #[serde(default)]
    relevance_score: f32,
}

impl JinaReranker {
    /// Client for `settings.base_url`. The key comes from settings, else
    /// `JINA_API_KEY`; without one the service is reported unavailable.
    pub fn from_settings(settings: &RerankSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .or_else(|| std::env::var("JINA_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::unavailable(SERVICE, "no API key configured"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::unavailable(SERVICE, e))?;
        Ok(Self { client, url: settings.base_url.clone(), model: settings.model.clone(), api_key })
    }
}

#[async_trait]
impl RerankProvider for JinaReranker {
    async fn rerank(&self, query: &str, documents: &[String], top_n: usize) -> Result<Vec<RerankScore>> {
        let body = RerankRequest { model: &self.model, query, documents, top_n };
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::unavailable(SERVICE, format!("request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::unavailable(SERVICE, format!("API error {status}: {text}")));
        }
        let parsed: RerankResponse =
            response.json().await.map_err(|e| Error::unavailable(SERVICE, format!("parse error: {e}")))?;
        debug!(results = parsed.results.len(), "rerank response");
        Ok(parsed
            .results
            .into_iter()
            .map(|r| RerankScore { index: r.index, relevance: r.relevance_score })
            .collect())
    }
}
