//! Lightweight configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RETRIEVAL__VECTOR_WEIGHT`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against the directory the config files were read from.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Upper bound for any configured timeout, one day.
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current working directory.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Load `config.toml` and the env-specific overlay from `dir`.
    pub fn load_from(dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.settings()?;
        Ok(config)
    }

    /// Typed, validated settings with data paths resolved against the config directory.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.data.resolve_paths(&self.base_dir);
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub rerank: RerankSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.vector_weight < 0.0 || r.lexical_weight < 0.0 {
            return Err(Error::InvalidConfig("fusion weights must be non-negative".into()));
        }
        if r.lexical_norm <= 0.0 {
            return Err(Error::InvalidConfig("retrieval.lexical_norm must be positive".into()));
        }
        if self.embedding.max_batch == 0 {
            return Err(Error::InvalidConfig("embedding.max_batch must be at least 1".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be at least 1".into()));
        }
        if r.request_timeout_ms > MAX_TIMEOUT_SECS * 1000 {
            return Err(Error::InvalidConfig(format!(
                "retrieval.request_timeout_ms must be at most {}",
                MAX_TIMEOUT_SECS * 1000
            )));
        }
        for (name, secs) in [("embedding.timeout_secs", self.embedding.timeout_secs), ("rerank.timeout_secs", self.rerank.timeout_secs)] {
            if secs > MAX_TIMEOUT_SECS {
                return Err(Error::InvalidConfig(format!("{name} must be at most {MAX_TIMEOUT_SECS}")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Directory of per-document chunk-source JSON files.
    pub chunk_source_dir: PathBuf,
    /// Directory holding `{key}.shard` / `{key}.shard.ids` pairs.
    pub shard_dir: PathBuf,
    /// Persisted ChunkStore snapshot.
    pub metadata_path: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            chunk_source_dir: PathBuf::from("./data/chunked_reports"),
            shard_dir: PathBuf::from("./data/vector_dbs"),
            metadata_path: PathBuf::from("./data/chunks.json"),
        }
    }
}

impl DataSettings {
    fn resolve_paths(&mut self, base: &Path) {
        self.chunk_source_dir = resolve_with_base(base, self.chunk_source_dir.to_string_lossy());
        self.shard_dir = resolve_with_base(base, self.shard_dir.to_string_lossy());
        self.metadata_path = resolve_with_base(base, self.metadata_path.to_string_lossy());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub vector_weight: f32,
    pub lexical_weight: f32,
    /// Raw lexical scores are divided by this before weighting.
    pub lexical_norm: f32,
    /// Candidates requested from each signal.
    pub candidate_pool: usize,
    /// Fused ids considered for hydration in hybrid mode.
    pub hydrate_limit: usize,
    pub default_k: usize,
    pub request_timeout_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            vector_weight: 0.7,
            lexical_weight: 0.3,
            lexical_norm: 10.0,
            candidate_pool: 50,
            hydrate_limit: 20,
            default_k: 10,
            request_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Hash,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingBackend,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub dimension: usize,
    pub max_batch: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Hash,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            dimension: 1024,
            max_batch: 10,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.jina.ai/v1/rerank".to_string(),
            model: "jina-reranker-v2-base-multilingual".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
