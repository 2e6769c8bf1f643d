use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No document matches scope '{0}'")]
    ScopeNotFound(String),

    #[error("Shard {0} has vector data but no id mapping")]
    ShardDegraded(String),

    #[error("Invalid shard: {0}")]
    InvalidShard(String),

    #[error("{service} unavailable: {reason}")]
    ExternalServiceUnavailable { service: &'static str, reason: String },

    #[error("Malformed chunk source {}: {reason}", path.display())]
    MalformedSource { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn unavailable(service: &'static str, reason: impl ToString) -> Self {
        Error::ExternalServiceUnavailable { service, reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
