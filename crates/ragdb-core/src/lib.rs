//! ragdb-core
//!
//! Shared vocabulary of the retrieval engine: chunk and candidate types, the
//! error taxonomy, provider traits, configuration, the chunk-source format and
//! the self-healing [`store::ChunkStore`].

pub mod config;
pub mod error;
pub mod page;
pub mod source;
pub mod store;
pub mod traits;
pub mod types;
