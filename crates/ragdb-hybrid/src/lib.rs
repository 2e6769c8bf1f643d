//! ragdb-hybrid
//!
//! Score fusion and the retrieval pipeline that ties the chunk store, the
//! vector shards, the lexical index, the embedder and the reranker together.
pub mod fusion;
pub mod retriever;

pub use fusion::{fuse, FusionWeights};
pub use retriever::{HybridRetriever, RetrievalResult, SearchMode, SearchRequest};
