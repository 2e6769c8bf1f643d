//! ragdb-vector
//!
//! Exact nearest-neighbour search over per-document embedding shards.
//! `format` owns the on-disk artifacts, `shard` one document's vectors and
//! `registry` the loaded set with scoped and scatter-gather search.
pub mod format;
pub mod math;
pub mod registry;
pub mod shard;

pub use registry::{ShardIndex, ShardInfo};
pub use shard::Shard;
