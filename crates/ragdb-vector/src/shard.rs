use tracing::warn;

use ragdb_core::types::{Candidate, ChunkId, Metric};

use crate::format::ShardData;
use crate::math::{dot, normalized, squared_l2};

/// One document's embeddings with the chunk id of every row.
///
/// Cosine shards hold unit-length rows, so similarity is a plain dot product
/// against the normalized query. L2 shards report squared distance.
#[derive(Debug, Clone)]
pub struct Shard {
    key: String,
    data: ShardData,
    ids: Vec<ChunkId>,
}

impl Shard {
    pub fn new(key: impl Into<String>, data: ShardData, ids: Vec<ChunkId>) -> Self {
        Self { key: key.into(), data, ids }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn metric(&self) -> Metric {
        self.data.metric
    }

    pub fn dim(&self) -> usize {
        self.data.dim
    }

    pub fn rows(&self) -> usize {
        self.data.rows
    }

    pub fn ids(&self) -> &[ChunkId] {
        &self.ids
    }

    /// Top `k` rows for `query`, best first, mapped to chunk ids.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Candidate> {
        if k == 0 || self.data.rows == 0 {
            return Vec::new();
        }
        if query.len() != self.data.dim {
            warn!(shard = %self.key, expected = self.data.dim, got = query.len(), "query dimension mismatch");
            return Vec::new();
        }
        let metric = self.data.metric;
        let mut scored: Vec<(usize, f32)> = match metric {
            Metric::Cosine => {
                let q = normalized(query);
                (0..self.data.rows).map(|i| (i, dot(&q, self.data.row(i)))).collect()
            }
            Metric::L2 => (0..self.data.rows).map(|i| (i, squared_l2(query, self.data.row(i)))).collect(),
        };
        match metric {
            Metric::Cosine => scored.sort_by(|a, b| b.1.total_cmp(&a.1)),
            Metric::L2 => scored.sort_by(|a, b| a.1.total_cmp(&b.1)),
        }
        scored.truncate(k);

        let kind = metric.score_kind();
        scored
            .into_iter()
            .filter_map(|(pos, score)| match self.ids.get(pos) {
                Some(id) => Some(Candidate::new(id.clone(), score, kind)),
                None => {
                    warn!(shard = %self.key, position = pos, ids = self.ids.len(), "vector position has no chunk id");
                    None
                }
            })
            .collect()
    }
}
