use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use ragdb_core::error::{Error, Result};
use ragdb_core::store::files_with_extension;
use ragdb_core::traits::VectorIndexer;
use ragdb_core::types::{Candidate, ChunkId, Metric};

use crate::format::{self, ShardData};
use crate::math::normalize;
use crate::shard::Shard;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    pub key: String,
    pub dim: usize,
    pub metric: Metric,
    pub rows: usize,
    /// Vector data present but the id mapping is missing or unreadable.
    pub degraded: bool,
}

/// Registry of shards loaded from one directory.
///
/// Shards are immutable once published. Searches take `&self` and need no
/// locking; only ingestion (`build_shard`) mutates the registry.
pub struct ShardIndex {
    dir: PathBuf,
    shards: BTreeMap<String, Shard>,
    degraded: BTreeMap<String, ShardInfo>,
}

impl ShardIndex {
    /// Empty registry writing new shards into `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), shards: BTreeMap::new(), degraded: BTreeMap::new() }
    }

    /// Scan `dir` (non-recursively) for `{key}.shard` files.
    ///
    /// Unreadable or corrupt vector files are skipped. A vector file whose id
    /// list cannot be read is recorded as degraded and never searched.
    pub fn load(dir: impl Into<PathBuf>) -> Self {
        let mut index = Self::new(dir);
        if !index.dir.is_dir() {
            info!(dir = %index.dir.display(), "shard directory not found, starting empty");
            return index;
        }

        for path in files_with_extension(&index.dir, format::VECTOR_EXT) {
            let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else { continue };
            let data = match format::read_vectors(&path) {
                Ok(data) => data,
                Err(e) => {
                    error!(shard = %key, file = %path.display(), error = %e, "skipping unreadable shard");
                    continue;
                }
            };
            match format::read_ids(&format::ids_path(&index.dir, &key)) {
                Ok(ids) => {
                    if ids.len() < data.rows {
                        warn!(shard = %key, ids = ids.len(), rows = data.rows, "id list shorter than vector rows");
                    }
                    index.shards.insert(key.clone(), Shard::new(key, data, ids));
                }
                Err(e) => {
                    warn!(error = %Error::ShardDegraded(key.clone()), cause = %e, "excluding shard");
                    let info = ShardInfo { key: key.clone(), dim: data.dim, metric: data.metric, rows: data.rows, degraded: true };
                    index.degraded.insert(key, info);
                }
            }
        }
        info!(
            dir = %index.dir.display(),
            shards = index.shards.len(),
            degraded = index.degraded.len(),
            "loaded vector shards"
        );
        index
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate, persist and publish the shard for `key`.
    ///
    /// Cosine vectors are normalized before they are written. The shard is
    /// visible to searches only once both artifacts are on disk.
    pub fn build_shard(
        &mut self,
        embeddings: &[Vec<f32>],
        ids: &[ChunkId],
        key: &str,
        metric: Metric,
    ) -> Result<ShardInfo> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(Error::InvalidShard(format!("unusable shard key '{key}'")));
        }
        let Some(first) = embeddings.first() else {
            return Err(Error::InvalidShard(format!("{key}: no embeddings")));
        };
        if embeddings.len() != ids.len() {
            return Err(Error::InvalidShard(format!(
                "{key}: {} embeddings but {} ids",
                embeddings.len(),
                ids.len()
            )));
        }
        let dim = first.len();
        if dim == 0 {
            return Err(Error::InvalidShard(format!("{key}: zero-dimensional embeddings")));
        }
        if let Some(bad) = embeddings.iter().position(|e| e.len() != dim) {
            return Err(Error::InvalidShard(format!(
                "{key}: row {bad} has dimension {}, expected {dim}",
                embeddings[bad].len()
            )));
        }

        let mut vectors = Vec::with_capacity(embeddings.len() * dim);
        for e in embeddings {
            let start = vectors.len();
            vectors.extend_from_slice(e);
            if metric == Metric::Cosine {
                normalize(&mut vectors[start..]);
            }
        }
        let data = ShardData { metric, dim, rows: embeddings.len(), vectors };
        let written = format::write_shard(&self.dir, key, &data, ids).and_then(|()| {
            if format::artifacts_exist(&self.dir, key) {
                Ok(())
            } else {
                Err(Error::InvalidShard(format!("{key}: artifacts missing after write")))
            }
        });
        if let Err(e) = written {
            // The previous build's files are gone, so it must not stay searchable.
            self.shards.remove(key);
            self.degraded.remove(key);
            return Err(e);
        }

        let info = ShardInfo { key: key.to_string(), dim, metric, rows: data.rows, degraded: false };
        self.degraded.remove(key);
        self.shards.insert(key.to_string(), Shard::new(key, data, ids.to_vec()));
        info!(shard = key, rows = info.rows, dim, %metric, "published shard");
        Ok(info)
    }

    /// Top `k` chunk ids for `query`.
    ///
    /// With a scope only that shard is searched; an unknown or degraded scope
    /// yields nothing. Without one every shard is searched in parallel and the
    /// union is ordered by [`Candidate::similarity`], which keeps each metric's
    /// natural direction and makes distances comparable with similarities.
    pub fn search(&self, query: &[f32], k: usize, scope: Option<&str>) -> Vec<Candidate> {
        if k == 0 {
            return Vec::new();
        }
        if let Some(key) = scope {
            return match self.shards.get(key) {
                Some(shard) => shard.search(query, k),
                None => {
                    if self.degraded.contains_key(key) {
                        warn!(shard = key, "scoped search against degraded shard");
                    } else {
                        debug!(shard = key, "scoped search against unknown shard");
                    }
                    Vec::new()
                }
            };
        }

        let shards: Vec<&Shard> = self.shards.values().collect();
        let mut merged: Vec<Candidate> = shards
            .par_iter()
            .map(|shard| shard.search(query, k))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();
        merged.sort_by(|a, b| b.similarity().total_cmp(&a.similarity()));
        merged.truncate(k);
        merged
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.shards.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.shards.contains_key(key)
    }

    pub fn is_degraded(&self, key: &str) -> bool {
        self.degraded.contains_key(key)
    }

    pub fn degraded_keys(&self) -> impl Iterator<Item = &str> {
        self.degraded.keys().map(String::as_str)
    }

    pub fn info(&self, key: &str) -> Option<ShardInfo> {
        if let Some(s) = self.shards.get(key) {
            return Some(ShardInfo { key: key.to_string(), dim: s.dim(), metric: s.metric(), rows: s.rows(), degraded: false });
        }
        self.degraded.get(key).cloned()
    }

    /// Every known shard, healthy and degraded, ordered by key.
    pub fn infos(&self) -> Vec<ShardInfo> {
        let mut all: Vec<ShardInfo> = self.shards.keys().chain(self.degraded.keys()).filter_map(|k| self.info(k)).collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }
}

impl VectorIndexer for ShardIndex {
    fn search_vec(&self, query: &[f32], k: usize, scope: Option<&str>) -> Vec<Candidate> {
        self.search(query, k, scope)
    }
}
