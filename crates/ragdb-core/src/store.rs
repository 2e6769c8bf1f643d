//! Canonical chunk lookup with lazy reconstruction from chunk-source files.
//!
//! The vector, lexical and metadata stores are written at different times and
//! can disagree for a while. A miss here is therefore an expected outcome:
//! [`ChunkStore::get`] first tries to re-derive the chunk from the source
//! directory and only then reports `None`.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::source::{self, SourceDocument};
use crate::types::{Chunk, ChunkId, DocumentScope};

pub struct ChunkStore {
    source_dir: PathBuf,
    chunks: RwLock<HashMap<ChunkId, Chunk>>,
    scans: AtomicUsize,
}

impl ChunkStore {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self { source_dir: source_dir.into(), chunks: RwLock::new(HashMap::new()), scans: AtomicUsize::new(0) }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn insert(&self, chunk: Chunk) {
        self.chunks.write().insert(chunk.id.clone(), chunk);
    }

    pub fn extend(&self, chunks: impl IntoIterator<Item = Chunk>) {
        let mut map = self.chunks.write();
        for chunk in chunks {
            map.insert(chunk.id.clone(), chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    /// Number of source-directory scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    /// Cached chunk, or one reconstructed from the source directory and cached.
    pub fn get(&self, id: &str) -> Option<Chunk> {
        if let Some(chunk) = self.chunks.read().get(id) {
            return Some(chunk.clone());
        }
        let Some((doc_key, ordinal)) = source::parse_chunk_id(id) else {
            debug!(chunk_id = id, "chunk id is not in {{hash}}_{{ordinal}} form");
            return None;
        };
        let chunk = self.reconstruct(doc_key, ordinal)?;
        // Racing reconstructions produce identical chunks; keep the first.
        let mut map = self.chunks.write();
        Some(map.entry(chunk.id.clone()).or_insert(chunk).clone())
    }

    pub fn require(&self, id: &str) -> Result<Chunk> {
        self.get(id).ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn reconstruct(&self, doc_key: &str, ordinal: usize) -> Option<Chunk> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        for (path, doc) in self.source_documents() {
            if doc.content_hash() != Some(doc_key) {
                continue;
            }
            match source::reconstruct(&doc, &path, ordinal) {
                Some(chunk) => {
                    debug!(chunk_id = %chunk.id, file = %path.display(), "reconstructed chunk from source");
                    return Some(chunk);
                }
                None => debug!(doc_key, ordinal, file = %path.display(), "source has no usable entry at ordinal"),
            }
        }
        None
    }

    /// Parsed source files in name order. Unreadable files are logged and skipped.
    fn source_documents(&self) -> impl Iterator<Item = (PathBuf, SourceDocument)> {
        source_files(&self.source_dir).into_iter().filter_map(|path| match SourceDocument::read(&path) {
            Ok(doc) => Some((path, doc)),
            Err(e) => {
                warn!(error = %e, "skipping chunk source");
                None
            }
        })
    }

    /// Populate the store from every source file. Returns the number of chunks added.
    pub fn load_sources(&self) -> usize {
        let mut added = 0usize;
        for (path, doc) in self.source_documents() {
            let chunks = source::chunks(&doc, &path);
            added += chunks.len();
            self.extend(chunks);
        }
        info!(chunks = added, dir = %self.source_dir.display(), "loaded chunk sources");
        added
    }

    /// Persist the known chunks as a JSON object keyed by chunk id.
    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let map = self.chunks.read();
        let ordered: std::collections::BTreeMap<&ChunkId, &Chunk> = map.iter().collect();
        let json = serde_json::to_string_pretty(&ordered).map_err(|e| Error::Operation(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Merge a snapshot written by [`save_snapshot`](Self::save_snapshot).
    /// A missing file is not an error.
    pub fn load_snapshot(&self, path: &Path) -> Result<usize> {
        if !path.exists() {
            warn!(path = %path.display(), "chunk snapshot not found");
            return Ok(0);
        }
        let raw = fs::read_to_string(path)?;
        let map: HashMap<ChunkId, Chunk> = serde_json::from_str(&raw).map_err(|e| Error::MalformedSource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let n = map.len();
        self.extend(map.into_values());
        info!(chunks = n, path = %path.display(), "loaded chunk snapshot");
        Ok(n)
    }

    /// Known chunks sorted by id.
    pub fn snapshot(&self) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self.chunks.read().values().cloned().collect();
        chunks.sort_by(|a, b| a.id.cmp(&b.id));
        chunks
    }

    pub fn document_names(&self) -> BTreeSet<String> {
        self.chunks.read().values().map(|c| c.document_name.clone()).collect()
    }

    /// Resolve a user-supplied document name to its content-hash key.
    ///
    /// Known chunks are consulted first, then `metainfo` of the source files.
    /// Within each pool an exact (case-insensitive, extension-insensitive)
    /// match beats a substring match in either direction.
    pub fn resolve_scope(&self, name: &str) -> Option<DocumentScope> {
        let wanted = normalize_name(name);
        if wanted.is_empty() {
            return None;
        }
        let mut known: Vec<DocumentScope> = {
            let map = self.chunks.read();
            let mut seen = BTreeSet::new();
            map.values()
                .filter(|c| seen.insert(c.doc_key.clone()))
                .map(|c| DocumentScope { key: c.doc_key.clone(), name: c.document_name.clone() })
                .collect()
        };
        known.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(hit) = best_match(&wanted, &known) {
            return Some(hit);
        }
        let from_sources: Vec<DocumentScope> = self
            .source_documents()
            .filter_map(|(path, doc)| {
                let key = doc.content_hash()?.to_string();
                Some(DocumentScope { key, name: doc.document_name(&path) })
            })
            .collect();
        best_match(&wanted, &from_sources)
    }
}

fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    let stem = Path::new(trimmed).file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
    stem.to_lowercase()
}

fn best_match(wanted: &str, pool: &[DocumentScope]) -> Option<DocumentScope> {
    if let Some(exact) = pool.iter().find(|s| normalize_name(&s.name) == wanted || s.key.eq_ignore_ascii_case(wanted)) {
        return Some(exact.clone());
    }
    pool.iter()
        .find(|s| {
            let have = normalize_name(&s.name);
            !have.is_empty() && (have.contains(wanted) || wanted.contains(have.as_str()))
        })
        .cloned()
}

/// Files directly under `dir` whose extension is `ext`, sorted by path. A
/// missing or unreadable directory yields none.
pub fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(ext))
        .collect();
    files.sort();
    files
}

/// `*.json` chunk source files directly under `dir`, sorted.
pub fn source_files(dir: &Path) -> Vec<PathBuf> {
    files_with_extension(dir, "json")
}
