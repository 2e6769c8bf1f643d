//! Chunk-source records produced by the upstream splitter.
//!
//! One JSON file per document:
//!
//! ```json
//! { "metainfo": { "sha1": "…", "file_name": "manual.pdf" },
//!   "content":  { "chunks": [ { "lines": [3, 9], "text": "…", "page": 2 } ] } }
//! ```
//!
//! Everything here is pure: parsing and reconstruction never touch caches.

use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::page::resolve_page;
use crate::types::{Chunk, Meta, Span};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceDocument {
    #[serde(default)]
    pub metainfo: MetaInfo,
    #[serde(default)]
    pub content: SourceContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaInfo {
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceContent {
    #[serde(default)]
    pub chunks: Vec<SourceEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceEntry {
    #[serde(default)]
    pub lines: Vec<u32>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub chunk_id: Option<String>,
}

impl SourceDocument {
    /// Read and parse one source file. Any I/O or JSON failure is reported as
    /// `MalformedSource` so scans can skip the file and move on.
    pub fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| Error::MalformedSource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::MalformedSource {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn content_hash(&self) -> Option<&str> {
        self.metainfo.sha1.as_deref().filter(|h| !h.is_empty())
    }

    /// Stem of `metainfo.file_name`, else the stem of the file it was read from.
    pub fn document_name(&self, path: &Path) -> String {
        self.metainfo
            .file_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(Path::new)
            .unwrap_or(path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Default chunk id for entry `ordinal` of the document hashed `doc_key`.
pub fn chunk_id(doc_key: &str, ordinal: usize) -> String {
    format!("{doc_key}_{ordinal}")
}

/// Split `{doc_key}_{ordinal}` at the last underscore.
///
/// Only the canonical decimal spelling is accepted (`H_2`, never `H_02` or
/// `H_+2`), so one source entry maps to exactly one id.
pub fn parse_chunk_id(id: &str) -> Option<(&str, usize)> {
    let (key, raw) = id.rsplit_once('_')?;
    if key.is_empty() {
        return None;
    }
    let ordinal: usize = raw.parse().ok()?;
    (ordinal.to_string() == raw).then_some((key, ordinal))
}

/// Rebuild entry `ordinal` of `doc` as the chunk `{hash}_{ordinal}`, or `None`
/// when the document has no content hash, the ordinal is out of range, or the
/// entry is blank.
pub fn reconstruct(doc: &SourceDocument, path: &Path, ordinal: usize) -> Option<Chunk> {
    let doc_key = doc.content_hash()?;
    let entry = doc.content.chunks.get(ordinal)?;
    entry_to_chunk(doc, doc_key, &doc.document_name(path), chunk_id(doc_key, ordinal), entry)
}

/// All non-blank entries of `doc`, in source order.
pub fn chunks(doc: &SourceDocument, path: &Path) -> Vec<Chunk> {
    let Some(doc_key) = doc.content_hash() else { return Vec::new() };
    let name = doc.document_name(path);
    doc.content
        .chunks
        .iter()
        .enumerate()
        .filter_map(|(ordinal, entry)| {
            let id = entry
                .chunk_id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| chunk_id(doc_key, ordinal));
            entry_to_chunk(doc, doc_key, &name, id, entry)
        })
        .collect()
}

fn entry_to_chunk(
    doc: &SourceDocument,
    doc_key: &str,
    name: &str,
    id: String,
    entry: &SourceEntry,
) -> Option<Chunk> {
    if entry.text.trim().is_empty() {
        return None;
    }
    let position = match entry.lines.as_slice() {
        [] => Span::default(),
        [only] => Span { start: *only, end: *only },
        [start, end, ..] => Span { start: *start, end: *end },
    };
    let mut metadata = Meta::new();
    metadata.insert("sha1".into(), json!(doc_key));
    if let Some(file_name) = &doc.metainfo.file_name {
        metadata.insert("file_name".into(), json!(file_name));
    }
    metadata.insert("lines".into(), json!(entry.lines));
    Some(Chunk {
        id,
        doc_key: doc_key.to_string(),
        document_name: name.to_string(),
        text: entry.text.clone(),
        section_path: Vec::new(),
        position,
        page: resolve_page(entry.page, &entry.text),
        metadata,
    })
}
