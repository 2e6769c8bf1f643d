//! Domain types shared by the store, the lexical and vector engines, and the
//! retriever.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type ChunkId = String;
pub type Meta = BTreeMap<String, serde_json::Value>;

/// Line span a chunk occupies in its converted source document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

/// A retrievable passage.
///
/// - `id`: unique per (document, position); `{doc_key}_{ordinal}` by default
/// - `doc_key`: content hash of the owning document, also the shard key
/// - `document_name`: human name of the owning document (file stem)
/// - `section_path`: heading trail, outermost first
/// - `page`: page number, explicit or inferred from a page marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_key: String,
    pub document_name: String,
    pub text: String,
    #[serde(default)]
    pub section_path: Vec<String>,
    #[serde(default)]
    pub position: Span,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub metadata: Meta,
}

/// Similarity metric a shard was built with. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Inner product of L2-normalized vectors; higher is better.
    Cosine,
    /// Squared Euclidean distance; lower is better.
    #[serde(alias = "euclidean")]
    L2,
}

impl Metric {
    pub fn tag(self) -> u8 {
        match self {
            Metric::Cosine => 0,
            Metric::L2 => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Metric::Cosine),
            1 => Some(Metric::L2),
            _ => None,
        }
    }

    /// Kind of the raw scores this metric produces.
    pub fn score_kind(self) -> ScoreKind {
        match self {
            Metric::Cosine => ScoreKind::Similarity,
            Metric::L2 => ScoreKind::Distance,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => f.write_str("cosine"),
            Metric::L2 => f.write_str("l2"),
        }
    }
}

impl FromStr for Metric {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" | "ip" => Ok(Metric::Cosine),
            "l2" | "euclidean" => Ok(Metric::L2),
            other => Err(crate::error::Error::InvalidConfig(format!("unknown metric '{other}'"))),
        }
    }
}

/// How to read a raw candidate score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScoreKind {
    /// Higher is better, roughly [-1, 1].
    Similarity,
    /// Lower is better, >= 0.
    Distance,
    /// Raw keyword score, > 0, unbounded.
    Lexical,
    /// Score assigned by an external reranker.
    Relevance,
}

/// One entry of a ranked list produced by a single retrieval signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: ChunkId,
    pub score: f32,
    pub kind: ScoreKind,
}

impl Candidate {
    pub fn new(id: impl Into<ChunkId>, score: f32, kind: ScoreKind) -> Self {
        Self { id: id.into(), score, kind }
    }

    /// Bounded, higher-is-better view of the score. Distances map through
    /// `1 / (1 + d)`; every other kind passes through unchanged.
    pub fn similarity(&self) -> f32 {
        match self.kind {
            ScoreKind::Distance => 1.0 / (1.0 + self.score),
            _ => self.score,
        }
    }
}

/// A chunk id with its combined score after fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    pub id: ChunkId,
    pub score: f32,
}

/// A hydrated chunk with the score handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// A document filter resolved from a user-supplied name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentScope {
    pub key: String,
    pub name: String,
}
