use std::collections::HashMap;

use ragdb_core::config::RetrievalSettings;
use ragdb_core::types::{Candidate, ChunkId, FusedHit};

/// Linear fusion parameters: `vector * similarity + lexical * (raw / lexical_norm)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f32,
    pub lexical: f32,
    pub lexical_norm: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { vector: 0.7, lexical: 0.3, lexical_norm: 10.0 }
    }
}

impl From<&RetrievalSettings> for FusionWeights {
    fn from(s: &RetrievalSettings) -> Self {
        Self { vector: s.vector_weight, lexical: s.lexical_weight, lexical_norm: s.lexical_norm }
    }
}

/// Merge a vector list and a lexical list into one ranking.
///
/// Distances go through [`Candidate::similarity`]; lexical scores are divided
/// by `lexical_norm`. An id in both lists sums both contributions, an id in one
/// list gets nothing from the other. Equal scores keep first-seen order,
/// vector list first.
pub fn fuse(vector: &[Candidate], lexical: &[Candidate], weights: &FusionWeights) -> Vec<FusedHit> {
    let mut hits: Vec<FusedHit> = Vec::with_capacity(vector.len() + lexical.len());
    let mut slot: HashMap<ChunkId, usize> = HashMap::new();
    let mut add = |id: &ChunkId, contribution: f32| match slot.get(id) {
        Some(&i) => hits[i].score += contribution,
        None => {
            slot.insert(id.clone(), hits.len());
            hits.push(FusedHit { id: id.clone(), score: contribution });
        }
    };
    for c in vector {
        add(&c.id, weights.vector * c.similarity());
    }
    for c in lexical {
        add(&c.id, weights.lexical * (c.score / weights.lexical_norm));
    }
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_core::types::ScoreKind;

    #[test]
    fn vector_only_contribution() {
        let fused = fuse(&[Candidate::new("a", 0.8, ScoreKind::Similarity)], &[], &FusionWeights::default());
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.56).abs() < 1e-6);
    }

    #[test]
    fn contributions_accumulate() {
        let vector = [Candidate::new("a", 0.5, ScoreKind::Similarity)];
        let lexical = [Candidate::new("a", 5.0, ScoreKind::Lexical), Candidate::new("b", 20.0, ScoreKind::Lexical)];
        let fused = fuse(&vector, &lexical, &FusionWeights::default());
        assert_eq!(fused[0].id, "b");
        assert!((fused[0].score - 0.6).abs() < 1e-6);
        assert!((fused[1].score - (0.35 + 0.15)).abs() < 1e-6);
    }

    #[test]
    fn distances_become_bounded_similarity() {
        let fused = fuse(&[Candidate::new("a", 1.0, ScoreKind::Distance)], &[], &FusionWeights::default());
        assert!((fused[0].score - 0.35).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let vector = [Candidate::new("v", 0.3, ScoreKind::Similarity)];
        let lexical = [Candidate::new("l", 7.0, ScoreKind::Lexical)];
        let fused = fuse(&vector, &lexical, &FusionWeights::default());
        assert_eq!(fused.iter().map(|h| h.id.as_str()).collect::<Vec<_>>(), vec!["v", "l"]);
    }

    #[test]
    fn weights_from_settings() {
        let s = RetrievalSettings { vector_weight: 0.5, lexical_weight: 0.5, lexical_norm: 2.0, ..Default::default() };
        assert_eq!(FusionWeights::from(&s), FusionWeights { vector: 0.5, lexical: 0.5, lexical_norm: 2.0 });
    }
}
