use ragdb_core::traits::TextIndexer;
use ragdb_core::types::{Chunk, ScoreKind};
use ragdb_text::LexicalIndex;

fn chunk(id: &str, doc_key: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        doc_key: doc_key.to_string(),
        document_name: doc_key.to_lowercase(),
        text: text.to_string(),
        section_path: Vec::new(),
        position: Default::default(),
        page: None,
        metadata: Default::default(),
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("A_0", "A", "The water pump primes automatically after a power failure."),
        chunk("A_1", "A", "Replace the pump seal every two years."),
        chunk("A_2", "A", "Solar panels charge the battery bank."),
        chunk("B_0", "B", "Pump maintenance schedule for the irrigation system."),
        chunk("B_1", "B", "水泵启动前请检查电源。"),
        chunk("B_2", "B", "电池组需要定期维护。"),
    ]
}

#[test]
fn lexical_full_flow() {
    let index = LexicalIndex::build(&corpus()).expect("index");
    assert_eq!(index.len(), 6);

    let hits = index.search("pump seal", 10, None).expect("search");
    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "A_1", "only chunk with both terms ranks first");
    assert!(hits.iter().all(|h| h.score > 0.0 && h.kind == ScoreKind::Lexical));
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(!hits.iter().any(|h| h.id == "A_2"), "non-matching chunks are excluded, not zero-scored");
}

#[test]
fn scope_filters_without_rescoring() {
    let index = LexicalIndex::build(&corpus()).expect("index");
    let all = index.search("pump", 10, None).expect("search");
    let scoped = index.search("pump", 10, Some("A")).expect("search");

    assert!(scoped.iter().all(|h| h.id.starts_with("A_")));
    assert_eq!(scoped.len(), 2);
    for hit in &scoped {
        let unscoped = all.iter().find(|h| h.id == hit.id).expect("present unscoped");
        assert!((unscoped.score - hit.score).abs() < 1e-5);
    }
    assert!(index.search("pump", 10, Some("missing")).expect("search").is_empty());
}

#[test]
fn cjk_query_matches_without_spaces() {
    let index = LexicalIndex::build(&corpus()).expect("index");
    let hits = index.search("水泵", 5, None).expect("search");
    assert_eq!(hits.first().map(|h| h.id.as_str()), Some("B_1"));

    let hits = index.search("维护", 5, None).expect("search");
    assert_eq!(hits.first().map(|h| h.id.as_str()), Some("B_2"));
}

#[test]
fn degenerate_queries_return_empty() {
    let index = LexicalIndex::build(&corpus()).expect("index");
    assert!(index.search("pump", 0, None).expect("search").is_empty());
    assert!(index.search("the and of", 10, None).expect("search").is_empty());
    assert!(index.search("   ", 10, None).expect("search").is_empty());
    assert!(index.search("zebra", 10, None).expect("search").is_empty());
}

#[test]
fn k_limits_results_through_the_trait() {
    let index = LexicalIndex::build(&corpus()).expect("index");
    let indexer: &dyn TextIndexer = &index;
    assert_eq!(indexer.search("pump", 1, None).expect("search").len(), 1);
}

#[test]
fn empty_corpus_is_searchable() {
    let index = LexicalIndex::build(&[]).expect("index");
    assert!(index.is_empty());
    assert!(index.search("pump", 10, None).expect("search").is_empty());
}
