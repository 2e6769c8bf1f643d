use std::fs;

use ragdb_core::traits::VectorIndexer;
use ragdb_core::types::{Metric, ScoreKind};
use ragdb_vector::format;
use ragdb_vector::ShardIndex;

fn ids(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{prefix}_{i}")).collect()
}

fn doc_a() -> Vec<Vec<f32>> {
    vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]]
}

fn doc_b() -> Vec<Vec<f32>> {
    vec![vec![0.9, 0.1, 0.0], vec![0.0, 0.7, 0.7]]
}

#[test]
fn every_source_vector_finds_itself() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embeddings = vec![vec![0.2, 0.9, 0.1], vec![0.8, 0.1, 0.3], vec![0.4, 0.4, 0.8], vec![3.0, -1.0, 0.5]];
    for metric in [Metric::Cosine, Metric::L2] {
        let mut index = ShardIndex::new(tmp.path().join(metric.to_string()));
        index.build_shard(&embeddings, &ids("H", 4), "H", metric)?;
        for (i, v) in embeddings.iter().enumerate() {
            let hits = index.search(v, 1, Some("H"));
            assert_eq!(hits[0].id, format!("H_{i}"), "{metric} self-retrieval");
            match metric {
                Metric::Cosine => {
                    assert!((hits[0].score - 1.0).abs() < 1e-5);
                    assert_eq!(hits[0].kind, ScoreKind::Similarity);
                }
                Metric::L2 => {
                    assert!(hits[0].score.abs() < 1e-6);
                    assert_eq!(hits[0].kind, ScoreKind::Distance);
                }
            }
        }
    }
    Ok(())
}

#[test]
fn scoped_search_stays_in_its_shard() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&doc_a(), &ids("A", 3), "A", Metric::Cosine)?;
    index.build_shard(&doc_b(), &ids("B", 2), "B", Metric::Cosine)?;

    // The query is closest to a B vector, yet scope A must never leak it.
    let hits = index.search(&[0.9, 0.1, 0.0], 10, Some("A"));
    assert_eq!(hits.len(), 3);
    assert!(hits.iter().all(|h| h.id.starts_with("A_")));

    assert!(index.search(&[0.9, 0.1, 0.0], 10, Some("missing")).is_empty());
    Ok(())
}

#[test]
fn scatter_gather_returns_global_top_k() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&doc_a(), &ids("A", 3), "A", Metric::Cosine)?;
    index.build_shard(&doc_b(), &ids("B", 2), "B", Metric::Cosine)?;

    let query = [0.9, 0.1, 0.0];
    let hits = index.search(&query, 2, None);
    let got: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(got, vec!["B_0", "A_0"]);
    assert!(hits[0].score >= hits[1].score);

    let all = index.search(&query, 10, None);
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|w| w[0].score >= w[1].score));
    Ok(())
}

#[test]
fn l2_scatter_gather_orders_by_ascending_distance() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&[vec![0.0, 0.0], vec![5.0, 5.0]], &ids("A", 2), "A", Metric::L2)?;
    index.build_shard(&[vec![1.0, 1.0]], &ids("B", 1), "B", Metric::L2)?;

    let hits = index.search(&[0.2, 0.2], 3, None);
    let got: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(got, vec!["A_0", "B_0", "A_1"]);
    assert!(hits.windows(2).all(|w| w[0].score <= w[1].score));
    Ok(())
}

#[test]
fn degenerate_requests_are_empty() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let empty = ShardIndex::new(tmp.path());
    assert!(empty.search(&[1.0, 0.0, 0.0], 5, None).is_empty());

    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&doc_a(), &ids("A", 3), "A", Metric::Cosine)?;
    assert!(index.search(&[1.0, 0.0, 0.0], 0, None).is_empty());
    assert!(index.search(&[1.0, 0.0], 5, None).is_empty(), "dimension mismatch");
    Ok(())
}

#[test]
fn build_rejects_bad_input() {
    let tmp = tempfile::tempdir().unwrap();
    let mut index = ShardIndex::new(tmp.path());
    assert!(index.build_shard(&[], &[], "A", Metric::Cosine).is_err());
    assert!(index.build_shard(&doc_a(), &ids("A", 2), "A", Metric::Cosine).is_err());
    assert!(index.build_shard(&[vec![1.0, 0.0], vec![1.0]], &ids("A", 2), "A", Metric::Cosine).is_err());
    assert!(index.build_shard(&doc_a(), &ids("A", 3), "../A", Metric::Cosine).is_err());
    assert!(index.is_empty());
    assert!(!format::artifacts_exist(tmp.path(), "A"));
}

#[test]
fn zero_vector_scores_zero_under_cosine() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&[vec![0.0, 0.0], vec![1.0, 0.0]], &ids("Z", 2), "Z", Metric::Cosine)?;
    let hits = index.search(&[0.0, 1.0], 2, Some("Z"));
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.score.abs() < 1e-6));
    Ok(())
}

#[test]
fn shards_survive_a_reload() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&doc_a(), &ids("A", 3), "A", Metric::Cosine)?;
    index.build_shard(&[vec![1.0, 1.0, 1.0]], &ids("B", 1), "B", Metric::L2)?;
    let before = index.search(&[0.1, 0.9, 0.0], 3, None);

    let reloaded = ShardIndex::load(tmp.path());
    assert_eq!(reloaded.keys().collect::<Vec<_>>(), vec!["A", "B"]);
    assert_eq!(reloaded.info("B").map(|i| (i.metric, i.dim, i.rows)), Some((Metric::L2, 3, 1)));
    assert_eq!(reloaded.search(&[0.1, 0.9, 0.0], 3, None), before);
    Ok(())
}

#[test]
fn rebuilding_a_key_replaces_its_artifacts() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&doc_a(), &ids("A", 3), "K", Metric::Cosine)?;
    index.build_shard(&doc_b(), &ids("B", 2), "K", Metric::Cosine)?;

    assert_eq!(format::read_ids(&format::ids_path(tmp.path(), "K"))?, ids("B", 2));
    let reloaded = ShardIndex::load(tmp.path());
    assert_eq!(reloaded.info("K").map(|i| i.rows), Some(2));
    assert!(reloaded.search(&[1.0, 0.0, 0.0], 5, Some("K")).iter().all(|h| h.id.starts_with("B_")));
    Ok(())
}

#[test]
fn failed_rebuild_leaves_nothing_published() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&doc_a(), &ids("A", 3), "K", Metric::Cosine)?;
    assert!(index.contains("K"));

    // A non-empty directory where the id list belongs cannot be removed or replaced.
    let id_file = format::ids_path(tmp.path(), "K");
    fs::remove_file(&id_file)?;
    fs::create_dir(&id_file)?;
    fs::write(id_file.join("keep"), "x")?;

    assert!(index.build_shard(&doc_b(), &ids("B", 2), "K", Metric::Cosine).is_err());
    assert!(!format::vector_path(tmp.path(), "K").exists());
    assert!(!format::artifacts_exist(tmp.path(), "K"));
    assert!(!index.contains("K"));
    assert!(!index.is_degraded("K"));
    assert!(index.search(&[1.0, 0.0, 0.0], 5, Some("K")).is_empty());
    assert!(index.search(&[1.0, 0.0, 0.0], 5, None).is_empty());
    assert!(ShardIndex::load(tmp.path()).is_empty());
    Ok(())
}

#[test]
fn missing_id_file_degrades_the_shard() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&doc_a(), &ids("A", 3), "A", Metric::Cosine)?;
    index.build_shard(&doc_b(), &ids("B", 2), "B", Metric::Cosine)?;
    fs::remove_file(format::ids_path(tmp.path(), "B"))?;

    let reloaded = ShardIndex::load(tmp.path());
    assert!(reloaded.is_degraded("B"));
    assert!(!reloaded.contains("B"));
    assert_eq!(reloaded.degraded_keys().collect::<Vec<_>>(), vec!["B"]);
    assert!(reloaded.search(&[0.9, 0.1, 0.0], 5, Some("B")).is_empty());
    let all = reloaded.search(&[0.9, 0.1, 0.0], 10, None);
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|h| h.id.starts_with("A_")));
    assert!(reloaded.infos().iter().any(|i| i.key == "B" && i.degraded));
    Ok(())
}

#[test]
fn corrupt_vector_file_is_skipped() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&doc_a(), &ids("A", 3), "A", Metric::Cosine)?;
    index.build_shard(&doc_b(), &ids("B", 2), "B", Metric::Cosine)?;
    let path = format::vector_path(tmp.path(), "A");
    let mut bytes = fs::read(&path)?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    fs::write(&path, bytes)?;
    fs::write(tmp.path().join("stray.txt"), "not a shard")?;

    let reloaded = ShardIndex::load(tmp.path());
    assert_eq!(reloaded.keys().collect::<Vec<_>>(), vec!["B"]);
    assert!(!reloaded.is_degraded("A"));
    Ok(())
}

#[test]
fn short_id_list_drops_unmapped_positions() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut index = ShardIndex::new(tmp.path());
    index.build_shard(&doc_a(), &ids("A", 3), "A", Metric::Cosine)?;
    fs::write(format::ids_path(tmp.path(), "A"), r#"["A_0","A_1"]"#)?;

    let reloaded = ShardIndex::load(tmp.path());
    let hits = reloaded.search(&[0.0, 0.0, 1.0], 3, Some("A"));
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.id != "A_2"));
    Ok(())
}

#[test]
fn missing_directory_loads_empty_and_serves_the_trait() {
    let tmp = tempfile::tempdir().unwrap();
    let index = ShardIndex::load(tmp.path().join("nope"));
    assert!(index.is_empty());
    let indexer: &dyn VectorIndexer = &index;
    assert!(indexer.search_vec(&[1.0], 3, None).is_empty());
}
