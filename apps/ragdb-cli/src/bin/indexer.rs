use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{error, info, warn};

use ragdb_cli::{init_logging, load_settings, open_embedder, take_option, take_path, take_switch, truncate_chars, MAX_EMBED_CHARS};
use ragdb_core::source::{self, SourceDocument};
use ragdb_core::store::{source_files, ChunkStore};
use ragdb_core::traits::Embedder;
use ragdb_core::types::Metric;
use ragdb_embed::batch::embed_in_batches;
use ragdb_vector::format::artifacts_exist;
use ragdb_vector::ShardIndex;

const USAGE: &str = "Usage: ragdb-indexer [--config DIR] [--source DIR] [--shards DIR] [--metric cosine|l2] [--force]";

#[derive(Default)]
struct Tally {
    processed: usize,
    skipped: usize,
    failed: usize,
}

async fn index_document(
    path: &Path,
    embedder: &dyn Embedder,
    shards: &mut ShardIndex,
    store: &ChunkStore,
    metric: Metric,
    force: bool,
) -> anyhow::Result<bool> {
    let doc = SourceDocument::read(path)?;
    let Some(key) = doc.content_hash().map(str::to_string) else {
        anyhow::bail!("{} has no content hash", path.display());
    };
    if !force && artifacts_exist(shards.dir(), &key) {
        info!(shard = %key, "shard exists, skipping");
        return Ok(false);
    }
    let chunks = source::chunks(&doc, path);
    if chunks.is_empty() {
        warn!(file = %path.display(), "no non-blank chunks");
        return Ok(false);
    }

    let texts: Vec<String> = chunks.iter().map(|c| truncate_chars(&c.text, MAX_EMBED_CHARS).to_string()).collect();
    let bar = ProgressBar::new(texts.len() as u64);
    bar.set_style(ProgressStyle::with_template("{msg:24!} [{bar:40}] {pos}/{len}")?.progress_chars("=> "));
    bar.set_message(chunks[0].document_name.clone());
    let embeddings = embed_in_batches(embedder, &texts, |done| bar.set_position(done as u64)).await;
    bar.finish_and_clear();

    let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
    let shard = shards.build_shard(&embeddings?, &ids, &key, metric)?;
    println!("{:<24} {} rows, dim {}", chunks[0].document_name, shard.rows, shard.dim);
    store.extend(chunks);
    Ok(true)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if take_switch(&mut args, "--help") || take_switch(&mut args, "-h") {
        println!("{USAGE}");
        return Ok(());
    }
    let config_dir = take_path(&mut args, "--config")?;
    let source = take_path(&mut args, "--source")?;
    let shard_dir = take_path(&mut args, "--shards")?;
    let metric: Option<Metric> = take_option(&mut args, "--metric")?.map(|m| m.parse()).transpose()?;
    let force = take_switch(&mut args, "--force");
    if let Some(extra) = args.first() {
        anyhow::bail!("unexpected argument '{extra}'\n{USAGE}");
    }

    let settings = load_settings(config_dir.as_deref())?;
    let source = source.unwrap_or_else(|| settings.data.chunk_source_dir.clone());
    let shard_dir = shard_dir.unwrap_or_else(|| settings.data.shard_dir.clone());
    let metric = metric.unwrap_or(Metric::Cosine);
    std::fs::create_dir_all(&shard_dir)?;

    println!("Chunk sources: {}", source.display());
    println!("Shards:        {} ({metric})", shard_dir.display());

    let embedder = open_embedder(&settings)?;
    let mut shards = ShardIndex::load(&shard_dir);
    let store = ChunkStore::new(&source);
    store.load_snapshot(&settings.data.metadata_path)?;

    let mut tally = Tally::default();
    for path in source_files(&source) {
        match index_document(&path, embedder.as_ref(), &mut shards, &store, metric, force).await {
            Ok(true) => tally.processed += 1,
            Ok(false) => tally.skipped += 1,
            Err(e) => {
                error!(file = %path.display(), error = %e, "indexing failed");
                tally.failed += 1;
            }
        }
    }

    // Skipped documents still belong in the snapshot.
    store.load_sources();
    store.save_snapshot(&settings.data.metadata_path)?;
    info!(chunks = store.len(), path = %settings.data.metadata_path.display(), "wrote chunk snapshot");

    println!("\nProcessed: {}  Skipped: {}  Failed: {}", tally.processed, tally.skipped, tally.failed);
    Ok(())
}
