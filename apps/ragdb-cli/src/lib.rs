//! Shared wiring for the `ragdb` and `ragdb-indexer` binaries.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ragdb_core::config::{Config, Settings};
use ragdb_core::store::ChunkStore;
use ragdb_core::traits::Embedder;
use ragdb_embed::get_default_embedder;
use ragdb_hybrid::HybridRetriever;
use ragdb_rerank::Reranker;
use ragdb_text::LexicalIndex;
use ragdb_vector::ShardIndex;

/// Characters of chunk text sent to the embedder.
pub const MAX_EMBED_CHARS: usize = 2048;

/// Install a stderr subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Settings from `--config DIR` when given, else the working directory.
pub fn load_settings(config_dir: Option<&Path>) -> anyhow::Result<Settings> {
    let config = match config_dir {
        Some(dir) => Config::load_from(dir)?,
        None => Config::load()?,
    };
    Ok(config.settings()?)
}

/// Chunk store over the configured source directory, seeded from the
/// snapshot when one exists and from the source files otherwise.
pub fn open_store(settings: &Settings) -> anyhow::Result<Arc<ChunkStore>> {
    let store = ChunkStore::new(&settings.data.chunk_source_dir);
    if store.load_snapshot(&settings.data.metadata_path)? == 0 {
        store.load_sources();
    }
    Ok(Arc::new(store))
}

pub fn open_embedder(settings: &Settings) -> anyhow::Result<Arc<dyn Embedder>> {
    Ok(Arc::from(get_default_embedder(&settings.embedding)?))
}

/// Full retrieval stack: shards from disk, BM25 over the store, configured
/// embedder and reranker.
pub fn build_retriever(
    settings: &Settings,
    store: Arc<ChunkStore>,
) -> anyhow::Result<HybridRetriever<LexicalIndex, ShardIndex>> {
    let shards = Arc::new(ShardIndex::load(&settings.data.shard_dir));
    let lexical = LexicalIndex::build(&store.snapshot())?;
    let embedder = open_embedder(settings)?;
    let reranker = Reranker::from_settings(&settings.rerank);
    info!(shards = shards.len(), chunks = lexical.len(), rerank = reranker.is_enabled(), "retriever ready");
    Ok(HybridRetriever::new(store, shards, lexical, embedder, reranker, settings.retrieval.clone()))
}

/// At most `max` characters of `text`, cut on a character boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Remove `--name VALUE` from `args`, returning the value.
pub fn take_option(args: &mut Vec<String>, name: &str) -> anyhow::Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == name) else { return Ok(None) };
    if pos + 1 >= args.len() {
        anyhow::bail!("{name} requires a value");
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

/// Remove a bare `--name` switch from `args`, reporting whether it was present.
pub fn take_switch(args: &mut Vec<String>, name: &str) -> bool {
    match args.iter().position(|a| a == name) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

pub fn take_path(args: &mut Vec<String>, name: &str) -> anyhow::Result<Option<PathBuf>> {
    Ok(take_option(args, name)?.map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("水泵启动", 2), "水泵");
        assert_eq!(truncate_chars("short", 2048), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn options_and_switches_are_consumed() {
        let mut a = args(&["query", "--k", "5", "pump", "--force"]);
        assert_eq!(take_option(&mut a, "--k").unwrap().as_deref(), Some("5"));
        assert!(take_switch(&mut a, "--force"));
        assert!(!take_switch(&mut a, "--force"));
        assert_eq!(a, args(&["query", "pump"]));
        assert!(take_option(&mut args(&["--k"]), "--k").is_err());
    }
}
