use std::path::PathBuf;

use ragdb_cli::{build_retriever, init_logging, load_settings, open_store, take_option, take_path};
use ragdb_hybrid::{SearchMode, SearchRequest};
use ragdb_vector::ShardIndex;

const USAGE: &str = "\
Usage: ragdb [--config DIR] <command>

Commands:
  query \"<text>\" [--k N] [--mode vector|hybrid] [--doc NAME]
  status
  show <chunk-id>";

fn parse_mode(raw: &str) -> anyhow::Result<SearchMode> {
    match raw.to_ascii_lowercase().as_str() {
        "vector" | "vector-only" => Ok(SearchMode::VectorOnly),
        "hybrid" => Ok(SearchMode::Hybrid),
        other => anyhow::bail!("unknown mode '{other}' (expected vector or hybrid)"),
    }
}

fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let cut = ragdb_cli::truncate_chars(&flat, 160);
    if cut.len() < flat.len() {
        format!("{cut}…")
    } else {
        flat
    }
}

async fn query(config_dir: Option<PathBuf>, mut args: Vec<String>) -> anyhow::Result<()> {
    let settings = load_settings(config_dir.as_deref())?;
    let k = match take_option(&mut args, "--k")? {
        Some(raw) => raw.parse::<usize>().map_err(|e| anyhow::anyhow!("--k: {e}"))?,
        None => settings.retrieval.default_k,
    };
    let mode = take_option(&mut args, "--mode")?.map(|m| parse_mode(&m)).transpose()?.unwrap_or_default();
    let document = take_option(&mut args, "--doc")?;
    let text = args.join(" ");
    if text.trim().is_empty() {
        anyhow::bail!("query text is required\n{USAGE}");
    }

    let store = open_store(&settings)?;
    let retriever = build_retriever(&settings, store)?;
    let mut request = SearchRequest::new(text, k).mode(mode);
    if let Some(name) = document {
        request = request.document(name);
    }
    let result = retriever.retrieve(&request).await?;

    if let Some(scope) = &result.scope {
        println!("Scope: {} ({})", scope.name, scope.key);
    }
    if result.chunks.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, hit) in result.chunks.iter().enumerate() {
        let page = hit.chunk.page.map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "{:>2}. {:.4}  {}  [{} p.{}]\n    {}",
            rank + 1,
            hit.score,
            hit.chunk.id,
            hit.chunk.document_name,
            page,
            preview(&hit.chunk.text)
        );
    }
    let keys: Vec<String> = result.citation_keys.iter().map(u32::to_string).collect();
    println!("Citation keys: [{}]", keys.join(", "));
    Ok(())
}

fn status(config_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(config_dir.as_deref())?;
    let shards = ShardIndex::load(&settings.data.shard_dir);
    println!("Shard directory: {}", shards.dir().display());
    println!("{:<44} {:<7} {:>6} {:>8}", "KEY", "METRIC", "DIM", "ROWS");
    for info in shards.infos() {
        let flag = if info.degraded { "  (degraded)" } else { "" };
        println!("{:<44} {:<7} {:>6} {:>8}{flag}", info.key, info.metric, info.dim, info.rows);
    }
    let degraded: Vec<&str> = shards.degraded_keys().collect();
    println!("{} searchable shard(s), {} degraded", shards.len(), degraded.len());
    for key in degraded {
        println!("  degraded: {key}");
    }
    Ok(())
}

fn show(config_dir: Option<PathBuf>, args: &[String]) -> anyhow::Result<()> {
    let [id] = args else {
        anyhow::bail!("show takes exactly one chunk id\n{USAGE}");
    };
    let settings = load_settings(config_dir.as_deref())?;
    let store = open_store(&settings)?;
    let chunk = store.require(id)?;
    println!("{}", serde_json::to_string_pretty(&chunk)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config_dir = take_path(&mut args, "--config")?;
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    match cmd.as_str() {
        "query" => query(config_dir, args).await,
        "status" => status(config_dir),
        "show" => show(config_dir, &args),
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}\n{USAGE}");
            std::process::exit(1);
        }
    }
}
