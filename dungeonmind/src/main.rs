//! DungeonMind command-line front end.
//!
//! Plays a game over stdin/stdout:
//!
//! ```bash
//! cargo run -p dungeonmind -- --config dungeonmind.yaml --backend claude --world-dir world/
//! ```
//!
//! Without `--config` a single local `sample` backend is used, which echoes
//! player input and needs no API key.

mod headless;

use anyhow::{Context, Result};
use clap::Parser;
use dungeonmind_core::config::BackendConfig;
use dungeonmind_core::{DungeonMindConfig, ServiceFactory, SessionConfig, WorldData};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const SAMPLE_BACKEND: &str = "sample";

#[derive(Parser, Debug)]
#[command(name = "dungeonmind")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AI Dungeon Master for the Forgotten Realms")]
struct Args {
    /// YAML file describing backends and services
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend for the dungeon master and campaign services
    #[arg(long, value_name = "NAME", default_value = SAMPLE_BACKEND)]
    backend: String,

    /// Backend for history summaries (defaults to --backend)
    #[arg(long, value_name = "NAME")]
    summarizer_backend: Option<String>,

    /// Directory with graph.json and the search index files
    #[arg(long, value_name = "DIR")]
    world_dir: Option<PathBuf>,

    /// Where the full chat log is kept
    #[arg(long, value_name = "FILE", default_value = "chat_log.json")]
    chat_log: PathBuf,

    /// Trace output file
    #[arg(long, value_name = "FILE", default_value = "dungeonmind.log")]
    log: PathBuf,

    /// Seed for campaign sampling
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    setup_tracing(&args.log)?;

    info!(
        backend = %args.backend,
        config = ?args.config,
        world_dir = ?args.world_dir,
        "DungeonMind startup"
    );

    let config = match &args.config {
        Some(path) => DungeonMindConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => sample_config(),
    };
    let factory = ServiceFactory::new(config);

    let world = match &args.world_dir {
        Some(dir) => Some(
            WorldData::load(dir)
                .await
                .with_context(|| format!("Failed to load world data from {}", dir.display()))?,
        ),
        None => None,
    };

    let mut session_config = SessionConfig::new(&args.backend).with_log_path(&args.chat_log);
    if let Some(backend) = &args.summarizer_backend {
        session_config = session_config.with_summarizer_backend(backend);
    }
    if let Some(seed) = args.seed {
        session_config = session_config.with_seed(seed);
    }

    headless::run_headless(&factory, &session_config, world).await
}

/// Configuration with only the local echo backend.
fn sample_config() -> DungeonMindConfig {
    let mut config = DungeonMindConfig::default();
    config.backends.insert(
        SAMPLE_BACKEND.to_string(),
        BackendConfig::Sample {
            model: SAMPLE_BACKEND.to_string(),
        },
    );
    config
}

fn setup_tracing(log_file: &Path) -> Result<()> {
    use tracing_subscriber::fmt;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    info!("Tracing initialized to {:?}", log_file);
    Ok(())
}
