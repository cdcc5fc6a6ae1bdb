use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use termdex_core::DaemonConfig;
use termdex_daemon::Daemon;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "termdex-daemon")]
#[command(about = "termdex indexing daemon", version)]
struct Args {
    /// Configuration file (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    /// Override the configured socket path
    #[arg(long)]
    socket: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DaemonConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => DaemonConfig::load(),
    };
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }

    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .init();

    tracing::info!("Starting termdex daemon v{}", env!("CARGO_PKG_VERSION"));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(Daemon::new(config).run())
}
