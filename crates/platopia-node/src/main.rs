//! Platopia node binary.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;
mod node;

use config::NodeConfig;
use node::Node;

/// Platopia proof-of-work node.
#[derive(Parser, Debug)]
#[command(name = "platopia-node")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "platopia-node.toml")]
    config: PathBuf,

    /// Network to run on (main, test, regtest)
    #[arg(short, long, default_value = "main")]
    network: String,

    /// Enable mining
    #[arg(long)]
    mining: bool,

    /// Number of mining threads (negative = auto-detect)
    #[arg(long)]
    mining_threads: Option<i32>,

    /// Coinbase output script, hex
    #[arg(long)]
    mining_script: Option<String>,

    /// API bind address
    #[arg(long)]
    api_bind: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Platopia node v{}", env!("CARGO_PKG_VERSION"));

    let config = NodeConfig::load(&args.config, &args)?;
    info!("Network: {}", config.network);
    info!("API: {}", config.api.bind_address);

    let node = Node::new(config)?;

    tokio::select! {
        result = node.run() => {
            if let Err(err) = result {
                tracing::error!("Node error: {err}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    node.shutdown();
    info!("Platopia node stopped");
    Ok(())
}
