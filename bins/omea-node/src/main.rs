//! OMEA node binary.
//!
//! Opens the RocksDB-backed ledger, starts the JSON-RPC server and serves
//! deposits, claims and queries until interrupted.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use omea_core::types::Address;
use omea_node_lib::{start_rpc_server, Node, NodeConfig};
use tracing::info;

/// OMEA node: time-weighted yield and referral accounting.
#[derive(Parser, Debug)]
#[command(
    name = "omea-node",
    version,
    about = "OMEA accounting node with RocksDB storage and JSON-RPC server"
)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory for ledger storage
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// RPC server bind address
    #[arg(long)]
    rpc_bind: Option<String>,

    /// RPC server port
    #[arg(long)]
    rpc_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long)]
    log_format: Option<String>,

    /// Administrator address
    #[arg(long)]
    admin: Option<Address>,

    /// Custody address holding deposited principal
    #[arg(long)]
    custody: Option<Address>,
}

impl Args {
    /// Load the layered configuration and apply command-line overrides.
    fn into_config(self) -> anyhow::Result<NodeConfig> {
        let mut config = NodeConfig::load(self.config.as_deref()).context("failed to load configuration")?;

        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        if let Some(rpc_bind) = self.rpc_bind {
            config.rpc_bind = rpc_bind;
        }
        if let Some(rpc_port) = self.rpc_port {
            config.rpc_port = rpc_port;
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if let Some(log_format) = self.log_format {
            config.log_format = log_format;
        }
        if let Some(admin) = self.admin {
            config.engine.admin = admin;
        }
        if let Some(custody) = self.custody {
            config.engine.custody = custody;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse().into_config()?;

    init_logging(&config.log_level, &config.log_format);

    info!("OMEA node v{}", env!("CARGO_PKG_VERSION"));
    info!("data_dir: {:?}", config.data_dir);
    info!("rpc_addr: {}", config.rpc_addr());
    info!(
        admin = %config.engine.admin,
        custody = %config.engine.custody,
        accrual = ?config.engine.accrual,
        bonus_limit_tokens = config.engine.bonus_ceiling.limit_tokens,
        "engine configuration"
    );

    let node = Node::open(config.clone()).context("failed to open node")?;
    info!("node initialized");

    let rpc_handle = start_rpc_server(&config.rpc_addr(), node.clone())
        .await
        .context("failed to start RPC server")?;
    info!("RPC server listening on {}", config.rpc_addr());

    info!("OMEA node running (Ctrl+C to stop)");
    tokio::signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;
    info!("received Ctrl+C, shutting down...");

    rpc_handle.stop().ok();
    rpc_handle.stopped().await;
    info!("RPC server stopped");
    info!("OMEA node shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
