//! mc-whitelist: self-service whitelist binding service
//!
//! Reads JSON-lines commands on stdin from the chat bridge, answers on
//! stdout, and drives the game server's whitelist over RCON. Logs go to
//! stderr.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use whitelist_core::WhitelistConfig;
use whitelist_server::WhitelistServer;

#[derive(Debug, Parser)]
#[command(name = "mc-whitelist", version, about = "Self-service game whitelist binding over RCON")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "whitelist.toml")]
    config: PathBuf,

    /// Override the SQLite database path from the config file
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match WhitelistConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Refusing to start: {}", e);
            return Err(e).with_context(|| format!("loading {}", args.config.display()));
        }
    };
    if let Some(database) = args.database {
        config.database_path = database;
    }

    info!(
        "mc-whitelist starting: rcon={:?} list_mode={:?} max_bindings_per_owner={} admins={} origin_filter={}",
        config.rcon,
        config.list_mode,
        config.max_bindings_per_owner,
        config.admins.len(),
        config.origin_filter.enabled
    );

    let server = WhitelistServer::from_config(&config).context("initializing whitelist server")?;
    server.run_stdio().await?;

    info!("mc-whitelist stopped");
    Ok(())
}
