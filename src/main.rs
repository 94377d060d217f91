use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use texml_realtime::{server, Config};
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// HTTP port; overrides PORT. The media socket listens one port above.
    #[arg(short, long)]
    port: Option<u16>,
    /// TeXML template served on /inbound; overrides TEXML_PATH.
    #[arg(long, value_name = "FILE")]
    texml: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load application configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(texml) = args.texml {
        config.texml_path = texml;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded successfully. Starting media stream server...");

    // --- 3. Serve ---
    server::run(config).await
}
