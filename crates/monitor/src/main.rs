//! Driver Monitor - Main Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use monitor::cli::Cli;
use monitor::config::MonitorConfig;
use monitor::{commands, init_logging};
use tracing::{debug, info};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json)?;

    info!("=== Driver Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    let config = MonitorConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    debug!("Configuration: {:?}", config);

    commands::run(cli.command, &config)
}
