//! Driver Monitor
//!
//! Headless front end over the identification and drowsiness crates:
//! enrollment into a local record store, verification, and per-frame
//! drowsiness monitoring with alert latching.

pub mod cli;
pub mod commands;
pub mod config;
pub mod store;

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging to stderr; `RUST_LOG` overrides the verbosity flag
pub fn init_logging(verbose: u8, json: bool) -> Result<()> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.context("Failed to set tracing subscriber")
}
