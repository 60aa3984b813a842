//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "driver-monitor", version, about = "Driver identification and drowsiness monitoring")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enroll a new driver from a directory of captured frames
    Enroll {
        /// Driver name (unique)
        #[arg(short, long)]
        name: String,

        /// Directory of frames; every frame is one capture trigger
        #[arg(short, long)]
        frames: PathBuf,

        /// License number (unique when given)
        #[arg(short, long)]
        license: Option<String>,
    },
    /// Identify the driver in a directory of frames
    Verify {
        #[arg(short, long)]
        frames: PathBuf,
    },
    /// Track drowsiness over a directory of frames, one JSON line per frame
    Monitor {
        #[arg(short, long)]
        frames: PathBuf,

        /// Write frames with face and eye overlays here
        #[arg(long)]
        annotated: Option<PathBuf>,

        /// Save a snapshot of the driver's face whenever an alert fires
        #[arg(long)]
        snapshots: Option<PathBuf>,
    },
    /// List enrolled drivers
    List,
    /// Remove an enrolled driver
    Remove {
        #[arg(short, long)]
        name: String,
    },
}
