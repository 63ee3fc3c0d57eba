//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the local llama-server manager.
#[derive(Parser)]
#[command(name = "local-ai")]
#[command(about = "Run a local llama-server and pause it while you play")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to LOCALAI_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
