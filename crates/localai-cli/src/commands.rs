//! Commands enum and subcommands.

use clap::{Args, Subcommand};
use localai_core::ModelSelector;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// List declared models and which of them are installed (-v for paths)
    ListModels,

    /// Start llama-server with the selected model
    Start(StartArgs),

    /// Stop the running server
    Stop,

    /// Show server state and autostart registration
    Status,

    /// Steam game watcher
    Steam {
        #[command(subcommand)]
        command: SteamCommand,
    },

    /// Start the server automatically at login
    Autostart {
        #[command(subcommand)]
        command: AutostartCommand,
    },

    /// Configuration file management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Show resolved directories and state files
    Paths,
}

impl Commands {
    /// Commands that keep running until interrupted.
    pub const fn is_long_running(&self) -> bool {
        match self {
            Self::Start(args) => !args.background,
            Self::Steam {
                command: SteamCommand::Start,
            } => true,
            _ => false,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Model id, or "auto" for the default/highest priority installed model
    #[arg(short, long)]
    pub model: Option<ModelSelector>,

    /// Detach and return once the server is ready
    #[arg(short, long)]
    pub background: bool,

    /// Context size, at most the model's configured size
    #[arg(short, long)]
    pub context: Option<u32>,

    /// Additional llama-server arguments, shell-quoted
    #[arg(long = "extra-args", allow_hyphen_values = true)]
    pub extra_args: Option<String>,

    /// Also register the server to start at login
    #[arg(long)]
    pub autostart: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteamCommand {
    /// Run the watcher in the foreground until interrupted
    Start,
    /// Stop a running watcher
    Stop,
    /// Show watcher state
    Status,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AutostartCommand {
    /// Register `local-ai start --background` at login
    Enable {
        /// Model to start (defaults to automatic selection)
        #[arg(short, long)]
        model: Option<ModelSelector>,
    },
    /// Remove the login registration
    Disable,
    /// Show whether autostart is registered
    Status,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
}
