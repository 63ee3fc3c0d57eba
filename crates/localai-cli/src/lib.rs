#![deny(unsafe_code)]
//! Command-line front end of local-ai.

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::{AutostartCommand, Commands, ConfigCommand, StartArgs, SteamCommand};
pub use error::{CliError, exit_code_for};
pub use parser::Cli;
