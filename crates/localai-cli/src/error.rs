//! CLI error type and the mapping from core errors to exit codes.

use localai_core::{CatalogError, ConfigError, CoreError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Core(String),

    #[error("Invalid arguments: {0}")]
    Arguments(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Conflict: {0}")]
    StateConflict(String),

    #[error("Watch source error: {0}")]
    WatchSource(String),
}

impl CliError {
    /// Map error to an exit code.
    ///
    /// - 1: General error
    /// - 2: Invalid arguments
    /// - 64-78: see sysexits.h
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Core(_) => 1,
            Self::Arguments(_) => 2, // EX_USAGE
            Self::NotFound(_) => 66, // EX_NOINPUT
            Self::Process(_) => 71, // EX_OSERR
            Self::Io(_) | Self::WatchSource(_) => 74, // EX_IOERR
            Self::StateConflict(_) => 75, // EX_TEMPFAIL
            Self::Config(_) => 78, // EX_CONFIG
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Config(_) | CoreError::Path(_) => Self::Config(message),
            CoreError::NotFound(_) => Self::NotFound(message),
            CoreError::Process(_) => Self::Process(message),
            CoreError::StateConflict(_) => Self::StateConflict(message),
            CoreError::WatchSource(_) => Self::WatchSource(message),
            CoreError::Io(_) => Self::Io(message),
            CoreError::Internal(_) => Self::Core(message),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Exit code for an error bubbling out of a handler.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    if let Some(core) = err.downcast_ref::<CoreError>() {
        return core_exit_code(core);
    }
    if let Some(config) = err.downcast_ref::<ConfigError>() {
        return core_exit_code(&config.clone().into());
    }
    if let Some(catalog) = err.downcast_ref::<CatalogError>() {
        return core_exit_code(&catalog.clone().into());
    }
    if err.downcast_ref::<std::io::Error>().is_some() {
        return CliError::Io(String::new()).exit_code();
    }
    1
}

fn core_exit_code(err: &CoreError) -> i32 {
    match err {
        CoreError::Config(_) | CoreError::Path(_) => 78,
        CoreError::NotFound(_) => 66,
        CoreError::Process(_) => 71,
        CoreError::StateConflict(_) => 75,
        CoreError::WatchSource(_) | CoreError::Io(_) => 74,
        CoreError::Internal(_) => 1,
    }
}
