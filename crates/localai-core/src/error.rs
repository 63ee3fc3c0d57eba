//! Core error taxonomy.
//!
//! Every fallible operation in the catalog, supervisor and watcher reports one
//! of these kinds. Adapters map them to their own surface (the CLI turns each
//! kind into a distinct exit code).

use thiserror::Error;

use crate::paths::PathError;

/// Canonical error type for the local-ai core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid configuration: cyclic or dangling draft reference, malformed
    /// filename pattern, rejected extra arguments.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No model file matches the selection, or a required binary is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Spawn failure, unexpected child exit, port already in use.
    #[error("Process error: {0}")]
    Process(String),

    /// The requested transition conflicts with the current server state.
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// The watched log could not be read.
    #[error("Watch source error: {0}")]
    WatchSource(String),

    /// Path resolution failed.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Filesystem I/O on state files failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected internal condition.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Short, stable name of the error kind for logs and status output.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::Process(_) => "process",
            Self::StateConflict(_) => "state_conflict",
            Self::WatchSource(_) => "watch_source",
            Self::Path(_) => "path",
            Self::Io(_) => "io",
            Self::Internal(_) => "internal",
        }
    }

    /// Whether a background caller may retry the operation later.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::StateConflict(_) | Self::WatchSource(_))
    }
}

/// Convenience alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;
