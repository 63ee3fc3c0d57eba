//! Locations of the persisted state shared between invocations.
//!
//! All state lives in one directory (by default the platform cache dir):
//!
//! ```text
//! <state>/server.json        persisted server record
//! <state>/server.lock        cross-invocation lock guarding server.json
//! <state>/watch-offset.json  read cursor of the watched log
//! <state>/watcher.json       bookkeeping of the running watcher
//! ```

use std::path::{Path, PathBuf};

use super::error::PathError;
use super::normalize::ensure_directory;

/// Environment variable that relocates the state directory.
pub const STATE_DIR_ENV: &str = "LOCALAI_STATE_DIR";

/// Resolved paths of every state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    /// State rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Honour `LOCALAI_STATE_DIR`, otherwise use `default_root`.
    pub fn from_env_or(default_root: impl Into<PathBuf>) -> Self {
        match std::env::var_os(STATE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(PathBuf::from(dir)),
            _ => Self::new(default_root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the state directory if needed.
    pub fn ensure(&self) -> Result<(), PathError> {
        ensure_directory(&self.root)
    }

    pub fn server_record(&self) -> PathBuf {
        self.root.join("server.json")
    }

    pub fn server_lock(&self) -> PathBuf {
        self.root.join("server.lock")
    }

    pub fn watch_checkpoint(&self) -> PathBuf {
        self.root.join("watch-offset.json")
    }

    pub fn watcher_record(&self) -> PathBuf {
        self.root.join("watcher.json")
    }
}
