//! Events and bookkeeping of the game watcher.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a watched process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchEventKind {
    Launched,
    Exited,
}

/// A classified log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    /// Process name (file name of the executable).
    pub process: String,
    pub pid: Option<u32>,
    pub timestamp: DateTime<Utc>,
    /// Byte offset of the line in the source log.
    pub offset: u64,
}

impl WatchEvent {
    /// Whether this event concerns `name` (case-insensitive).
    pub fn is_for(&self, name: &str) -> bool {
        self.process.eq_ignore_ascii_case(name)
    }
}

/// Debounce state of the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    #[default]
    Idle,
    GameActive,
    PendingResume,
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::GameActive => write!(f, "game active"),
            Self::PendingResume => write!(f, "pending resume"),
        }
    }
}

/// Read cursor persisted across watcher restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchCheckpoint {
    pub log_path: PathBuf,
    pub offset: u64,
}

/// Bookkeeping written by a running watcher for `steam status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherRecord {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    /// OS start time of `pid` in unix seconds, to detect pid reuse.
    #[serde(default)]
    pub process_started_at: Option<u64>,
    /// Executable of the watcher process.
    #[serde(default)]
    pub program: Option<PathBuf>,
    pub log_path: PathBuf,
    pub state: WatchState,
    #[serde(default)]
    pub active_process: Option<String>,
    /// Most recent source error; cleared after the next successful read.
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub offset: u64,
    pub updated_at: DateTime<Utc>,
}

impl WatcherRecord {
    /// Record for a watcher that just started in this process.
    pub fn new(log_path: PathBuf, offset: u64) -> Self {
        let now = Utc::now();
        Self {
            pid: std::process::id(),
            started_at: now,
            process_started_at: None,
            program: None,
            log_path,
            state: WatchState::Idle,
            active_process: None,
            last_error: None,
            offset,
            updated_at: now,
        }
    }
}
