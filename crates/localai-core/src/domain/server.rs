//! Persisted server state shared between invocations.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::ResolvedSelection;

/// Lifecycle state of the supervised server.
///
/// ```text
/// Stopped -> Starting -> Running -> Suspended -> Running -> Stopped
///               |
///               +-> Stopped (spawn failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Suspended,
}

impl ServerState {
    /// Whether this state occupies the single live-server slot.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

/// On-disk record of the server process.
///
/// Written atomically under the cross-invocation lock. `pid` and
/// `started_at` identify the exact OS process so a reused pid is detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub status: ServerState,
    /// Server process id, absent while suspended or before spawn.
    #[serde(default)]
    pub pid: Option<u32>,
    /// Process start time as reported by the OS (unix seconds).
    #[serde(default)]
    pub started_at: Option<u64>,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    /// Binary the server was launched from.
    pub binary: PathBuf,
    /// Id of the primary model, duplicated for quick display.
    pub selection_id: String,
    pub selection: ResolvedSelection,
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Process that wrote a `Starting` record; used to detect abandoned starts.
    pub owner_pid: u32,
    /// OS start time of `owner_pid` (unix seconds), so a reused pid is not
    /// mistaken for a start still in progress.
    #[serde(default)]
    pub owner_started_at: Option<u64>,
    /// Last unexpected failure, surfaced by the next status query.
    #[serde(default)]
    pub last_failure: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ServerRecord {
    /// Fresh `Starting` record owned by the current process.
    pub fn starting(
        selection: ResolvedSelection,
        extra_args: Vec<String>,
        binary: PathBuf,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            status: ServerState::Starting,
            pid: None,
            started_at: None,
            host: host.into(),
            port,
            log_path: None,
            binary,
            selection_id: selection.id().to_string(),
            selection,
            extra_args,
            owner_pid: std::process::id(),
            owner_started_at: None,
            last_failure: None,
            updated_at: Utc::now(),
        }
    }

    /// Transition to `status`, stamping `updated_at`.
    pub fn set_status(&mut self, status: ServerState) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Mark the process as gone for `reason`, keeping the selection.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.pid = None;
        self.started_at = None;
        self.last_failure = Some(reason.into());
        self.set_status(ServerState::Stopped);
    }

    /// `host:port` the server binds.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Answer to a status query.
///
/// `process_running` and `autostart_registered` are independent facts and
/// are reported separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatusReport {
    pub state: ServerState,
    /// A live server process exists right now.
    pub process_running: bool,
    /// The server will start automatically on login.
    pub autostart_registered: bool,
    /// Health endpoint answered (only probed while running).
    pub healthy: Option<bool>,
    /// The recorded pid belonged to an unrelated process.
    pub stale: bool,
    pub record: Option<ServerRecord>,
}

impl ServerStatusReport {
    /// Failure recorded since the last start, if any.
    pub fn last_failure(&self) -> Option<&str> {
        self.record.as_ref().and_then(|r| r.last_failure.as_deref())
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// A live process was terminated.
    Stopped,
    /// Nothing was running.
    AlreadyStopped,
    /// A suspended server was forgotten; nothing will be resumed.
    SuspensionCleared,
}

/// Result of a suspend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspendOutcome {
    /// The server was stopped and its selection remembered.
    Suspended(Box<ResolvedSelection>),
    AlreadySuspended,
    /// No server was running, so nothing will be resumed later.
    NotRunning,
}

/// Result of a resume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    Resumed,
    AlreadyRunning,
    /// No suspended server was recorded.
    NothingSuspended,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ModelDefinition, ResolvedModel};

    fn selection() -> ResolvedSelection {
        ResolvedSelection {
            primary: ResolvedModel {
                definition: ModelDefinition::new("qwen-7b", "Qwen 7B", "qwen.*7b"),
                path: PathBuf::from("/models/qwen-7b.gguf"),
            },
            draft: None,
        }
    }

    #[test]
    fn starting_record_is_owned_by_current_process() {
        let record = ServerRecord::starting(
            selection(),
            vec![],
            PathBuf::from("/usr/bin/llama-server"),
            "127.0.0.1",
            8080,
        );
        assert_eq!(record.status, ServerState::Starting);
        assert_eq!(record.owner_pid, std::process::id());
        assert_eq!(record.selection_id, "qwen-7b");
        assert_eq!(record.address(), "127.0.0.1:8080");
    }

    #[test]
    fn mark_failed_clears_process_identity() {
        let mut record = ServerRecord::starting(
            selection(),
            vec![],
            PathBuf::from("llama-server"),
            "127.0.0.1",
            8080,
        );
        record.pid = Some(42);
        record.started_at = Some(1000);
        record.set_status(ServerState::Running);

        record.mark_failed("exited");
        assert_eq!(record.status, ServerState::Stopped);
        assert!(record.pid.is_none());
        assert_eq!(record.last_failure.as_deref(), Some("exited"));
    }

    #[test]
    fn state_serializes_lowercase() {
        let json = serde_json::to_string(&ServerState::Suspended).unwrap();
        assert_eq!(json, "\"suspended\"");
        assert!(ServerState::Starting.is_live());
        assert!(!ServerState::Suspended.is_live());
    }
}
