//! Lifecycle tests for the server supervisor against a fake llama-server.
//!
//! The fake is a shell script named `llama-server` that idles until SIGTERM,
//! so process-name verification behaves as with the real binary.

#![cfg(unix)]

use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use localai_core::{
    MockPlatformPort, ModelDefinition, PlatformTag, ResolvedModel, ResolvedSelection,
    ResumeOutcome, ServerRecord, ServerState, StatePaths, StopOutcome, SuspendOutcome,
};
use localai_runtime::record::{StateLock, read_record, write_record};
use localai_runtime::{ServerSupervisor, StartMode, SupervisorConfig};
use tempfile::TempDir;

/// Writes its pid next to itself, then idles until SIGTERM.
const FAKE_SERVER: &str =
    "#!/bin/sh\necho $$ > \"$0.pid\"\ntrap 'exit 0' TERM\nwhile true; do sleep 0.1; done\n";

struct Harness {
    dir: TempDir,
    supervisor: ServerSupervisor,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("bin").join("llama-server");
        std::fs::create_dir_all(binary.parent().unwrap()).unwrap();
        std::fs::write(&binary, FAKE_SERVER).unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut platform = MockPlatformPort::new();
        platform.expect_tag().return_const(PlatformTag::Linux);
        platform.expect_is_autostart_registered().return_const(false);

        let config = SupervisorConfig {
            binary: Some(binary),
            host: "127.0.0.1".to_string(),
            port: free_port(),
            log_dir: dir.path().join("logs"),
            cache_dir: None,
            stop_grace: Duration::from_secs(3),
            startup_timeout: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(2),
            wait_for_ready: false,
        };
        let paths = StatePaths::new(dir.path().join("state"));
        let supervisor = ServerSupervisor::new(config, paths, Arc::new(platform));
        Self { dir, supervisor }
    }

    fn paths(&self) -> StatePaths {
        StatePaths::new(self.dir.path().join("state"))
    }

    fn binary(&self) -> PathBuf {
        self.supervisor.config().binary.clone().unwrap()
    }

    /// Pid written by the most recently spawned fake server.
    fn spawned_pid(&self) -> u32 {
        let mut path = self.binary().into_os_string();
        path.push(".pid");
        std::fs::read_to_string(path).unwrap().trim().parse().unwrap()
    }
}

fn free_port() -> u16 {
    TcpListener::bind(("127.0.0.1", 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn selection() -> ResolvedSelection {
    ResolvedSelection {
        primary: ResolvedModel {
            definition: ModelDefinition::new("tiny", "Tiny", "tiny.gguf").with_ctx_size(2048),
            path: PathBuf::from("/models/tiny.gguf"),
        },
        draft: None,
    }
}

fn pid_is_alive(pid: u32) -> bool {
    localai_runtime::record::verify::is_running(pid)
}

#[tokio::test]
async fn test_start_then_stop_leaves_nothing_running() {
    let h = Harness::new();

    let record = h
        .supervisor
        .start(selection(), Vec::new(), StartMode::Background)
        .await
        .unwrap();
    assert_eq!(record.status, ServerState::Running);
    let pid = record.pid.unwrap();
    assert!(pid_is_alive(pid));
    assert!(record.log_path.unwrap().ends_with("llama-server-tiny.log"));

    let status = h.supervisor.status().await.unwrap();
    assert_eq!(status.state, ServerState::Running);
    assert!(status.process_running);
    assert!(!status.autostart_registered);

    assert_eq!(h.supervisor.stop().await.unwrap(), StopOutcome::Stopped);
    assert!(!pid_is_alive(pid));
    assert_eq!(h.supervisor.stop().await.unwrap(), StopOutcome::AlreadyStopped);

    let status = h.supervisor.status().await.unwrap();
    assert_eq!(status.state, ServerState::Stopped);
    assert!(!status.process_running);
}

#[tokio::test]
async fn test_second_start_is_a_state_conflict() {
    let h = Harness::new();
    h.supervisor
        .start(selection(), Vec::new(), StartMode::Background)
        .await
        .unwrap();

    let err = h
        .supervisor
        .start(selection(), Vec::new(), StartMode::Background)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "state_conflict");

    h.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_suspend_and_resume_keep_selection() {
    let h = Harness::new();
    let first = h
        .supervisor
        .start(selection(), vec!["--verbose".into()], StartMode::Background)
        .await
        .unwrap();

    match h.supervisor.suspend().await.unwrap() {
        SuspendOutcome::Suspended(remembered) => assert_eq!(*remembered, selection()),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!pid_is_alive(first.pid.unwrap()));
    assert_eq!(
        h.supervisor.suspend().await.unwrap(),
        SuspendOutcome::AlreadySuspended
    );

    let status = h.supervisor.status().await.unwrap();
    assert_eq!(status.state, ServerState::Suspended);
    assert!(!status.process_running);

    assert_eq!(h.supervisor.resume().await.unwrap(), ResumeOutcome::Resumed);
    assert_eq!(
        h.supervisor.resume().await.unwrap(),
        ResumeOutcome::AlreadyRunning
    );

    let status = h.supervisor.status().await.unwrap();
    let record = status.record.unwrap();
    assert_eq!(record.selection, selection());
    assert_eq!(record.extra_args, vec!["--verbose".to_string()]);
    assert!(status.process_running);

    h.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_clears_suspension() {
    let h = Harness::new();
    h.supervisor
        .start(selection(), Vec::new(), StartMode::Background)
        .await
        .unwrap();
    h.supervisor.suspend().await.unwrap();

    assert_eq!(
        h.supervisor.stop().await.unwrap(),
        StopOutcome::SuspensionCleared
    );
    assert_eq!(
        h.supervisor.resume().await.unwrap(),
        ResumeOutcome::NothingSuspended
    );
}

#[tokio::test]
async fn test_suspend_without_server_is_not_running() {
    let h = Harness::new();
    assert_eq!(h.supervisor.suspend().await.unwrap(), SuspendOutcome::NotRunning);
    assert_eq!(
        h.supervisor.resume().await.unwrap(),
        ResumeOutcome::NothingSuspended
    );
}

#[tokio::test]
async fn test_reused_pid_is_reported_stale() {
    let h = Harness::new();
    let mut record = ServerRecord::starting(selection(), Vec::new(), h.binary(), "127.0.0.1", 1);
    // The test runner is alive but is not llama-server.
    record.pid = Some(std::process::id());
    record.started_at = localai_runtime::record::verify::start_time(std::process::id());
    record.set_status(ServerState::Running);
    write_record(&h.paths().server_record(), &record).unwrap();

    let status = h.supervisor.status().await.unwrap();
    assert_eq!(status.state, ServerState::Stopped);
    assert!(status.stale);
    assert!(!status.process_running);
    assert!(status.last_failure().is_some());
}

#[tokio::test]
async fn test_dead_pid_is_recorded_as_failure() {
    let h = Harness::new();
    let mut exited = std::process::Command::new("true").spawn().unwrap();
    let dead_pid = exited.id();
    exited.wait().unwrap();

    let mut record = ServerRecord::starting(selection(), Vec::new(), h.binary(), "127.0.0.1", 1);
    record.pid = Some(dead_pid);
    record.set_status(ServerState::Running);
    write_record(&h.paths().server_record(), &record).unwrap();

    let status = h.supervisor.status().await.unwrap();
    assert_eq!(status.state, ServerState::Stopped);
    assert!(!status.stale);
    assert!(status.last_failure().unwrap().contains("exited unexpectedly"));

    assert_eq!(h.supervisor.stop().await.unwrap(), StopOutcome::AlreadyStopped);
}

#[tokio::test]
async fn test_stop_during_start_fails_fast() {
    let h = Harness::new();
    // A start owned by this (live) process that has not finished yet.
    let record = ServerRecord::starting(selection(), Vec::new(), h.binary(), "127.0.0.1", 1);
    write_record(&h.paths().server_record(), &record).unwrap();

    let err = h.supervisor.stop().await.unwrap_err();
    assert_eq!(err.kind(), "state_conflict");
    let err = h.supervisor.suspend().await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_start_owned_by_reused_pid_is_abandoned() {
    let h = Harness::new();
    let mut bystander = std::process::Command::new("sleep").arg("30").spawn().unwrap();

    let mut record = ServerRecord::starting(selection(), Vec::new(), h.binary(), "127.0.0.1", 1);
    record.owner_pid = bystander.id();
    record.owner_started_at = Some(1);
    write_record(&h.paths().server_record(), &record).unwrap();

    let status = h.supervisor.status().await.unwrap();
    assert_eq!(status.state, ServerState::Stopped);
    assert!(status.last_failure().unwrap().contains("abandoned"));
    assert_eq!(h.supervisor.stop().await.unwrap(), StopOutcome::AlreadyStopped);

    let started = h
        .supervisor
        .start(selection(), Vec::new(), StartMode::Background)
        .await
        .unwrap();
    assert_eq!(started.status, ServerState::Running);
    h.supervisor.stop().await.unwrap();

    assert!(bystander.try_wait().unwrap().is_none());
    bystander.kill().unwrap();
    bystander.wait().unwrap();
}

#[tokio::test]
async fn test_unrecordable_start_shuts_the_server_down() {
    let h = Harness::new();
    let record_path = h.paths().server_record();
    let lock_path = h.paths().server_lock();

    // Take the lock once the Starting record is written and hold it past the
    // supervisor's lock timeout, so the Running record cannot be saved.
    let blocker = tokio::spawn(async move {
        loop {
            if let Ok(Some(record)) = read_record::<ServerRecord>(&record_path) {
                if record.status == ServerState::Starting {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let lock = StateLock::acquire(&lock_path, Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(lock);
    });

    let err = h
        .supervisor
        .start(selection(), Vec::new(), StartMode::Background)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "state_conflict");
    blocker.await.unwrap();

    assert!(!pid_is_alive(h.spawned_pid()));
    assert!(h.supervisor.status().await.unwrap().record.is_none());
}

#[tokio::test]
async fn test_missing_binary_is_not_found() {
    let h = Harness::new();
    std::fs::remove_file(h.binary()).unwrap();

    let err = h
        .supervisor
        .start(selection(), Vec::new(), StartMode::Background)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert_eq!(
        h.supervisor.status().await.unwrap().state,
        ServerState::Stopped
    );
}

#[tokio::test]
async fn test_busy_port_is_a_process_error() {
    let h = Harness::new();
    let _occupied = TcpListener::bind(("127.0.0.1", h.supervisor.config().port)).unwrap();

    let err = h
        .supervisor
        .start(selection(), Vec::new(), StartMode::Background)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "process");
    assert!(h.supervisor.status().await.unwrap().record.is_none());
}

#[tokio::test]
async fn test_dangerous_extra_args_are_rejected() {
    let h = Harness::new();
    let err = h
        .supervisor
        .start(selection(), vec!["--exec".into()], StartMode::Background)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "config");
}

#[tokio::test]
async fn test_foreground_run_clears_record_on_cancel() {
    let h = Harness::new();
    let cancel = tokio_util::sync::CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        trigger.cancel();
    });

    let record = h
        .supervisor
        .start(selection(), Vec::new(), StartMode::Foreground(cancel))
        .await
        .unwrap();
    assert!(!pid_is_alive(record.pid.unwrap()));
    assert!(h.supervisor.status().await.unwrap().record.is_none());
}
