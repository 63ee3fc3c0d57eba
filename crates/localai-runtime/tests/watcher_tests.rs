//! End-to-end tests of the Steam watcher against a counting supervisor.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use localai_core::{
    CoreError, MockPlatformPort, ResumeOutcome, ServerControlPort, StatePaths, SteamSettings,
    SuspendOutcome, WatchCheckpoint, WatchState, WatcherRecord,
};
use localai_runtime::record::{read_record, write_record};
use localai_runtime::{SteamWatcher, WatchSummary, WatcherOptions, locate_steam_log};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CountingControl {
    suspends: AtomicUsize,
    resumes: AtomicUsize,
}

impl CountingControl {
    fn counts(&self) -> (usize, usize) {
        (
            self.suspends.load(Ordering::SeqCst),
            self.resumes.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl ServerControlPort for CountingControl {
    async fn suspend(&self) -> Result<SuspendOutcome, CoreError> {
        self.suspends.fetch_add(1, Ordering::SeqCst);
        Ok(SuspendOutcome::NotRunning)
    }

    async fn resume(&self) -> Result<ResumeOutcome, CoreError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(ResumeOutcome::NothingSuspended)
    }
}

struct Harness {
    dir: TempDir,
    log: PathBuf,
    control: Arc<CountingControl>,
    cancel: CancellationToken,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("gameprocess_log.txt");
        Self {
            dir,
            log,
            control: Arc::new(CountingControl::default()),
            cancel: CancellationToken::new(),
        }
    }

    fn paths(&self) -> StatePaths {
        StatePaths::new(self.dir.path().join("state"))
    }

    fn spawn(&self) -> JoinHandle<Result<WatchSummary, CoreError>> {
        let options = WatcherOptions {
            log_path: self.log.clone(),
            settle: Duration::from_millis(400),
            poll_interval: Duration::from_millis(20),
            max_backoff: Duration::from_millis(100),
            suspend_on_launch: true,
            resume_after_exit: true,
            processes_to_kill: Vec::new(),
        };
        let watcher = SteamWatcher::new(
            options,
            self.paths(),
            self.control.clone(),
            Arc::new(MockPlatformPort::new()),
        );
        tokio::spawn(watcher.run(self.cancel.clone()))
    }

    fn append(&self, text: &str) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    fn record(&self) -> Option<WatcherRecord> {
        read_record(&self.paths().watcher_record()).unwrap()
    }
}

async fn pause(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test]
async fn test_launch_exit_cycle_suspends_once_and_resumes_after_settle() {
    let h = Harness::new();
    h.append("Launch old.exe\n");
    let handle = h.spawn();
    pause(150).await;
    // History from before the first run is not replayed.
    assert_eq!(h.control.counts(), (0, 0));

    h.append("Launch steam.exe\nLaunch game.exe\n");
    pause(150).await;
    assert_eq!(h.control.counts(), (1, 0));

    h.append("Exit game.exe\n");
    pause(150).await;
    assert_eq!(h.control.counts(), (1, 0));
    let record = h.record().unwrap();
    assert_eq!(record.state, WatchState::PendingResume);
    assert_eq!(record.pid, std::process::id());

    pause(500).await;
    assert_eq!(h.control.counts(), (1, 1));
    assert_eq!(h.record().unwrap().state, WatchState::Idle);

    h.cancel.cancel();
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.events, 3);
    assert_eq!(summary.state, WatchState::Idle);
    assert!(h.record().is_none());

    let checkpoint: WatchCheckpoint = read_record(&h.paths().watch_checkpoint())
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.offset, std::fs::metadata(&h.log).unwrap().len());
}

#[tokio::test]
async fn test_relaunch_within_settle_window_never_resumes() {
    let h = Harness::new();
    h.append("");
    let handle = h.spawn();
    pause(100).await;

    h.append("Launch game.exe\n");
    pause(100).await;
    h.append("Exit game.exe\n");
    pause(100).await;
    h.append("Launch game.exe\n");
    pause(700).await;

    assert_eq!(h.control.counts(), (1, 0));
    assert_eq!(h.record().unwrap().state, WatchState::GameActive);

    h.cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unrelated_exit_keeps_game_active() {
    let h = Harness::new();
    h.append("");
    let handle = h.spawn();
    pause(100).await;

    h.append("Launch a.exe\nExit b.exe\n");
    pause(700).await;
    assert_eq!(h.control.counts(), (1, 0));
    let record = h.record().unwrap();
    assert_eq!(record.state, WatchState::GameActive);
    assert_eq!(record.active_process.as_deref(), Some("a.exe"));

    h.cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_truncated_log_restarts_from_beginning() {
    let h = Harness::new();
    h.append("some earlier line that makes the file long\n");
    let handle = h.spawn();
    pause(100).await;

    std::fs::write(&h.log, "Launch game.exe\n").unwrap();
    pause(150).await;
    assert_eq!(h.control.counts(), (1, 0));
    assert!(h.record().unwrap().last_error.is_none());

    h.cancel.cancel();
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.offset, 16);
}

#[tokio::test]
async fn test_checkpoint_resumes_where_previous_run_stopped() {
    let h = Harness::new();
    h.append("Launch a.exe\nExit a.exe\nLaunch b.exe\n");
    // A previous session consumed the first two lines.
    write_record(
        &h.paths().watch_checkpoint(),
        &WatchCheckpoint {
            log_path: h.log.clone(),
            offset: 24,
        },
    )
    .unwrap();

    let handle = h.spawn();
    pause(150).await;
    assert_eq!(h.control.counts(), (1, 0));
    assert_eq!(
        h.record().unwrap().active_process.as_deref(),
        Some("b.exe")
    );

    h.cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unreadable_log_is_retried_not_fatal() {
    let h = Harness::new();
    let handle = h.spawn();
    pause(150).await;

    let record = h.record().unwrap();
    assert!(record.last_error.is_some());
    assert!(!handle.is_finished());

    h.append("Launch game.exe\n");
    pause(300).await;
    assert_eq!(h.control.counts(), (1, 0));
    assert!(h.record().unwrap().last_error.is_none());

    h.cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[test]
fn test_log_discovery_prefers_configured_dir() {
    let dir = tempfile::tempdir().unwrap();
    let settings = SteamSettings {
        steam_logs_dir: Some(dir.path().to_path_buf()),
        ..SteamSettings::default()
    };
    let platform = MockPlatformPort::new();
    let path = locate_steam_log(&settings, &platform).unwrap();
    assert_eq!(path, dir.path().join("gameprocess_log.txt"));
}

#[test]
fn test_log_discovery_searches_platform_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty");
    let steam = dir.path().join("steam/logs");
    std::fs::create_dir_all(&empty).unwrap();
    std::fs::create_dir_all(&steam).unwrap();
    std::fs::write(steam.join("gameprocess_log.txt"), "").unwrap();

    let mut platform = MockPlatformPort::new();
    let candidates = vec![empty, steam.clone()];
    platform
        .expect_steam_log_dirs()
        .returning(move || candidates.clone());

    let path = locate_steam_log(&SteamSettings::default(), &platform).unwrap();
    assert_eq!(path, steam.join("gameprocess_log.txt"));

    let mut nothing = MockPlatformPort::new();
    nothing.expect_steam_log_dirs().returning(Vec::new);
    let err = locate_steam_log(&SteamSettings::default(), &nothing).unwrap_err();
    assert_eq!(err.kind(), "not_found");
}
