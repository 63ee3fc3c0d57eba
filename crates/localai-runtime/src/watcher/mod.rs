//! Game watcher: tails Steam's process log and suspends the server while a
//! game runs.
//!
//! The watcher loop owns the log cursor, the classifier and the debounce
//! machine. Supervisor calls happen on a separate [`IntentWorker`] task, so a
//! slow process kill never holds up log intake.

mod backoff;
mod classify;
mod machine;
mod tail;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use localai_core::{
    CoreError, PlatformPort, ServerControlPort, StatePaths, SteamSettings, WatchCheckpoint,
    WatchState, WatcherRecord,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use backoff::Backoff;
pub use classify::LineClassifier;
pub use machine::{DebounceMachine, Intent};
pub use tail::{LogTail, MAX_CHUNK, TailLine, TailRead};
pub use worker::{IntentWorker, SharedError, WorkerOptions};

use crate::record::{delete_record, read_record, verify, write_record};

/// Runtime parameters of a [`SteamWatcher`].
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    pub log_path: PathBuf,
    pub settle: Duration,
    pub poll_interval: Duration,
    pub max_backoff: Duration,
    pub suspend_on_launch: bool,
    pub resume_after_exit: bool,
    pub processes_to_kill: Vec<String>,
}

impl WatcherOptions {
    pub fn from_settings(settings: &SteamSettings, log_path: PathBuf) -> Self {
        Self {
            log_path,
            settle: settings.settle(),
            poll_interval: settings.poll_interval(),
            max_backoff: settings.max_backoff(),
            suspend_on_launch: settings.stop_ai_on_game,
            resume_after_exit: settings.restart_ai_after_game,
            processes_to_kill: settings.processes_to_kill.clone(),
        }
    }
}

/// Find the Steam process log.
///
/// `steam_logs_dir` wins when set, whether or not the file exists yet.
/// Otherwise the first platform candidate holding the log is used.
pub fn locate_steam_log(
    settings: &SteamSettings,
    platform: &dyn PlatformPort,
) -> Result<PathBuf, CoreError> {
    if let Some(dir) = &settings.steam_logs_dir {
        return Ok(dir.join(&settings.log_file));
    }

    let candidates = platform.steam_log_dirs();
    candidates
        .iter()
        .map(|dir| dir.join(&settings.log_file))
        .find(|path| path.is_file())
        .ok_or_else(|| {
            let searched: Vec<String> = candidates
                .iter()
                .map(|d| d.display().to_string())
                .collect();
            CoreError::NotFound(format!(
                "{} not found (searched: {}); set steam.steam_logs_dir",
                settings.log_file,
                searched.join(", ")
            ))
        })
}

/// What a finished watch session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    pub events: u64,
    pub offset: u64,
    pub state: WatchState,
}

pub struct SteamWatcher {
    options: WatcherOptions,
    paths: StatePaths,
    control: Arc<dyn ServerControlPort>,
    platform: Arc<dyn PlatformPort>,
}

impl SteamWatcher {
    pub fn new(
        options: WatcherOptions,
        paths: StatePaths,
        control: Arc<dyn ServerControlPort>,
        platform: Arc<dyn PlatformPort>,
    ) -> Self {
        Self {
            options,
            paths,
            control,
            platform,
        }
    }

    /// Watch until `cancel` fires.
    ///
    /// Source errors never end the loop; they are retried with capped backoff
    /// and reported through `watcher.json`.
    pub async fn run(self, cancel: CancellationToken) -> Result<WatchSummary, CoreError> {
        self.paths.ensure()?;

        let mut tail = self.open_tail().await;
        let mut classifier = LineClassifier::new();
        let mut machine = DebounceMachine::new(self.options.settle);
        let mut record = WatcherRecord::new(tail.path().to_path_buf(), tail.offset());
        record.process_started_at = verify::start_time(record.pid);
        record.program = std::env::current_exe().ok();
        self.publish(&record);

        let worker = IntentWorker::new(
            Arc::clone(&self.control),
            Arc::clone(&self.platform),
            WorkerOptions {
                suspend_on_launch: self.options.suspend_on_launch,
                resume_after_exit: self.options.resume_after_exit,
                processes_to_kill: self.options.processes_to_kill.clone(),
                max_backoff: self.options.max_backoff,
            },
        );
        let worker_error = worker.last_error();
        let worker_cancel = cancel.child_token();
        let (intents, intent_rx) = watch::channel(None);
        let worker_handle = worker.spawn(intent_rx, worker_cancel.clone());

        info!(
            log = %tail.path().display(),
            offset = tail.offset(),
            settle_secs = self.options.settle.as_secs(),
            "Watching game log"
        );

        let mut backoff = Backoff::new(self.options.poll_interval, self.options.max_backoff);
        let mut next_poll = Instant::now();
        let mut source_error: Option<String> = None;
        let mut events = 0u64;

        loop {
            let wake = machine
                .next_deadline()
                .map_or(next_poll, |deadline| deadline.min(next_poll));
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep_until(wake) => {}
            }

            let now = Instant::now();
            if now >= next_poll {
                match tail.poll().await {
                    Ok(read) => {
                        if source_error.take().is_some() {
                            info!("Game log readable again");
                        }
                        backoff.reset();
                        for line in &read.lines {
                            let Some(event) = classifier.classify(&line.text, line.offset) else {
                                continue;
                            };
                            events += 1;
                            debug!(kind = ?event.kind, process = %event.process, offset = event.offset, "Event");
                            if let Some(intent) = machine.on_event(&event, now) {
                                intents.send_replace(Some(intent));
                            }
                        }
                        if read.rotated || !read.lines.is_empty() {
                            self.save_checkpoint(&tail);
                        }
                        next_poll = now + self.options.poll_interval;
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        warn!(error = %e, retry_in_ms = delay.as_millis(), "Cannot read game log");
                        source_error = Some(e.to_string());
                        next_poll = now + delay;
                    }
                }
            }

            if let Some(intent) = machine.on_tick(now) {
                intents.send_replace(Some(intent));
            }

            let last_error = source_error
                .clone()
                .or_else(|| worker_error.lock().ok().and_then(|e| e.clone()));
            self.refresh(&mut record, &machine, tail.offset(), last_error);
        }

        worker_cancel.cancel();
        if let Err(e) = worker_handle.await {
            warn!(error = %e, "Intent worker ended abnormally");
        }
        self.save_checkpoint(&tail);
        if let Err(e) = delete_record(&self.paths.watcher_record()) {
            warn!(error = %e, "Failed to remove watcher record");
        }
        info!(events, offset = tail.offset(), "Game watcher stopped");

        Ok(WatchSummary {
            events,
            offset: tail.offset(),
            state: machine.state(),
        })
    }

    /// Resume from the checkpoint when it belongs to the same log, otherwise
    /// start at the current end so old history is not replayed.
    async fn open_tail(&self) -> LogTail {
        let path = &self.options.log_path;
        match read_record::<WatchCheckpoint>(&self.paths.watch_checkpoint()) {
            Ok(Some(checkpoint)) if checkpoint.log_path == *path => {
                debug!(offset = checkpoint.offset, "Resuming from checkpoint");
                LogTail::new(path.clone(), checkpoint.offset)
            }
            Ok(_) => LogTail::at_end(path.clone()).await,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable watch checkpoint");
                LogTail::at_end(path.clone()).await
            }
        }
    }

    fn save_checkpoint(&self, tail: &LogTail) {
        let checkpoint = WatchCheckpoint {
            log_path: tail.path().to_path_buf(),
            offset: tail.offset(),
        };
        if let Err(e) = write_record(&self.paths.watch_checkpoint(), &checkpoint) {
            warn!(error = %e, "Failed to save watch checkpoint");
        }
    }

    fn refresh(
        &self,
        record: &mut WatcherRecord,
        machine: &DebounceMachine,
        offset: u64,
        last_error: Option<String>,
    ) {
        let active = machine.launcher().map(str::to_string);
        if record.state == machine.state()
            && record.active_process == active
            && record.offset == offset
            && record.last_error == last_error
        {
            return;
        }
        record.state = machine.state();
        record.active_process = active;
        record.offset = offset;
        record.last_error = last_error;
        record.updated_at = chrono::Utc::now();
        self.publish(record);
    }

    fn publish(&self, record: &WatcherRecord) {
        if let Err(e) = write_record(&self.paths.watcher_record(), record) {
            warn!(error = %e, "Failed to write watcher record");
        }
    }
}
