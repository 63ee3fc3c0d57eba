//! Applies suspend/resume intents off the event-intake path.
//!
//! The watcher publishes intents into a `watch` channel, so only the latest
//! pending intent is ever seen here. An intent equal to the last one applied
//! is dropped. Transient supervisor errors are retried with backoff until a
//! newer intent arrives.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use localai_core::{CoreError, PlatformPort, ServerControlPort};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::machine::Intent;

const RETRY_INITIAL: Duration = Duration::from_millis(500);

/// Behaviour switches of the worker.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub suspend_on_launch: bool,
    pub resume_after_exit: bool,
    pub processes_to_kill: Vec<String>,
    pub max_backoff: Duration,
}

/// Last supervisor error seen by the worker, shared with the watcher loop.
pub type SharedError = Arc<Mutex<Option<String>>>;

pub struct IntentWorker {
    control: Arc<dyn ServerControlPort>,
    platform: Arc<dyn PlatformPort>,
    options: WorkerOptions,
    last_error: SharedError,
}

impl IntentWorker {
    pub fn new(
        control: Arc<dyn ServerControlPort>,
        platform: Arc<dyn PlatformPort>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            control,
            platform,
            options,
            last_error: Arc::default(),
        }
    }

    pub fn last_error(&self) -> SharedError {
        Arc::clone(&self.last_error)
    }

    pub fn spawn(
        self,
        intents: watch::Receiver<Option<Intent>>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(intents, cancel))
    }

    async fn run(self, mut intents: watch::Receiver<Option<Intent>>, cancel: CancellationToken) {
        let mut last_applied: Option<Intent> = None;
        let mut backoff = Backoff::new(RETRY_INITIAL, self.options.max_backoff);

        'intents: loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                changed = intents.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let Some(intent) = *intents.borrow_and_update() else {
                continue;
            };
            if last_applied == Some(intent) {
                debug!(?intent, "Dropping redundant intent");
                continue;
            }

            if intent == Intent::Suspend {
                self.kill_listed().await;
            }

            backoff.reset();
            loop {
                match self.apply(intent).await {
                    Ok(()) => {
                        last_applied = Some(intent);
                        self.set_error(None);
                        break;
                    }
                    Err(e) if e.is_transient() => {
                        let delay = backoff.next_delay();
                        warn!(
                            ?intent,
                            error = %e,
                            retry_in_ms = delay.as_millis(),
                            "Supervisor call failed, retrying"
                        );
                        self.set_error(Some(e.to_string()));

                        let mut probe = intents.clone();
                        tokio::select! {
                            () = cancel.cancelled() => break 'intents,
                            () = tokio::time::sleep(delay) => {}
                            _ = probe.changed() => {}
                        }
                        if intents.has_changed().unwrap_or(true) {
                            debug!(?intent, "Superseded by a newer intent");
                            continue 'intents;
                        }
                    }
                    Err(e) => {
                        error!(?intent, error = %e, "Supervisor call failed");
                        self.set_error(Some(e.to_string()));
                        last_applied = None;
                        break;
                    }
                }
            }
        }
        debug!("Intent worker stopped");
    }

    async fn apply(&self, intent: Intent) -> Result<(), CoreError> {
        match intent {
            Intent::Suspend if self.options.suspend_on_launch => {
                let outcome = self.control.suspend().await?;
                info!(?outcome, "Suspend applied");
            }
            Intent::Resume if self.options.resume_after_exit => {
                let outcome = self.control.resume().await?;
                info!(?outcome, "Resume applied");
            }
            Intent::Suspend | Intent::Resume => {
                debug!(?intent, "Intent disabled by configuration");
            }
        }
        Ok(())
    }

    async fn kill_listed(&self) {
        if self.options.processes_to_kill.is_empty() {
            return;
        }
        let platform = Arc::clone(&self.platform);
        let names = self.options.processes_to_kill.clone();
        match tokio::task::spawn_blocking(move || platform.kill_by_name(&names)).await {
            Ok(0) => debug!("No listed processes running"),
            Ok(count) => info!(count, "Terminated listed processes"),
            Err(e) => warn!(error = %e, "Process cleanup task failed"),
        }
    }

    fn set_error(&self, value: Option<String>) {
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use localai_core::{MockPlatformPort, ResumeOutcome, SuspendOutcome};

    /// Counts calls; the first `failures` suspends fail transiently.
    #[derive(Default)]
    struct CountingControl {
        suspends: AtomicUsize,
        resumes: AtomicUsize,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl ServerControlPort for CountingControl {
        async fn suspend(&self) -> Result<SuspendOutcome, CoreError> {
            let n = self.suspends.fetch_add(1, Ordering::SeqCst);
            if n < self.failures.load(Ordering::SeqCst) {
                return Err(CoreError::StateConflict("locked".into()));
            }
            Ok(SuspendOutcome::NotRunning)
        }

        async fn resume(&self) -> Result<ResumeOutcome, CoreError> {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            Ok(ResumeOutcome::NothingSuspended)
        }
    }

    fn options(kill: &[&str]) -> WorkerOptions {
        WorkerOptions {
            suspend_on_launch: true,
            resume_after_exit: true,
            processes_to_kill: kill.iter().map(ToString::to_string).collect(),
            max_backoff: Duration::from_millis(50),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn redundant_intents_are_dropped() {
        let control = Arc::new(CountingControl::default());
        let worker = IntentWorker::new(control.clone(), Arc::new(MockPlatformPort::new()), options(&[]));
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let handle = worker.spawn(rx, cancel.clone());

        tx.send_replace(Some(Intent::Suspend));
        settle().await;
        tx.send_replace(Some(Intent::Suspend));
        settle().await;
        tx.send_replace(Some(Intent::Resume));
        settle().await;

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(control.suspends.load(Ordering::SeqCst), 1);
        assert_eq!(control.resumes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried() {
        let control = Arc::new(CountingControl::default());
        control.failures.store(2, Ordering::SeqCst);
        let worker = IntentWorker::new(control.clone(), Arc::new(MockPlatformPort::new()), options(&[]));
        let last_error = worker.last_error();
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let handle = worker.spawn(rx, cancel.clone());

        tx.send_replace(Some(Intent::Suspend));
        tokio::time::sleep(Duration::from_millis(300)).await;

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(control.suspends.load(Ordering::SeqCst), 3);
        assert!(last_error.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn suspend_kills_listed_processes() {
        let mut platform = MockPlatformPort::new();
        platform
            .expect_kill_by_name()
            .withf(|names| names == ["Discord.exe".to_string()])
            .times(1)
            .returning(|_| 1);
        let control = Arc::new(CountingControl::default());
        let worker = IntentWorker::new(control.clone(), Arc::new(platform), options(&["Discord.exe"]));
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let handle = worker.spawn(rx, cancel.clone());

        tx.send_replace(Some(Intent::Suspend));
        settle().await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(control.suspends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_resume_is_not_forwarded() {
        let control = Arc::new(CountingControl::default());
        let mut opts = options(&[]);
        opts.resume_after_exit = false;
        let worker = IntentWorker::new(control.clone(), Arc::new(MockPlatformPort::new()), opts);
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let handle = worker.spawn(rx, cancel.clone());

        tx.send_replace(Some(Intent::Resume));
        settle().await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(control.resumes.load(Ordering::SeqCst), 0);
    }
}
