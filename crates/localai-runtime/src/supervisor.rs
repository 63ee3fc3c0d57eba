//! Server supervisor: the single owner of the llama-server process.
//!
//! State is shared between invocations through the persisted
//! [`ServerRecord`], and every read-modify-write of that record happens under
//! the [`StateLock`]. The lock is released while a child is spawning; the
//! `Starting` record written beforehand keeps concurrent starts out, and a
//! `stop` that finds a live `Starting` owner fails with `StateConflict`.
//!
//! ```text
//! start ──lock──▶ Starting ──unlock──▶ spawn ──▶ ready? ──lock──▶ Running
//!                                        │
//!                                        └──▶ failure: record removed (Stopped)
//! ```

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use localai_core::config::validate_extra_args;
use localai_core::{
    CoreError, PlatformPort, ResolvedSelection, ResumeOutcome, ServerControlPort, ServerRecord,
    ServerSettings, ServerState, ServerStatusReport, StatePaths, StopOutcome, SuspendOutcome,
};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::health::{check_http_health, wait_for_http_health};
use crate::process::{
    ServerEndpoint, build_server_args, shutdown_child, spawn_server, terminate_pid,
};
use crate::record::verify::{self, Liveness};
use crate::record::{StateLock, check_process, delete_record, read_record, write_record};

/// Grace period after spawn when readiness probing is disabled.
const STARTUP_SETTLE: Duration = Duration::from_millis(300);

/// Supervisor settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Explicit server binary; looked up through the platform when `None`.
    pub binary: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    /// Directory receiving `llama-server-<model>.log`.
    pub log_dir: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub stop_grace: Duration,
    pub startup_timeout: Duration,
    pub lock_timeout: Duration,
    pub wait_for_ready: bool,
}

impl SupervisorConfig {
    pub fn from_settings(settings: &ServerSettings, log_dir: PathBuf) -> Self {
        Self {
            binary: settings.llama_server_path.clone(),
            host: settings.host.clone(),
            port: settings.port,
            log_dir,
            cache_dir: settings.cache_dir.clone(),
            stop_grace: settings.stop_grace(),
            startup_timeout: settings.startup_timeout(),
            lock_timeout: settings.lock_timeout(),
            wait_for_ready: settings.wait_for_ready,
        }
    }

    fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint {
            host: self.host.clone(),
            port: self.port,
            cache_dir: self.cache_dir.clone(),
        }
    }
}

/// How `start` runs the server.
#[derive(Debug, Clone)]
pub enum StartMode {
    /// Detach, wait for readiness and return.
    Background,
    /// Block until the server exits or the token is cancelled.
    Foreground(CancellationToken),
}

/// Outcome of reconciling a record with the process table.
#[derive(Debug, Clone, Copy, Default)]
struct Reconciled {
    changed: bool,
    alive: bool,
    stale: bool,
}

/// Owns at most one live llama-server process.
pub struct ServerSupervisor {
    config: SupervisorConfig,
    paths: StatePaths,
    platform: Arc<dyn PlatformPort>,
    /// Child spawned by this process, kept so it can be reaped.
    child: Mutex<Option<Child>>,
}

impl ServerSupervisor {
    pub fn new(
        config: SupervisorConfig,
        paths: StatePaths,
        platform: Arc<dyn PlatformPort>,
    ) -> Self {
        Self {
            config,
            paths,
            platform,
            child: Mutex::new(None),
        }
    }

    pub const fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Path of the server binary, `NotFound` when it cannot be located.
    pub fn resolve_binary(&self) -> Result<PathBuf, CoreError> {
        match &self.config.binary {
            Some(path) if path.is_file() => Ok(path.clone()),
            Some(path) => Err(CoreError::NotFound(format!(
                "llama-server binary not found at {}",
                path.display()
            ))),
            None => self
                .platform
                .find_binary(self.platform.tag().server_binary_name()),
        }
    }

    /// Log file for `model_id` in background mode.
    pub fn log_path_for(&self, model_id: &str) -> PathBuf {
        self.config.log_dir.join(format!("llama-server-{model_id}.log"))
    }

    async fn lock(&self) -> Result<StateLock, CoreError> {
        self.paths.ensure()?;
        StateLock::acquire(&self.paths.server_lock(), self.config.lock_timeout).await
    }

    fn load(&self) -> Result<Option<ServerRecord>, CoreError> {
        match read_record(&self.paths.server_record()) {
            Ok(record) => Ok(record),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                warn!(error = %e, "Discarding unreadable server record");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, record: &ServerRecord) -> Result<(), CoreError> {
        write_record(&self.paths.server_record(), record).map_err(Into::into)
    }

    fn clear(&self) -> Result<(), CoreError> {
        delete_record(&self.paths.server_record()).map_err(Into::into)
    }

    /// Bring `record` in line with the live process table.
    fn reconcile(record: &mut ServerRecord) -> Reconciled {
        let mut out = Reconciled::default();
        match record.status {
            ServerState::Running => match record.pid {
                Some(pid) => match check_process(pid, record.started_at, &record.binary) {
                    Liveness::Alive => out.alive = true,
                    Liveness::Dead => {
                        warn!(pid, "Server process exited unexpectedly");
                        record.mark_failed(format!("server process {pid} exited unexpectedly"));
                        out.changed = true;
                    }
                    Liveness::Stale => {
                        warn!(pid, "Recorded pid now belongs to another process");
                        record.mark_failed(format!(
                            "recorded pid {pid} was reused by an unrelated process"
                        ));
                        out.changed = true;
                        out.stale = true;
                    }
                },
                None => {
                    record.mark_failed("running record without a pid");
                    out.changed = true;
                }
            },
            ServerState::Starting => {
                let owner = record.owner_pid;
                if !start_owner_alive(record) {
                    record.mark_failed(format!("start abandoned by exited process {owner}"));
                    out.changed = true;
                } else {
                    out.alive = true;
                }
            }
            ServerState::Stopped | ServerState::Suspended => {}
        }
        out
    }

    /// Load and reconcile, persisting any correction.
    fn load_reconciled(&self) -> Result<Option<(ServerRecord, Reconciled)>, CoreError> {
        let Some(mut record) = self.load()? else {
            return Ok(None);
        };
        let rec = Self::reconcile(&mut record);
        if rec.changed {
            self.save(&record)?;
        }
        Ok(Some((record, rec)))
    }

    /// Start the server with `selection`.
    ///
    /// Fails with `StateConflict` when a server is already starting or
    /// running. On spawn failure the record is removed and the state stays
    /// `Stopped`.
    pub async fn start(
        &self,
        selection: ResolvedSelection,
        extra_args: Vec<String>,
        mode: StartMode,
    ) -> Result<ServerRecord, CoreError> {
        validate_extra_args(&extra_args)?;
        let binary = self.resolve_binary()?;

        let record = {
            let _lock = self.lock().await?;
            if let Some((current, _)) = self.load_reconciled()? {
                if current.status.is_live() {
                    return Err(CoreError::StateConflict(format!(
                        "server is already {} ({})",
                        current.status, current.selection_id
                    )));
                }
            }
            let mut record = ServerRecord::starting(
                selection,
                extra_args,
                binary,
                self.config.host.clone(),
                self.config.port,
            );
            record.owner_started_at = verify::start_time(record.owner_pid);
            self.save(&record)?;
            record
        };

        info!(model = %record.selection_id, port = record.port, "Starting llama-server");
        self.launch(record, mode).await
    }

    /// Spawn from a `Starting` record already on disk.
    async fn launch(
        &self,
        mut record: ServerRecord,
        mode: StartMode,
    ) -> Result<ServerRecord, CoreError> {
        let log_path = match mode {
            StartMode::Background => Some(self.log_path_for(&record.selection_id)),
            StartMode::Foreground(_) => None,
        };

        let spawned = self.spawn_checked(&record, log_path.as_deref());
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.abandon_start().await;
                return Err(e);
            }
        };

        let Some(pid) = child.id() else {
            self.abandon_start().await;
            return Err(CoreError::Process("llama-server exited immediately".into()));
        };
        record.pid = Some(pid);
        record.started_at = verify::start_time(pid);
        record.log_path = log_path;

        if matches!(mode, StartMode::Background) {
            if let Err(e) = self.await_ready(&mut child).await {
                let _ = shutdown_child(&mut child, self.config.stop_grace).await;
                self.abandon_start().await;
                return Err(e);
            }
        }

        record.set_status(ServerState::Running);
        if let Err(e) = self.commit_running(&record).await {
            warn!(pid, error = %e, "Could not record running server; shutting it down");
            let _ = shutdown_child(&mut child, self.config.stop_grace).await;
            self.abandon_start().await;
            return Err(e);
        }
        info!(pid, model = %record.selection_id, "llama-server running");

        match mode {
            StartMode::Background => {
                *self.child.lock().await = Some(child);
                Ok(record)
            }
            StartMode::Foreground(cancel) => self.run_foreground(record, child, cancel).await,
        }
    }

    fn spawn_checked(
        &self,
        record: &ServerRecord,
        log_path: Option<&Path>,
    ) -> Result<Child, CoreError> {
        ensure_port_free(&record.host, record.port)?;
        let args = build_server_args(&record.selection, &self.config.endpoint(), &record.extra_args);
        spawn_server(&record.binary, &args, log_path)
    }

    async fn await_ready(&self, child: &mut Child) -> Result<(), CoreError> {
        if self.config.wait_for_ready {
            let host = probe_host(&self.config.host);
            return wait_for_http_health(host, self.config.port, self.config.startup_timeout, || {
                matches!(child.try_wait(), Ok(None))
            })
            .await;
        }
        tokio::time::sleep(STARTUP_SETTLE).await;
        match child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(CoreError::Process(format!(
                "llama-server exited during startup ({status})"
            ))),
            Err(e) => Err(CoreError::Process(e.to_string())),
        }
    }

    /// Persist the `Running` record under the lock.
    async fn commit_running(&self, record: &ServerRecord) -> Result<(), CoreError> {
        let _lock = self.lock().await?;
        self.save(record)
    }

    /// Remove the `Starting` record after a failed spawn.
    async fn abandon_start(&self) {
        let cleared = async {
            let _lock = self.lock().await?;
            self.clear()
        };
        if let Err(e) = cleared.await {
            warn!(error = %e, "Failed to clear server record after failed start");
        }
    }

    async fn run_foreground(
        &self,
        record: ServerRecord,
        mut child: Child,
        cancel: CancellationToken,
    ) -> Result<ServerRecord, CoreError> {
        let pid = record.pid;
        let exit = tokio::select! {
            status = child.wait() => Some(status),
            () = cancel.cancelled() => {
                info!("Stopping foreground llama-server");
                shutdown_child(&mut child, self.config.stop_grace)
                    .await
                    .map_err(|e| CoreError::Process(e.to_string()))?;
                None
            }
        };

        let _lock = self.lock().await?;
        let mut current = match self.load()? {
            Some(current) if current.pid == pid && current.status == ServerState::Running => {
                current
            }
            // Suspended or stopped by someone else: nothing to clean up.
            _ => return Ok(record),
        };

        let failure = match exit {
            None => None,
            Some(Ok(status)) if status.success() => None,
            Some(Ok(status)) => Some(format!("llama-server exited with {status}")),
            Some(Err(e)) => Some(format!("failed to wait for llama-server: {e}")),
        };
        match failure {
            None => {
                self.clear()?;
                Ok(record)
            }
            Some(reason) => {
                current.mark_failed(reason.clone());
                self.save(&current)?;
                Err(CoreError::Process(reason))
            }
        }
    }

    /// Terminate `pid`, reaping it when we own the child.
    async fn terminate(&self, pid: u32) -> Result<(), CoreError> {
        let mut held = self.child.lock().await;
        let owned = held.as_ref().is_some_and(|c| c.id() == Some(pid));
        let result = if owned {
            match held.as_mut() {
                Some(child) => shutdown_child(child, self.config.stop_grace).await.map(|_| ()),
                None => Ok(()),
            }
        } else {
            terminate_pid(pid, self.config.stop_grace).await
        };
        if owned {
            *held = None;
        }
        result.map_err(|e| CoreError::Process(format!("failed to stop process {pid}: {e}")))
    }

    /// Stop the server. Succeeds as a no-op when nothing runs.
    pub async fn stop(&self) -> Result<StopOutcome, CoreError> {
        let _lock = self.lock().await?;
        let Some(record) = self.load()? else {
            return Ok(StopOutcome::AlreadyStopped);
        };

        let outcome = match record.status {
            ServerState::Stopped => StopOutcome::AlreadyStopped,
            ServerState::Suspended => StopOutcome::SuspensionCleared,
            ServerState::Starting => {
                if start_owner_alive(&record) {
                    return Err(CoreError::StateConflict(
                        "server start is in progress; retry once it completes".into(),
                    ));
                }
                StopOutcome::AlreadyStopped
            }
            ServerState::Running => match record.pid {
                Some(pid)
                    if check_process(pid, record.started_at, &record.binary)
                        == Liveness::Alive =>
                {
                    info!(pid, "Stopping llama-server");
                    self.terminate(pid).await?;
                    StopOutcome::Stopped
                }
                _ => StopOutcome::AlreadyStopped,
            },
        };

        self.clear()?;
        debug!(?outcome, "Stop complete");
        Ok(outcome)
    }

    /// Stop the server but remember its selection for [`resume`](Self::resume).
    pub async fn suspend(&self) -> Result<SuspendOutcome, CoreError> {
        let _lock = self.lock().await?;
        let Some((mut record, rec)) = self.load_reconciled()? else {
            return Ok(SuspendOutcome::NotRunning);
        };

        match record.status {
            ServerState::Suspended => Ok(SuspendOutcome::AlreadySuspended),
            ServerState::Stopped => Ok(SuspendOutcome::NotRunning),
            ServerState::Starting => Err(CoreError::StateConflict(
                "server start is in progress; cannot suspend yet".into(),
            )),
            ServerState::Running => {
                if let (Some(pid), true) = (record.pid, rec.alive) {
                    info!(pid, model = %record.selection_id, "Suspending llama-server");
                    self.terminate(pid).await?;
                }
                record.pid = None;
                record.started_at = None;
                record.set_status(ServerState::Suspended);
                self.save(&record)?;
                Ok(SuspendOutcome::Suspended(Box::new(record.selection)))
            }
        }
    }

    /// Restart a suspended server with its remembered selection.
    pub async fn resume(&self) -> Result<ResumeOutcome, CoreError> {
        let record = {
            let _lock = self.lock().await?;
            let Some((mut record, _)) = self.load_reconciled()? else {
                return Ok(ResumeOutcome::NothingSuspended);
            };
            match record.status {
                ServerState::Running | ServerState::Starting => {
                    return Ok(ResumeOutcome::AlreadyRunning);
                }
                ServerState::Stopped => return Ok(ResumeOutcome::NothingSuspended),
                ServerState::Suspended => {}
            }
            record.owner_pid = std::process::id();
            record.owner_started_at = verify::start_time(record.owner_pid);
            record.last_failure = None;
            record.set_status(ServerState::Starting);
            self.save(&record)?;
            record
        };

        info!(model = %record.selection_id, "Resuming llama-server");
        self.launch(record, StartMode::Background).await?;
        Ok(ResumeOutcome::Resumed)
    }

    /// Reconcile the record with the OS and report.
    ///
    /// When another invocation holds the lock the record is read without
    /// persisting corrections.
    pub async fn status(&self) -> Result<ServerStatusReport, CoreError> {
        let lock = self.lock().await.ok();
        let (record, rec) = match self.load()? {
            Some(mut record) => {
                let rec = Self::reconcile(&mut record);
                if rec.changed && lock.is_some() {
                    self.save(&record)?;
                }
                (Some(record), rec)
            }
            None => (None, Reconciled::default()),
        };
        drop(lock);

        if !rec.alive {
            self.reap_exited().await;
        }

        let state = record.as_ref().map_or(ServerState::Stopped, |r| r.status);
        let process_running = state == ServerState::Running && rec.alive;
        let healthy = if process_running {
            Some(check_http_health(probe_host(&self.config.host), self.config.port).await)
        } else {
            None
        };

        Ok(ServerStatusReport {
            state,
            process_running,
            autostart_registered: self.platform.is_autostart_registered(),
            healthy,
            stale: rec.stale,
            record,
        })
    }

    /// Drop a held child that has already exited.
    async fn reap_exited(&self) {
        let mut held = self.child.lock().await;
        if held.as_mut().is_some_and(|c| !matches!(c.try_wait(), Ok(None))) {
            *held = None;
        }
    }
}

#[async_trait]
impl ServerControlPort for ServerSupervisor {
    async fn suspend(&self) -> Result<SuspendOutcome, CoreError> {
        Self::suspend(self).await
    }

    async fn resume(&self) -> Result<ResumeOutcome, CoreError> {
        Self::resume(self).await
    }
}

/// Whether the process that wrote a `Starting` record is still running.
fn start_owner_alive(record: &ServerRecord) -> bool {
    verify::is_same_process(record.owner_pid, record.owner_started_at)
}

fn probe_host(host: &str) -> &str {
    match host {
        "0.0.0.0" | "::" => "127.0.0.1",
        other => other,
    }
}

/// Fail with `ProcessError` when something already listens on the port.
fn ensure_port_free(host: &str, port: u16) -> Result<(), CoreError> {
    match TcpListener::bind((host, port)) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => Err(CoreError::Process(format!(
            "port {port} on {host} is already in use"
        ))),
        Err(e) => {
            debug!(error = %e, host, port, "Port pre-check inconclusive");
            Ok(())
        }
    }
}
