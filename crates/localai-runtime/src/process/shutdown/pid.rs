//! Terminate a server by pid when no `Child` handle is held.
//!
//! This is the path taken when another invocation started the server.

use std::io;
use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::record::verify::is_running;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time allowed for the process to vanish after SIGKILL.
const KILL_WAIT: Duration = Duration::from_secs(2);

/// Terminate `pid` with SIGTERM → SIGKILL escalation.
///
/// # Strategy
/// 1. Send SIGTERM
/// 2. Poll liveness for up to `grace`
/// 3. If still alive, send SIGKILL and poll again briefly
///
/// Zombies count as gone. Returns `Ok(())` if the process was killed or was
/// already gone.
pub async fn terminate_pid(pid: u32, grace: Duration) -> io::Result<()> {
    #[cfg(unix)]
    {
        terminate_unix(pid, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        terminate_forcefully(pid).await
    }
}

async fn wait_gone(pid: u32, budget: Duration) -> bool {
    let deadline = Instant::now() + budget;
    loop {
        if !is_running(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL_INTERVAL).await;
    }
}

#[cfg(unix)]
async fn terminate_unix(pid: u32, grace: Duration) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    #[allow(clippy::cast_possible_wrap)]
    let nix_pid = Pid::from_raw(pid as i32);

    // Phase 1: SIGTERM
    match signal::kill(nix_pid, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(()),
        Err(e) => return Err(io::Error::other(e)),
    }
    if wait_gone(pid, grace).await {
        return Ok(());
    }

    // Phase 2: SIGKILL
    tracing::warn!(pid, "Process still alive after grace period, sending SIGKILL");
    match signal::kill(nix_pid, Signal::SIGKILL) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(()),
        Err(e) => return Err(io::Error::other(e)),
    }
    if wait_gone(pid, KILL_WAIT).await {
        return Ok(());
    }

    Err(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("process {pid} did not exit after SIGKILL"),
    ))
}

#[cfg(not(unix))]
async fn terminate_forcefully(pid: u32) -> io::Result<()> {
    use sysinfo::{Pid, ProcessesToUpdate, System};

    let spid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[spid]), true);
    if let Some(process) = system.process(spid) {
        process.kill();
    }
    if wait_gone(pid, KILL_WAIT).await {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("process {pid} did not exit"),
        ))
    }
}
