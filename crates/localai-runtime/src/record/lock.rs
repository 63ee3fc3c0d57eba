//! Cross-invocation lock guarding the server record.
//!
//! An advisory exclusive lock on a sibling `server.lock` file. The record
//! itself is replaced by rename on every write, so it cannot carry the lock.
//! The lock is released when the guard is dropped or the process dies.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::time::Duration;

use localai_core::CoreError;
use tokio::time::{Instant, sleep};
use tracing::debug;

const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Held exclusive lock. Unlocks on drop.
#[derive(Debug)]
pub struct StateLock {
    #[cfg(unix)]
    _guard: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _guard: File,
}

impl StateLock {
    /// Acquire the lock at `path`, waiting at most `timeout`.
    ///
    /// Timing out means another invocation is mid-transition and maps to
    /// `StateConflict`.
    pub async fn acquire(path: &Path, timeout: Duration) -> Result<Self, CoreError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let deadline = Instant::now() + timeout;
        let mut file = open_lock_file(path)?;

        loop {
            match try_lock(file)? {
                Ok(lock) => return Ok(lock),
                Err(returned) => file = returned,
            }
            if Instant::now() >= deadline {
                debug!(path = %path.display(), "State lock busy");
                return Err(CoreError::StateConflict(
                    "another local-ai command is changing the server state".into(),
                ));
            }
            sleep(RETRY_INTERVAL).await;
        }
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
}

/// `Ok(Ok(lock))` when acquired, `Ok(Err(file))` when busy.
#[cfg(unix)]
fn try_lock(file: File) -> io::Result<Result<StateLock, File>> {
    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};

    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(guard) => Ok(Ok(StateLock { _guard: guard })),
        Err((file, errno)) if errno == Errno::EWOULDBLOCK => Ok(Err(file)),
        Err((_, errno)) => Err(io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
fn try_lock(file: File) -> io::Result<Result<StateLock, File>> {
    match file.try_lock() {
        Ok(()) => Ok(Ok(StateLock { _guard: file })),
        Err(std::fs::TryLockError::WouldBlock) => Ok(Err(file)),
        Err(std::fs::TryLockError::Error(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn second_acquire_times_out_with_conflict() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("server.lock");

        let held = StateLock::acquire(&path, Duration::from_millis(100))
            .await
            .unwrap();
        let err = StateLock::acquire(&path, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "state_conflict");

        drop(held);
        assert!(
            StateLock::acquire(&path, Duration::from_millis(100))
                .await
                .is_ok()
        );
    }
}
