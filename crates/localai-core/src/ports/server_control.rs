//! Port through which the watcher drives the supervisor.

use async_trait::async_trait;

use crate::domain::{ResumeOutcome, SuspendOutcome};
use crate::error::CoreError;

/// Suspend/resume surface of the server supervisor.
///
/// Both calls are idempotent. The watcher depends on this trait only, so it
/// can be exercised against a mock.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait ServerControlPort: Send + Sync {
    /// Stop the server, remembering its selection for [`resume`](Self::resume).
    async fn suspend(&self) -> Result<SuspendOutcome, CoreError>;

    /// Restart the server with the remembered selection.
    async fn resume(&self) -> Result<ResumeOutcome, CoreError>;
}
