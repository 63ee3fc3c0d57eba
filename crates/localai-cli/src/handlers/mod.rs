//! Command handlers.
//!
//! Handlers are thin: they parse CLI-specific input, call the catalog or the
//! supervisor through [`CliContext`](crate::bootstrap::CliContext) and format
//! the result for the terminal.

pub mod autostart;
pub mod config;
pub mod list_models;
pub mod paths;
pub mod start;
pub mod status;
pub mod steam;
pub mod stop;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Token cancelled on Ctrl+C or, on unix, SIGTERM.
pub(crate) fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown requested");
        trigger.cancel();
    });
    token
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
