//! Health check utilities for llama-server processes.

use std::time::Duration;

use localai_core::CoreError;
use reqwest::Client;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

fn health_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/health")
}

fn client() -> Result<Client, CoreError> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| CoreError::Internal(format!("failed to build HTTP client: {e}")))
}

/// Check HTTP health of a server once.
pub async fn check_http_health(host: &str, port: u16) -> bool {
    let Ok(client) = client() else {
        return false;
    };
    matches!(
        client.get(health_url(host, port)).send().await,
        Ok(response) if response.status().is_success()
    )
}

/// Poll `/health` until it returns 200 OK or `timeout` elapses.
///
/// `still_running` is consulted between attempts so a child that dies during
/// startup fails fast instead of waiting out the timeout.
pub async fn wait_for_http_health<F>(
    host: &str,
    port: u16,
    timeout: Duration,
    mut still_running: F,
) -> Result<(), CoreError>
where
    F: FnMut() -> bool,
{
    let url = health_url(host, port);
    info!("Waiting for llama-server to be ready at {}", url);
    let client = client()?;
    let deadline = Instant::now() + timeout;

    loop {
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!("llama-server is ready on port {}", port);
                return Ok(());
            }
            Ok(response) => {
                debug!("Health check returned status {}, retrying...", response.status());
            }
            Err(e) => {
                debug!("Health check failed: {}, retrying...", e);
            }
        }

        if !still_running() {
            return Err(CoreError::Process(
                "llama-server exited during startup".into(),
            ));
        }
        if Instant::now() >= deadline {
            return Err(CoreError::Process(format!(
                "llama-server failed to become ready within {}s on port {}",
                timeout.as_secs(),
                port
            )));
        }
        sleep(POLL_INTERVAL).await;
    }
}
