//! `stop` handler.

use anyhow::Result;
use localai_core::StopOutcome;

use crate::bootstrap::CliContext;

pub async fn execute(ctx: &CliContext) -> Result<()> {
    match ctx.supervisor.stop().await? {
        StopOutcome::Stopped => println!("Server stopped"),
        StopOutcome::AlreadyStopped => println!("Server is not running"),
        StopOutcome::SuspensionCleared => {
            println!("Server was suspended by the game watcher; it will not be resumed");
        }
    }
    Ok(())
}
