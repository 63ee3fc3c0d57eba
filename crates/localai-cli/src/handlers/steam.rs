//! `steam` handler: run, stop and inspect the game watcher.

use std::sync::Arc;

use anyhow::Result;
use localai_core::{ServerControlPort, WatcherRecord};
use localai_runtime::process::terminate_pid;
use localai_runtime::record::verify::{Liveness, check_watcher};
use localai_runtime::record::{delete_record, read_record};
use localai_runtime::{SteamWatcher, WatcherOptions, locate_steam_log};
use tracing::debug;

use super::shutdown_token;
use crate::bootstrap::CliContext;
use crate::commands::SteamCommand;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext, command: SteamCommand) -> Result<()> {
    match command {
        SteamCommand::Start => start(ctx).await,
        SteamCommand::Stop => stop(ctx).await,
        SteamCommand::Status => status(ctx),
    }
}

/// Live watcher record, removing one left behind by a dead watcher.
///
/// A record whose pid now belongs to another process is removed too, so
/// `steam stop` never signals it.
fn live_record(ctx: &CliContext) -> Result<Option<WatcherRecord>> {
    let path = ctx.paths.watcher_record();
    let Some(record) = read_record::<WatcherRecord>(&path)? else {
        return Ok(None);
    };
    match check_watcher(&record) {
        Liveness::Alive => Ok(Some(record)),
        liveness => {
            debug!(pid = record.pid, ?liveness, "Removing watcher record");
            delete_record(&path)?;
            Ok(None)
        }
    }
}

async fn start(ctx: &CliContext) -> Result<()> {
    let steam = &ctx.config.steam;
    if !steam.enabled {
        return Err(CliError::Config(
            "the Steam watcher is disabled (steam.enabled = false)".into(),
        )
        .into());
    }
    if let Some(running) = live_record(ctx)? {
        return Err(CliError::StateConflict(format!(
            "a watcher is already running (pid {})",
            running.pid
        ))
        .into());
    }

    let log_path = locate_steam_log(steam, ctx.platform.as_ref())?;
    println!("Watching {}", log_path.display());
    println!("Press Ctrl+C to stop.\n");

    let control: Arc<dyn ServerControlPort> = ctx.supervisor.clone();
    let watcher = SteamWatcher::new(
        WatcherOptions::from_settings(steam, log_path),
        ctx.paths.clone(),
        control,
        Arc::clone(&ctx.platform),
    );
    let summary = watcher.run(shutdown_token()).await?;
    println!(
        "Watcher stopped after {} event(s), state {}",
        summary.events, summary.state
    );
    Ok(())
}

async fn stop(ctx: &CliContext) -> Result<()> {
    let Some(record) = live_record(ctx)? else {
        println!("Steam watcher is not running");
        return Ok(());
    };
    terminate_pid(record.pid, ctx.supervisor.config().stop_grace)
        .await
        .map_err(|e| CliError::Process(format!("failed to stop watcher {}: {e}", record.pid)))?;
    delete_record(&ctx.paths.watcher_record())?;
    println!("Stopped watcher (pid {})", record.pid);
    Ok(())
}

fn status(ctx: &CliContext) -> Result<()> {
    let Some(record) = live_record(ctx)? else {
        println!("Steam watcher is not running");
        println!("Start with: local-ai steam start");
        return Ok(());
    };
    println!("Steam watcher is running (pid {})", record.pid);
    println!("  Log: {}", record.log_path.display());
    println!("  State: {}", record.state);
    if let Some(process) = &record.active_process {
        println!("  Game: {process}");
    }
    println!("  Offset: {}", record.offset);
    println!(
        "  Since: {}",
        record.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(error) = &record.last_error {
        println!("  Last error: {error}");
    }
    Ok(())
}
