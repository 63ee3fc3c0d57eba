//! `status` handler.
//!
//! Process state and autostart registration are reported as two separate
//! lines; one never implies the other.

use anyhow::Result;
use localai_core::{ServerState, ServerStatusReport};

use crate::bootstrap::CliContext;

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let report = ctx.supervisor.status().await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ServerStatusReport) {
    match (report.state, report.healthy) {
        (ServerState::Running, Some(true)) => println!("Server: running and healthy"),
        (ServerState::Running, _) => println!("Server: running but not responding"),
        (ServerState::Suspended, _) => println!("Server: suspended while a game runs"),
        (ServerState::Starting, _) => println!("Server: starting"),
        (ServerState::Stopped, _) => println!("Server: not running"),
    }

    if let Some(record) = &report.record {
        if report.state != ServerState::Stopped {
            println!("  Model: {} ({})", record.selection.primary.definition.name, record.selection_id);
            println!("  Address: http://{}", record.address());
        }
        if let Some(pid) = record.pid.filter(|_| report.process_running) {
            println!("  PID: {pid}");
        }
        if let Some(log) = &record.log_path {
            println!("  Logs: {}", log.display());
        }
    }
    if report.stale {
        println!("  Note: the recorded process id now belongs to another program");
    }
    if let Some(reason) = report.last_failure() {
        println!("  Last failure: {reason}");
    }

    let autostart = if report.autostart_registered {
        "enabled"
    } else {
        "disabled"
    };
    println!("Auto-start: {autostart}");
}
