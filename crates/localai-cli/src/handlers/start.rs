//! `start` handler.

use anyhow::{Context, Result};
use localai_core::{ModelSelector, ServerRecord, override_context, parse_extra_args};
use localai_runtime::StartMode;

use super::shutdown_token;
use crate::bootstrap::CliContext;
use crate::commands::StartArgs;

/// Resolve the selection and start the server.
///
/// Background mode returns once the server answers its health check;
/// foreground mode blocks until the server exits or Ctrl+C.
pub async fn execute(ctx: &CliContext, args: StartArgs) -> Result<()> {
    let selector = args.model.unwrap_or_default();
    let extra_args = match args.extra_args.as_deref() {
        Some(raw) => parse_extra_args(raw)?,
        None => Vec::new(),
    };

    let selection = ctx.catalog.resolve(&ctx.dirs.models, &selector)?;
    let selection = override_context(selection, args.context)?;

    let primary = &selection.primary;
    println!(
        "Starting {} ({}) on {}:{}",
        primary.definition.name,
        primary.path.display(),
        ctx.config.server.host,
        ctx.config.server.port
    );
    println!("  Context: {}", primary.definition.ctx_size);
    if let Some(draft) = &selection.draft {
        println!("  Draft model: {} ({})", draft.definition.name, draft.path.display());
    }
    if !extra_args.is_empty() {
        println!("  Extra args: {}", extra_args.join(" "));
    }

    if args.autostart {
        enable_autostart(ctx, &selector)?;
    }

    if args.background {
        let record = ctx
            .supervisor
            .start(selection, extra_args, StartMode::Background)
            .await?;
        print_started(&record);
    } else {
        println!("Press Ctrl+C to stop.\n");
        ctx.supervisor
            .start(selection, extra_args, StartMode::Foreground(shutdown_token()))
            .await?;
        println!("Server stopped");
    }
    Ok(())
}

fn enable_autostart(ctx: &CliContext, selector: &ModelSelector) -> Result<()> {
    let program = std::env::current_exe().context("cannot locate the local-ai executable")?;
    ctx.platform.register_autostart(&program, selector)?;
    println!("Auto-start enabled; disable with: local-ai autostart disable");
    Ok(())
}

fn print_started(record: &ServerRecord) {
    println!("Server started in background");
    if let Some(pid) = record.pid {
        println!("  PID: {pid}");
    }
    println!("  Address: http://{}", record.address());
    if let Some(log) = &record.log_path {
        println!("  Logs: {}", log.display());
    }
}
