//! `autostart` handler.

use anyhow::{Context, Result};

use crate::bootstrap::CliContext;
use crate::commands::AutostartCommand;

pub fn execute(ctx: &CliContext, command: AutostartCommand) -> Result<()> {
    match command {
        AutostartCommand::Enable { model } => {
            let selector = model.unwrap_or_default();
            let program =
                std::env::current_exe().context("cannot locate the local-ai executable")?;
            ctx.platform.register_autostart(&program, &selector)?;
            println!("Auto-start enabled");
            println!("  Model: {selector}");
            println!("  Command: {} start --background --model {selector}", program.display());
        }
        AutostartCommand::Disable => {
            if ctx.platform.is_autostart_registered() {
                ctx.platform.unregister_autostart()?;
                println!("Auto-start disabled");
            } else {
                println!("Auto-start was not enabled");
            }
        }
        AutostartCommand::Status => {
            if ctx.platform.is_autostart_registered() {
                println!("Auto-start is enabled");
            } else {
                println!("Auto-start is disabled");
                println!("Enable with: local-ai autostart enable");
            }
        }
    }
    Ok(())
}
