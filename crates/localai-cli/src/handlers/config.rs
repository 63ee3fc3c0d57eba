//! `config` handler.

use anyhow::Result;
use localai_core::{SystemConfig, save_config};

use crate::bootstrap::{CliConfig, CliContext, resolve_config_path};
use crate::error::CliError;
use crate::presentation::{format_optional, print_separator, truncate_string};

/// `config init`: runs before bootstrap so a broken file can be replaced.
pub fn init(config: &CliConfig, force: bool) -> Result<()> {
    let (_, _, path) = resolve_config_path(config)?;
    if path.exists() && !force {
        return Err(CliError::Arguments(format!(
            "config already exists at {}; use --force to overwrite",
            path.display()
        ))
        .into());
    }
    save_config(&SystemConfig::with_defaults(), &path)?;
    println!("Configuration created at {}", path.display());
    println!("\nEdit this file to customize model definitions, server settings and the Steam watcher.");
    Ok(())
}

/// `config show`.
pub fn show(ctx: &CliContext, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&ctx.config)?);
        return Ok(());
    }

    let server = &ctx.config.server;
    let steam = &ctx.config.steam;
    println!("Configuration file: {}", ctx.config_path.display());
    println!("Models directory:   {}", ctx.dirs.models.display());
    println!("Log directory:      {}", ctx.dirs.log.display());
    println!("Address:            {}:{}", server.host, server.port);
    println!(
        "Default model:      {}",
        format_optional(server.default_model.as_deref(), "auto")
    );
    println!(
        "Steam watcher:      {}",
        if steam.enabled { "enabled" } else { "disabled" }
    );
    if !steam.processes_to_kill.is_empty() {
        println!("Kill on game start: {}", steam.processes_to_kill.join(", "));
    }

    println!("\n{:<16} {:<28} {}", "ID", "Name", "Pattern");
    print_separator(80);
    for def in ctx.catalog.definitions() {
        println!(
            "{:<16} {:<28} {}",
            truncate_string(&def.id, 16),
            truncate_string(&def.name, 28),
            truncate_string(def.match_rule(), 40)
        );
    }
    Ok(())
}
