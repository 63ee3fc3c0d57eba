//! `paths` handler: resolved directories and state files, `key = value`.

use anyhow::Result;

use crate::bootstrap::CliContext;

pub fn execute(ctx: &CliContext) -> Result<()> {
    let binary = ctx
        .supervisor
        .resolve_binary()
        .map_or_else(|e| format!("<{e}>"), |p| p.display().to_string());

    let rows = [
        ("config_file", ctx.config_path.display().to_string()),
        ("models_dir", ctx.dirs.models.display().to_string()),
        ("cache_dir", ctx.dirs.cache.display().to_string()),
        ("log_dir", ctx.dirs.log.display().to_string()),
        ("state_dir", ctx.paths.root().display().to_string()),
        ("server_record", ctx.paths.server_record().display().to_string()),
        ("server_lock", ctx.paths.server_lock().display().to_string()),
        ("watch_checkpoint", ctx.paths.watch_checkpoint().display().to_string()),
        ("watcher_record", ctx.paths.watcher_record().display().to_string()),
        ("llama_server", binary),
    ];
    for (key, value) in rows {
        println!("{key} = {value}");
    }
    Ok(())
}
