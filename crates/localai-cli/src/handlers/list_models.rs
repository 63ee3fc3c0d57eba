//! `list-models` handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::{format_optional, format_size, print_separator, truncate_string};

/// Print every declared model with its availability.
///
/// With `verbose`, the resolved file path and size are shown too.
pub fn execute(ctx: &CliContext, verbose: bool) -> Result<()> {
    let files = ctx.catalog.discover(&ctx.dirs.models);
    let entries = ctx.catalog.entries(&files);
    let auto = ctx.catalog.auto_choice(&files);

    println!("Models directory: {}\n", ctx.dirs.models.display());
    println!(
        "{:<3} {:<16} {:<28} {:>8} {:>8} {:<12}",
        "", "ID", "Name", "Priority", "Context", "Draft"
    );
    print_separator(80);

    for entry in &entries {
        let def = entry.definition;
        let marker = if entry.is_available() { "✓" } else { "✗" };
        println!(
            "{:<3} {:<16} {:<28} {:>8} {:>8} {:<12}",
            marker,
            truncate_string(&def.id, 16),
            truncate_string(&def.name, 28),
            def.priority,
            def.ctx_size,
            format_optional(def.draft_model_id.as_deref(), "--"),
        );
        if verbose {
            match entry.file {
                Some(file) => println!(
                    "    {} ({})",
                    file.path.display(),
                    format_size(file.size)
                ),
                None => println!("    matches: {}", def.match_rule()),
            }
        }
    }

    println!();
    match auto {
        Some(def) => println!("Auto-selected: {} ({})", def.name, def.id),
        None => {
            println!("No models available.");
            println!(
                "Download a GGUF model into {}",
                ctx.dirs.models.display()
            );
        }
    }
    Ok(())
}
