//! CLI entry point - the composition root.
//!
//! Parses arguments, initialises logging, bootstraps the [`CliContext`] and
//! dispatches to the handlers. Errors are mapped to sysexits-style codes.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use localai_cli::{Cli, CliConfig, Commands, ConfigCommand, bootstrap, exit_code_for, handlers};

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = CliConfig {
        config_path: cli.config,
    };
    if let Commands::Config {
        command: ConfigCommand::Init { force },
    } = command
    {
        return handlers::config::init(&config, force);
    }

    let ctx = bootstrap(&config)?;

    match command {
        Commands::ListModels => handlers::list_models::execute(&ctx, cli.verbose),
        Commands::Start(args) => handlers::start::execute(&ctx, args).await,
        Commands::Stop => handlers::stop::execute(&ctx).await,
        Commands::Status => handlers::status::execute(&ctx).await,
        Commands::Steam { command } => handlers::steam::execute(&ctx, command).await,
        Commands::Autostart { command } => handlers::autostart::execute(&ctx, command),
        Commands::Config { command } => match command {
            ConfigCommand::Show { json } => handlers::config::show(&ctx, json),
            ConfigCommand::Init { force } => handlers::config::init(&config, force),
        },
        Commands::Paths => handlers::paths::execute(&ctx),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if cli.command.as_ref().is_some_and(Commands::is_long_running) {
        "info"
    } else {
        "warn"
    };
    init_tracing(default_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(u8::try_from(exit_code_for(&err)).unwrap_or(1))
        }
    }
}
