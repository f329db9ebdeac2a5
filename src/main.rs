//! simplemirror - caching mirror of a Python simple package index
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use simplemirror::cli::{Cli, Commands};
use simplemirror::config::ConfigManager;
use simplemirror::error::MirrorResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> MirrorResult<()> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("simplemirror=warn"),
        1 => EnvFilter::new("simplemirror=info"),
        _ => EnvFilter::new("simplemirror=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }
    debug!("Loaded configuration from {}", config_manager.path().display());

    match cli.command {
        Commands::Links(args) => simplemirror::cli::commands::links(args, &config).await,
        Commands::Versions(args) => simplemirror::cli::commands::versions(args, &config).await,
        Commands::Projects(args) => simplemirror::cli::commands::projects(args, &config).await,
        Commands::Init(args) => simplemirror::cli::commands::init(args, &config).await,
        Commands::Config(args) => {
            simplemirror::cli::commands::config(args, &config_manager, &config).await
        }
    }
}
