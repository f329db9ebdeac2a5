//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::cli::commands::{CHECK, WARN};
use crate::config::{Config, ConfigManager};
use crate::error::MirrorResult;
use console::style;

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> MirrorResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> MirrorResult<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> MirrorResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        println!(
            "{}Config already exists at {}",
            WARN,
            style(path.display()).bold()
        );
        println!("  {}", style("Use --force to overwrite").dim());
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    println!(
        "{}Configuration initialized at {}",
        CHECK,
        style(path.display()).bold()
    );

    Ok(())
}
