//! Init command - retrieve the initial name/serial list

use crate::cli::args::InitArgs;
use crate::cli::commands::CHECK;
use crate::config::{Config, ConfigManager};
use crate::error::{MirrorError, MirrorResult};
use crate::mirror::create_stage;
use console::style;
use tokio::fs;
use tracing::info;

/// Execute the init command
pub async fn execute(args: InitArgs, config: &Config) -> MirrorResult<()> {
    let snapshot = ConfigManager::serials_path(config);
    if args.force && snapshot.exists() {
        fs::remove_file(&snapshot)
            .await
            .map_err(|e| MirrorError::io(format!("removing {}", snapshot.display()), e))?;
        info!("Discarded serial snapshot {}", snapshot.display());
    }

    let stage = create_stage(config).await?;
    println!(
        "{}{} projects known from {}",
        CHECK,
        style(stage.list_projects().len()).bold(),
        stage.simple_url()
    );
    println!("  {}", style(snapshot.display()).dim());

    Ok(())
}
