//! Versions command - show the versions of a project

use crate::cli::args::VersionsArgs;
use crate::config::Config;
use crate::error::{MirrorError, MirrorResult};
use crate::mirror::create_stage;

/// Execute the versions command
pub async fn execute(args: VersionsArgs, config: &Config) -> MirrorResult<()> {
    let stage = create_stage(config).await?;

    if let Some(release) = args.release {
        let data = stage
            .get_version_data(&args.project, &release)
            .await?
            .ok_or_else(|| {
                MirrorError::User(format!("{} has no release {}", args.project, release))
            })?;
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if !stage.has_project(&args.project).await? {
        return Err(MirrorError::User(format!(
            "Project {} does not exist upstream",
            args.project
        )));
    }
    for version in stage.list_versions(&args.project).await? {
        println!("{}", version);
    }

    Ok(())
}
