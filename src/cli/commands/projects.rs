//! Projects command - list the projects served through the mirror

use crate::cli::args::{OutputFormat, ProjectsArgs};
use crate::config::Config;
use crate::error::MirrorResult;
use crate::mirror::create_stage;
use console::style;

/// Execute the projects command
pub async fn execute(args: ProjectsArgs, config: &Config) -> MirrorResult<()> {
    let stage = create_stage(config).await?;
    let projects = stage.list_projects();

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&projects)?),
        OutputFormat::Plain => {
            for project in &projects {
                println!("{}", project);
            }
        }
        OutputFormat::Table => {
            println!("{}", style("PROJECT").bold());
            println!("{}", "-".repeat(40));
            for project in &projects {
                println!("{}", project);
            }
            println!();
            println!("{} project(s)", projects.len());
        }
    }

    Ok(())
}
