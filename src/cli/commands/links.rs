//! Links command - show the release links of a project

use crate::cli::args::{LinksArgs, OutputFormat};
use crate::cli::commands::WARN;
use crate::config::Config;
use crate::error::MirrorResult;
use crate::mirror::{create_stage, ProjectLinks};
use crate::resolver::ResolvedEntry;
use console::style;

/// Execute the links command
pub async fn execute(args: LinksArgs, config: &Config) -> MirrorResult<()> {
    let stage = create_stage(config).await?;
    let links = stage.get_links(&args.project).await?;

    match args.format {
        OutputFormat::Table => print_table(&args.project, &links),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(links.entries())?),
        OutputFormat::Plain => {
            for entry in links.entries() {
                println!("{}", entry.href());
            }
        }
    }

    Ok(())
}

fn print_table(project: &str, links: &ProjectLinks) {
    if links.is_absent() {
        println!("{}Project {} does not exist upstream", WARN, style(project).bold());
        return;
    }

    println!(
        "{:<40} {:<12} {}",
        style("FILE").bold(),
        style("VERSION").bold(),
        style("KEY").bold()
    );
    println!("{}", "-".repeat(100));
    for entry in links.entries() {
        print_row(entry);
    }
    println!();
    println!("{} release file(s)", links.entries().len());
}

fn print_row(entry: &ResolvedEntry) {
    let version = entry.egg_or_version().unwrap_or_else(|| "-".to_string());
    let hashed = if entry.hash_spec.is_some() {
        style(entry.key.as_str()).green()
    } else {
        style(entry.key.as_str()).dim()
    };
    println!("{:<40} {:<12} {}", entry.basename, version, hashed);
}
