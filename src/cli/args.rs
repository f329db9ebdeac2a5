//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// simplemirror - caching mirror of a Python simple package index
///
/// Serves release links of upstream projects from a transactional cache
/// shared by a master and its replicas.
#[derive(Parser, Debug)]
#[command(name = "simplemirror")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SIMPLEMIRROR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the release links of a project
    Links(LinksArgs),

    /// Show the versions of a project
    Versions(VersionsArgs),

    /// List all projects known to the mirror
    Projects(ProjectsArgs),

    /// Retrieve the initial name/serial list
    Init(InitArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the links command
#[derive(Parser, Debug)]
pub struct LinksArgs {
    /// Project name (any spelling, it is normalized)
    pub project: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the versions command
#[derive(Parser, Debug)]
pub struct VersionsArgs {
    /// Project name
    pub project: String,

    /// Show the release files of one version as JSON
    #[arg(short, long, value_name = "VERSION")]
    pub release: Option<String>,
}

/// Arguments for the projects command
#[derive(Parser, Debug)]
pub struct ProjectsArgs {
    /// Output format
    #[arg(short, long, default_value = "plain")]
    pub format: OutputFormat,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Discard an existing name/serial snapshot first
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_links() {
        let cli = Cli::parse_from(["simplemirror", "links", "Django", "--format", "json"]);
        match cli.command {
            Commands::Links(args) => {
                assert_eq!(args.project, "Django");
                assert!(matches!(args.format, OutputFormat::Json));
            }
            _ => panic!("expected Links command"),
        }
    }

    #[test]
    fn cli_parses_versions_with_version() {
        let cli = Cli::parse_from(["simplemirror", "versions", "py", "--release", "1.4"]);
        match cli.command {
            Commands::Versions(args) => {
                assert_eq!(args.project, "py");
                assert_eq!(args.release.as_deref(), Some("1.4"));
            }
            _ => panic!("expected Versions command"),
        }
    }

    #[test]
    fn cli_parses_projects_default_format() {
        let cli = Cli::parse_from(["simplemirror", "projects"]);
        match cli.command {
            Commands::Projects(args) => assert!(matches!(args.format, OutputFormat::Plain)),
            _ => panic!("expected Projects command"),
        }
    }

    #[test]
    fn cli_parses_init_force() {
        let cli = Cli::parse_from(["simplemirror", "init", "--force"]);
        match cli.command {
            Commands::Init(args) => assert!(args.force),
            _ => panic!("expected Init command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["simplemirror", "-vv", "-c", "/tmp/m.toml", "config", "path"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.toml")));
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Path)
            })
        ));
    }
}
