use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forklift")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Provision a modular host application from declared git sources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/forklift/config.toml)
    #[arg(short, long, global = true, env = "FORKLIFT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the provisioning pipeline (extract, deps, bootstrap, restart)
    Run(RunArgs),

    /// Clone sources and extract the selected components
    Extract,

    /// Install dependency manifests into the virtualenv
    Deps {
        /// Recreate the virtualenv from scratch; by default an existing one is reused
        #[arg(long)]
        fresh_venv: bool,
    },

    /// Update the schema and activate the selected components
    Bootstrap,

    /// Configure a running instance through its administrative API
    Configure {
        /// Report what would change without changing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show sources, components and the bootstrap request
    Plan {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load and validate the config file
    Validate,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct RunArgs {
    /// Skip specific stages (comma-separated)
    #[arg(long, conflicts_with = "only")]
    pub skip: Option<String>,

    /// Only run specific stages (comma-separated)
    #[arg(long)]
    pub only: Option<String>,

    /// List all available stages
    #[arg(long)]
    pub list_stages: bool,

    /// Dry run - show what would be done
    #[arg(long)]
    pub dry_run: bool,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Recreate the virtualenv from scratch so this deployment gets a fresh
    /// one; by default an existing virtualenv is reused
    #[arg(long)]
    pub fresh_venv: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from(["forklift", "-vv", "run", "--only", "extract,deps", "--yes"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.only.as_deref(), Some("extract,deps"));
                assert!(args.yes);
                assert!(!args.dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_only_conflicts_with_skip() {
        let result = Cli::try_parse_from(["forklift", "run", "--only", "deps", "--skip", "extract"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["forklift", "plan", "--config", "/etc/forklift.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/forklift.toml")));
    }

    #[test]
    fn test_fresh_venv_help_explains_reuse() {
        let cmd = Cli::command();
        let run = cmd.find_subcommand("run").unwrap();
        let help = run
            .get_arguments()
            .find(|a| a.get_id() == "fresh_venv")
            .and_then(|a| a.get_help())
            .unwrap()
            .to_string();
        assert!(help.contains("fresh"));
        assert!(help.contains("reused"));
    }
}
