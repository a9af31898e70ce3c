//! CLI argument parsing for the cron daemon.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cron Task Daemon
///
/// Persists task configurations and runs them on their cron schedules.
#[derive(Parser, Debug)]
#[command(name = "cron-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/task-cron/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the daemon in the foreground
    Start {
        /// Override HTTP port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override database path
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Print the job kind catalog
    JobKinds,

    /// Validate a task configuration form (JSON) against the catalog
    Validate {
        /// Path to the form file
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_start() {
        let cli = Cli::parse_from(["cron-daemon", "start"]);
        match cli.command {
            Commands::Start { port, db_path } => {
                assert!(port.is_none());
                assert!(db_path.is_none());
            }
            _ => panic!("Expected Start command"),
        }
    }

    #[test]
    fn test_cli_start_with_overrides() {
        let cli = Cli::parse_from([
            "cron-daemon",
            "start",
            "-p",
            "9999",
            "--db-path",
            "/tmp/cron-db",
        ]);
        match cli.command {
            Commands::Start { port, db_path } => {
                assert_eq!(port, Some(9999));
                assert_eq!(db_path.as_deref(), Some("/tmp/cron-db"));
            }
            _ => panic!("Expected Start command"),
        }
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["cron-daemon", "--config", "/path/to/config.toml", "start"]);
        assert_eq!(cli.config, Some("/path/to/config.toml".to_string()));
    }

    #[test]
    fn test_cli_global_log_level() {
        let cli = Cli::parse_from(["cron-daemon", "job-kinds", "--log-level", "debug"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::JobKinds));
    }

    #[test]
    fn test_cli_validate() {
        let cli = Cli::parse_from(["cron-daemon", "validate", "task.json"]);
        match cli.command {
            Commands::Validate { file } => assert_eq!(file, PathBuf::from("task.json")),
            _ => panic!("Expected Validate command"),
        }
    }
}
