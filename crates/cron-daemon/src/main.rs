//! Cron Task Daemon
//!
//! Persists task configurations and runs them on their cron schedules.
//!
//! # Usage
//!
//! ```bash
//! cron-daemon start [--port PORT] [--db-path PATH]
//! cron-daemon job-kinds
//! cron-daemon validate task.json
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/task-cron/config.toml)
//! 3. Environment variables (CRON_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use cron_daemon::{show_job_kinds, start_daemon, validate_form_file, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { port, db_path } => {
            start_daemon(
                cli.config.as_deref(),
                port,
                db_path.as_deref(),
                cli.log_level.as_deref(),
            )
            .await?;
        }
        Commands::JobKinds => {
            show_job_kinds(cli.config.as_deref())?;
        }
        Commands::Validate { file } => {
            validate_form_file(cli.config.as_deref(), &file)?;
        }
    }

    Ok(())
}
