//! Cron daemon library exports.
//!
//! This crate provides the CLI daemon binary for the cron task system.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (start, job-kinds, validate)
//! - `handler`: Maintenance handler behind the built-in job kinds

pub mod cli;
pub mod commands;
pub mod handler;

pub use cli::{Cli, Commands};
pub use commands::{
    build_service, init_logging, load_settings, show_job_kinds, start_daemon, validate_form,
    validate_form_file,
};
pub use handler::LoggingMaintenanceHandler;
