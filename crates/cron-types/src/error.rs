//! Error types for the cron task system.

use thiserror::Error;

/// Errors raised while loading shared settings.
#[derive(Debug, Error)]
pub enum CronError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
