//! Error types for the scheduler crate.
//!
//! Covers job kind resolution, cron expression and timezone parsing,
//! trigger registration and validator assembly.

use thiserror::Error;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration references a job kind nobody registered
    #[error("Job kind not found: {0}")]
    JobKindNotFound(String),

    /// A job kind id was registered twice
    #[error("Job kind already registered: {0}")]
    DuplicateJobKind(String),

    /// Invalid cron expression
    #[error("Invalid cron expression: {0}")]
    InvalidCron(String),

    /// Invalid timezone string
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Trigger or execution could not be registered
    #[error("Scheduling failed: {0}")]
    Scheduling(String),

    /// No job registered under the id
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Scheduler has been shut down
    #[error("Scheduler is not running")]
    NotRunning,

    /// A schema declares a type tag with no registered validator
    #[error("No validator for type [{field_type}] declared by field [{field}] of job kind [{job_kind}]")]
    UnknownFieldType {
        job_kind: String,
        field: String,
        field_type: String,
    },

    /// A schema declares an autocomplete source with no registered validator
    #[error("No autocomplete source [{source_id}] declared by field [{field}] of job kind [{job_kind}]")]
    UnknownAutocompleteSource {
        job_kind: String,
        field: String,
        source_id: String,
    },
}
