//! Job bodies and the contract the runner invokes them through.
//!
//! # Available Jobs
//!
//! - **builtin**: artifact repository maintenance kinds and the dynamic
//!   script kind, delegating to a host supplied `MaintenanceHandler`

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod builtin;

pub use builtin::{
    register_builtin_job_kinds, MaintenanceHandler, MaintenanceRequest,
    CLEANUP_EXPIRED_ARTIFACTS_JOB_KIND, DOWNLOAD_REMOTE_MAVEN_INDEX_JOB_KIND,
    REBUILD_MAVEN_INDEXES_JOB_KIND, REBUILD_MAVEN_METADATA_JOB_KIND, REGENERATE_CHECKSUM_JOB_KIND,
    REPOSITORY_ID_SOURCE, SCRIPT_FILE_NAME_FIELD, SCRIPT_JOB_KIND, STORAGE_ID_SOURCE,
};

/// Failure reported by a job body.
#[derive(Debug, Error)]
pub enum JobError {
    /// A parameter the body needs is absent or malformed
    #[error("Invalid parameter [{name}]: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// The body ran and failed
    #[error("{0}")]
    Failed(String),

    /// The body observed its cancellation token and stopped early
    #[error("Job cancelled")]
    Cancelled,
}

/// Everything a job body receives when it fires.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub task_id: String,
    pub name: String,
    pub properties: BTreeMap<String, String>,
    /// Cancelled when the scheduler shuts down
    pub cancel: CancellationToken,
}

impl JobContext {
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Fetch a property that must be present and non-blank
    pub fn required(&self, name: &str) -> Result<&str, JobError> {
        self.property(name).ok_or_else(|| JobError::InvalidParameter {
            name: name.to_string(),
            reason: "not provided".to_string(),
        })
    }

    /// Parse an optional property, `None` when absent or blank
    pub fn parsed<T>(&self, name: &str) -> Result<Option<T>, JobError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.property(name)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| JobError::InvalidParameter {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    /// Boolean property, case-insensitive; `default` when absent or blank
    pub fn flag(&self, name: &str, default: bool) -> Result<bool, JobError> {
        match self.property(name).map(str::trim) {
            None => Ok(default),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            Some(v) => Err(JobError::InvalidParameter {
                name: name.to_string(),
                reason: format!("[{}] is not a boolean", v),
            }),
        }
    }
}

/// Runnable behavior of a job kind.
///
/// A fresh instance is produced by the kind's factory for every firing.
#[async_trait]
pub trait CronJob: Send + Sync {
    async fn run(&self, ctx: JobContext) -> Result<(), JobError>;
}
