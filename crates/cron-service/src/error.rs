//! Error types for the task configuration service.

use thiserror::Error;

use cron_scheduler::{SchedulerError, ValidationErrors};
use cron_storage::StorageError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The submitted form was rejected; carries every violation
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Task configuration not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulerError),
}

impl From<ValidationErrors> for ServiceError {
    fn from(errors: ValidationErrors) -> Self {
        ServiceError::Validation(errors)
    }
}
