//! Scheduling core of the cron task system.
//!
//! # Components
//!
//! - `JobKindRegistry`: job kinds with their parameter schema and body factory
//! - `FieldTypeValidators` / `AutocompleteValidators` / `ConfigurationValidator`:
//!   accumulative validation of submitted forms
//! - `CronJobScheduler`: live jobs and cron triggers, immediate/one-time semantics
//! - `ScheduledJobRunner`: executes fired jobs off the triggering task
//! - `EventBus`: STARTED / COMPLETED / FAILED notifications
//!
//! # Example
//!
//! ```ignore
//! use cron_scheduler::{CronJobScheduler, EventBus, JobKindRegistry, SchedulerConfig};
//!
//! let mut kinds = JobKindRegistry::new();
//! register_builtin_job_kinds(&mut kinds, handler)?;
//! let kinds = Arc::new(kinds);
//!
//! let scheduler = CronJobScheduler::new(SchedulerConfig::default(), kinds, Arc::new(EventBus::new()))?;
//! scheduler.schedule(&config)?;
//!
//! let done = scheduler.events().watch(&config.id, CronTaskEventType::Completed);
//! scheduler.trigger_now(&config.id)?;
//! done.wait(DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL).await;
//!
//! scheduler.shutdown().await?;
//! ```

mod config;
mod error;
pub mod events;
mod job_kinds;
pub mod jobs;
mod registry;
mod runner;
pub mod schedule;
mod scheduler;
pub mod validation;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use events::{
    CronTaskEvent, CronTaskEventType, EventBus, EventWatch, DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL,
};
pub use job_kinds::{JobFactory, JobKindRegistry};
pub use jobs::{
    register_builtin_job_kinds, CronJob, JobContext, JobError, MaintenanceHandler,
    MaintenanceRequest, SCRIPT_FILE_NAME_FIELD, SCRIPT_JOB_KIND,
};
pub use registry::{JobRegistry, JobResult, JobStatus, TriggerState};
pub use runner::ScheduledJobRunner;
pub use schedule::{parse_cron_expression, validate_cron_expression, CronSchedule};
pub use scheduler::CronJobScheduler;
pub use validation::{
    AutocompleteValidators, ConfigurationValidator, FieldPath, FieldTypeValidators,
    ValidationErrors, Violation,
};
