//! # cron-types
//!
//! Shared domain types for the cron task scheduling system.
//!
//! This crate defines the data structures used throughout the system:
//! - Task configurations: submitted forms and their persisted form
//! - Job kinds: named behaviors with a typed parameter schema
//! - Settings: layered daemon configuration
//!
//! ## Usage
//!
//! ```rust
//! use cron_types::{TaskConfiguration, TaskConfigurationForm};
//!
//! let form = TaskConfigurationForm::new("RegenerateChecksumCronJob")
//!     .with_cron_expression("0 0 5 * * ?")
//!     .with_field("forceRegeneration", "true");
//! let config: TaskConfiguration = form.into_configuration("CRJ001");
//! assert_eq!(config.property("forceRegeneration"), Some("true"));
//! ```

pub mod config;
pub mod error;
pub mod job_kind;
pub mod task;

pub use config::Settings;
pub use error::CronError;
pub use job_kind::{FieldDefinition, FieldType, JobKindDefinition};
pub use task::{TaskConfiguration, TaskConfigurationForm, TaskField};
