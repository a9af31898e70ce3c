//! Task configuration service for the cron task system.
//!
//! `CronTaskService` ties the validator, the stores and the scheduler
//! together: a submitted form is validated, persisted, then scheduled.
//! `routes` exposes the service over HTTP and `server` runs it.

pub mod error;
pub mod routes;
pub mod server;
pub mod service;

pub use error::ServiceError;
pub use routes::{router, BASE_PATH, FILE_NAME_HEADER, TASK_ID_HEADER};
pub use server::run_server_with_shutdown;
pub use service::CronTaskService;
