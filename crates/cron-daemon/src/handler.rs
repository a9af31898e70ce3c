//! Maintenance handler wired into the built-in job kinds.
//!
//! The daemon has no artifact repository attached, so maintenance requests
//! are logged. Script jobs are checked against the uploaded script body.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use cron_scheduler::{JobContext, JobError, MaintenanceHandler, MaintenanceRequest};
use cron_storage::ScriptStore;

pub struct LoggingMaintenanceHandler {
    scripts: Option<Arc<dyn ScriptStore>>,
}

impl LoggingMaintenanceHandler {
    pub fn new(scripts: Arc<dyn ScriptStore>) -> Self {
        Self {
            scripts: Some(scripts),
        }
    }

    /// Handler for offline catalog use; never sees script bodies.
    pub fn detached() -> Self {
        Self { scripts: None }
    }

    fn check_script(&self, ctx: &JobContext, file_name: &str) -> Result<usize, JobError> {
        let Some(scripts) = &self.scripts else {
            return Ok(0);
        };
        let script = scripts
            .find_script(&ctx.task_id)
            .map_err(|e| JobError::Failed(e.to_string()))?
            .ok_or_else(|| JobError::Failed(format!("Script [{}] was not uploaded", file_name)))?;

        if script.file_name != file_name {
            return Err(JobError::Failed(format!(
                "Script [{}] was not uploaded, found [{}]",
                file_name, script.file_name
            )));
        }
        Ok(script.content.len())
    }
}

#[async_trait]
impl MaintenanceHandler for LoggingMaintenanceHandler {
    async fn handle(&self, ctx: &JobContext, request: MaintenanceRequest) -> Result<(), JobError> {
        if ctx.cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        match &request {
            MaintenanceRequest::RunScript { file_name } => {
                let bytes = self.check_script(ctx, file_name)?;
                info!(task_id = %ctx.task_id, file_name = %file_name, bytes, "Running script");
            }
            other => {
                info!(task_id = %ctx.task_id, name = %ctx.name, request = ?other, "Maintenance requested");
            }
        }
        Ok(())
    }
}
