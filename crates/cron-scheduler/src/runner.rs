//! Execution of fired jobs.
//!
//! `ScheduledJobRunner::fire` returns as soon as the execution is spawned;
//! the job body runs on the runtime's worker threads, never on the caller's.

use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use cron_types::TaskConfiguration;

use crate::events::{CronTaskEvent, CronTaskEventType, EventBus};
use crate::job_kinds::JobFactory;
use crate::jobs::JobContext;
use crate::registry::{JobRegistry, JobResult};
use crate::{JobKindRegistry, SchedulerError};

/// Instantiates job bodies, runs them and reports the outcome.
pub struct ScheduledJobRunner {
    job_kinds: Arc<JobKindRegistry>,
    registry: Arc<JobRegistry>,
    events: Arc<EventBus>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl ScheduledJobRunner {
    /// `cancel` is handed (as child tokens) to every job body
    pub fn new(
        job_kinds: Arc<JobKindRegistry>,
        registry: Arc<JobRegistry>,
        events: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            job_kinds,
            registry,
            events,
            tracker: TaskTracker::new(),
            cancel,
        }
    }

    /// Start one execution of `config`.
    ///
    /// # Errors
    ///
    /// - `JobKindNotFound` if the configuration's job kind is unknown
    /// - `NotRunning` once the runner is closed
    /// - `Scheduling` when called outside a Tokio runtime
    pub fn fire(&self, config: &TaskConfiguration) -> Result<(), SchedulerError> {
        if self.tracker.is_closed() || self.cancel.is_cancelled() {
            return Err(SchedulerError::NotRunning);
        }
        let factory = self.job_kinds.factory(&config.job_kind)?;
        let handle = Handle::try_current()
            .map_err(|e| SchedulerError::Scheduling(format!("no async runtime: {}", e)))?;

        let ctx = JobContext {
            task_id: config.id.clone(),
            name: config.name.clone(),
            properties: config.properties.clone(),
            cancel: self.cancel.child_token(),
        };

        self.tracker.spawn_on(
            execute(factory, ctx, self.registry.clone(), self.events.clone()),
            &handle,
        );
        Ok(())
    }

    /// Number of executions in flight
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Refuse new executions
    pub fn close(&self) {
        self.tracker.close();
    }

    /// Wait for in-flight executions; only completes after `close`
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }
}

async fn execute(factory: JobFactory, ctx: JobContext, registry: Arc<JobRegistry>, events: Arc<EventBus>) {
    let task_id = ctx.task_id.clone();
    let name = ctx.name.clone();

    info!(task_id = %task_id, name = %name, "Job started");
    registry.record_start(&task_id);
    events.publish(CronTaskEvent::new(&task_id, &name, CronTaskEventType::Started));

    let start = Instant::now();
    let job = factory();
    // A panicking body must still produce a FAILED event
    let outcome = tokio::spawn(async move { job.run(ctx).await }).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let result = match outcome {
        Ok(Ok(())) => JobResult::Success,
        Ok(Err(e)) => JobResult::Failed(e.to_string()),
        Err(e) if e.is_panic() => JobResult::Failed("job panicked".to_string()),
        Err(e) => JobResult::Failed(e.to_string()),
    };
    registry.record_complete(&task_id, result.clone(), duration_ms);

    match result {
        JobResult::Success => {
            info!(task_id = %task_id, duration_ms, "Job completed");
            events.publish(CronTaskEvent::new(&task_id, &name, CronTaskEventType::Completed));
        }
        JobResult::Failed(reason) => {
            error!(task_id = %task_id, duration_ms, error = %reason, "Job failed");
            events.publish(CronTaskEvent::failed(&task_id, &name, reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{CronJob, JobError};
    use async_trait::async_trait;
    use cron_types::JobKindDefinition;
    use std::time::Duration;

    struct Succeeds;

    #[async_trait]
    impl CronJob for Succeeds {
        async fn run(&self, _ctx: JobContext) -> Result<(), JobError> {
            Ok(())
        }
    }

    struct Fails;

    #[async_trait]
    impl CronJob for Fails {
        async fn run(&self, _ctx: JobContext) -> Result<(), JobError> {
            Err(JobError::Failed("disk full".to_string()))
        }
    }

    struct Panics;

    #[async_trait]
    impl CronJob for Panics {
        async fn run(&self, _ctx: JobContext) -> Result<(), JobError> {
            panic!("boom")
        }
    }

    fn runner() -> (ScheduledJobRunner, Arc<JobRegistry>, Arc<EventBus>) {
        let mut kinds = JobKindRegistry::new();
        kinds.register(JobKindDefinition::new("Succeeds", "Succeeds"), || Succeeds).unwrap();
        kinds.register(JobKindDefinition::new("Fails", "Fails"), || Fails).unwrap();
        kinds.register(JobKindDefinition::new("Panics", "Panics"), || Panics).unwrap();

        let registry = Arc::new(JobRegistry::new());
        let events = Arc::new(EventBus::new());
        let runner = ScheduledJobRunner::new(
            Arc::new(kinds),
            registry.clone(),
            events.clone(),
            CancellationToken::new(),
        );
        (runner, registry, events)
    }

    const WAIT: Duration = Duration::from_secs(5);
    const POLL: Duration = Duration::from_millis(20);

    #[tokio::test(flavor = "multi_thread")]
    async fn test_success_publishes_completed() {
        let (runner, registry, events) = runner();
        let config = TaskConfiguration::new("t1", "t1", "Succeeds");
        registry.register(config.clone());

        let started = events.watch("t1", CronTaskEventType::Started);
        let completed = events.watch("t1", CronTaskEventType::Completed);
        runner.fire(&config).unwrap();

        assert!(started.wait(WAIT, POLL).await);
        assert!(completed.wait(WAIT, POLL).await);

        let status = registry.get_status("t1").unwrap();
        assert_eq!(status.run_count, 1);
        assert_eq!(status.last_result, Some(JobResult::Success));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_publishes_failed() {
        let (runner, registry, events) = runner();
        let config = TaskConfiguration::new("t2", "t2", "Fails");
        registry.register(config.clone());

        let mut rx = events.subscribe();
        runner.fire(&config).unwrap();

        assert_eq!(rx.recv().await.unwrap().event_type, CronTaskEventType::Started);
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.event_type, CronTaskEventType::Failed);
        assert_eq!(failed.error.as_deref(), Some("disk full"));
        assert_eq!(registry.get_status("t2").unwrap().error_count, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_panic_reported_as_failure() {
        let (runner, _registry, events) = runner();
        let config = TaskConfiguration::new("t3", "t3", "Panics");

        let failed = events.watch("t3", CronTaskEventType::Failed);
        runner.fire(&config).unwrap();
        assert!(failed.wait(WAIT, POLL).await);
    }

    #[tokio::test]
    async fn test_unknown_kind_not_fired() {
        let (runner, _registry, _events) = runner();
        let config = TaskConfiguration::new("t4", "t4", "mummy");
        assert!(matches!(
            runner.fire(&config),
            Err(SchedulerError::JobKindNotFound(kind)) if kind == "mummy"
        ));
        assert_eq!(runner.active(), 0);
    }

    #[tokio::test]
    async fn test_closed_runner_refuses() {
        let (runner, _registry, _events) = runner();
        runner.close();
        runner.wait().await;

        let config = TaskConfiguration::new("t5", "t5", "Succeeds");
        assert!(matches!(runner.fire(&config), Err(SchedulerError::NotRunning)));
    }

    #[test]
    fn test_fire_outside_runtime() {
        let (runner, _registry, _events) = runner();
        let config = TaskConfiguration::new("t6", "t6", "Succeeds");
        assert!(matches!(runner.fire(&config), Err(SchedulerError::Scheduling(_))));
    }
}
