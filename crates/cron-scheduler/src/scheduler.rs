//! Cron job scheduler.
//!
//! Turns task configurations into live jobs and triggers:
//!
//! | immediate | one-time | outcome                                   |
//! |-----------|----------|-------------------------------------------|
//! | false     | any      | recurring trigger                         |
//! | true      | false    | fires now, then recurring trigger         |
//! | true      | true     | fires now, then dormant (no trigger)      |
//!
//! Triggers are Tokio tasks sleeping until the next fire time computed by
//! the cron expression in the configured timezone. Each owns a child of the
//! scheduler's shutdown token.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use cron_types::TaskConfiguration;

use crate::events::EventBus;
use crate::jobs::{SCRIPT_FILE_NAME_FIELD, SCRIPT_JOB_KIND};
use crate::registry::{JobRegistry, JobStatus, TriggerState};
use crate::runner::ScheduledJobRunner;
use crate::schedule::{parse_cron_expression, CronSchedule};
use crate::{JobKindRegistry, SchedulerConfig, SchedulerError};

/// Longest single sleep of a trigger; the fire time is re-checked after each
/// chunk so wall clock adjustments are picked up.
const MAX_TRIGGER_SLEEP: Duration = Duration::from_secs(60);

/// Owner of the live job/trigger state.
///
/// Active from construction until `shutdown`.
pub struct CronJobScheduler {
    config: SchedulerConfig,
    timezone: Tz,
    job_kinds: Arc<JobKindRegistry>,
    registry: Arc<JobRegistry>,
    events: Arc<EventBus>,
    runner: Arc<ScheduledJobRunner>,
    shutdown_token: CancellationToken,
    triggers: TaskTracker,
    is_running: AtomicBool,
}

impl CronJobScheduler {
    /// Create a scheduler. Triggers are accepted until `shutdown`.
    pub fn new(
        config: SchedulerConfig,
        job_kinds: Arc<JobKindRegistry>,
        events: Arc<EventBus>,
    ) -> Result<Self, SchedulerError> {
        let timezone = config.timezone;
        let registry = Arc::new(JobRegistry::new());
        let shutdown_token = CancellationToken::new();
        let runner = Arc::new(ScheduledJobRunner::new(
            job_kinds.clone(),
            registry.clone(),
            events.clone(),
            shutdown_token.clone(),
        ));

        info!(timezone = %timezone.name(), "Scheduler created");

        Ok(Self {
            config,
            timezone,
            job_kinds,
            registry,
            events,
            runner,
            shutdown_token,
            triggers: TaskTracker::new(),
            is_running: AtomicBool::new(true),
        })
    }

    /// Register `config` as a job and decide its trigger.
    ///
    /// Replaces any registration under the same id. An unknown job kind
    /// leaves existing state untouched. Failures after the job was
    /// registered (firing, cron parsing) are returned but not rolled back.
    pub fn schedule(&self, config: &TaskConfiguration) -> Result<(), SchedulerError> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }
        if !self.job_kinds.contains(&config.job_kind) {
            warn!(task_id = %config.id, job_kind = %config.job_kind, "Job kind not found, nothing scheduled");
            return Err(SchedulerError::JobKindNotFound(config.job_kind.clone()));
        }

        let generation = self.registry.register(config.clone());
        info!(task_id = %config.id, job_kind = %config.job_kind, "Job registered");

        if config.should_execute_immediately() {
            if let Err(e) = self.runner.fire(config) {
                error!(task_id = %config.id, error = %e, "Immediate execution failed");
                return Err(e);
            }
            debug!(task_id = %config.id, "Immediate execution requested");
        }

        if !config.should_register_recurring_trigger() {
            debug!(task_id = %config.id, "One-time job left dormant");
            return Ok(());
        }

        let expr = config.cron_expression().unwrap_or_default();
        let schedule = parse_cron_expression(expr).map_err(|e| {
            error!(task_id = %config.id, cron = %expr, error = %e, "Trigger not registered");
            e
        })?;

        self.spawn_trigger(&config.id, generation, schedule)
    }

    fn spawn_trigger(&self, id: &str, generation: u64, schedule: CronSchedule) -> Result<(), SchedulerError> {
        let handle = Handle::try_current()
            .map_err(|e| SchedulerError::Scheduling(format!("no async runtime: {}", e)))?;

        let token = self.shutdown_token.child_token();
        if !self
            .registry
            .attach_trigger(id, generation, token.clone(), schedule.expression())
        {
            // Replaced or removed by a concurrent call
            debug!(task_id = %id, "Registration superseded, trigger dropped");
            return Ok(());
        }

        info!(
            task_id = %id,
            cron = %schedule.expression(),
            timezone = %self.timezone.name(),
            "Trigger registered"
        );

        let trigger = Trigger {
            id: id.to_string(),
            generation,
            schedule,
            timezone: self.timezone,
            token,
            registry: self.registry.clone(),
            runner: self.runner.clone(),
        };
        self.triggers.spawn_on(trigger.run(), &handle);
        Ok(())
    }

    /// Remove the job and its trigger. Absent ids are fine.
    ///
    /// Returns whether a job was registered.
    pub fn unschedule(&self, id: &str) -> bool {
        match self.registry.remove(id) {
            Some(config) => {
                info!(task_id = %id, job_kind = %config.job_kind, "Job unscheduled");
                true
            }
            None => {
                debug!(task_id = %id, "Unschedule of unregistered job ignored");
                false
            }
        }
    }

    /// Fire a registered job once, leaving its trigger as it is.
    pub fn trigger_now(&self, id: &str) -> Result<(), SchedulerError> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }
        let config = self
            .registry
            .configuration(id)
            .ok_or_else(|| SchedulerError::JobNotFound(id.to_string()))?;
        info!(task_id = %id, "Manual execution requested");
        self.runner.fire(&config)
    }

    /// Script file names of every registered dynamically scripted job.
    pub fn list_dynamic_script_names(&self) -> BTreeSet<String> {
        self.registry
            .configurations()
            .into_iter()
            .filter(|config| config.job_kind == SCRIPT_JOB_KIND)
            .filter_map(|config| {
                config
                    .property(SCRIPT_FILE_NAME_FIELD)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
            })
            .collect()
    }

    pub fn trigger_state(&self, id: &str) -> TriggerState {
        self.registry.trigger_state(id)
    }

    /// Live configuration of a registered job
    pub fn configuration(&self, id: &str) -> Option<TaskConfiguration> {
        self.registry.configuration(id)
    }

    pub fn status(&self, id: &str) -> Option<JobStatus> {
        self.registry.get_status(id)
    }

    pub fn all_status(&self) -> Vec<JobStatus> {
        self.registry.get_all_status()
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn job_kinds(&self) -> Arc<JobKindRegistry> {
        self.job_kinds.clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Get a clone of the shutdown token. Cancelled on `shutdown`.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Stop all triggers and wait up to the configured timeout for running jobs.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::NotRunning` if already shut down.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        if !self.is_running.swap(false, Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Initiating scheduler shutdown");
        self.shutdown_token.cancel();
        self.triggers.close();
        self.runner.close();

        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            self.triggers.wait().await;
            self.runner.wait().await;
        })
        .await;

        if drained.is_err() {
            warn!(
                running = self.runner.active(),
                timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
                "Jobs still running after shutdown timeout"
            );
        }

        self.registry.clear();
        info!("Scheduler shutdown complete");
        Ok(())
    }
}

/// A standing cron trigger bound to one registration.
struct Trigger {
    id: String,
    generation: u64,
    schedule: CronSchedule,
    timezone: Tz,
    token: CancellationToken,
    registry: Arc<JobRegistry>,
    runner: Arc<ScheduledJobRunner>,
}

impl Trigger {
    async fn run(self) {
        loop {
            let Some(next) = self.schedule.upcoming(self.timezone) else {
                info!(task_id = %self.id, cron = %self.schedule.expression(), "No future fire times, trigger retired");
                self.registry.detach_trigger(&self.id, self.generation);
                return;
            };
            self.registry.set_next_run(&self.id, self.generation, Some(next));
            debug!(task_id = %self.id, next_run = %next, "Trigger armed");

            loop {
                let remaining = match (next - Utc::now()).to_std() {
                    Ok(remaining) if !remaining.is_zero() => remaining,
                    _ => break,
                };
                tokio::select! {
                    _ = self.token.cancelled() => {
                        debug!(task_id = %self.id, "Trigger cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(remaining.min(MAX_TRIGGER_SLEEP)) => {}
                }
            }

            let Some(config) = self.registry.configuration_at(&self.id, self.generation) else {
                return;
            };
            match self.runner.fire(&config) {
                Ok(()) => {}
                Err(SchedulerError::NotRunning) => return,
                Err(e) => warn!(task_id = %self.id, error = %e, "Scheduled execution not started"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CronTaskEventType;
    use crate::jobs::{CronJob, JobContext, JobError};
    use async_trait::async_trait;
    use cron_types::JobKindDefinition;
    use std::sync::atomic::AtomicUsize;

    static SLOW_RUNS: AtomicUsize = AtomicUsize::new(0);

    struct Noop;

    #[async_trait]
    impl CronJob for Noop {
        async fn run(&self, _ctx: JobContext) -> Result<(), JobError> {
            Ok(())
        }
    }

    struct Slow;

    #[async_trait]
    impl CronJob for Slow {
        async fn run(&self, ctx: JobContext) -> Result<(), JobError> {
            tokio::select! {
                _ = ctx.cancel.cancelled() => Err(JobError::Cancelled),
                _ = tokio::time::sleep(Duration::from_secs(30)) => {
                    SLOW_RUNS.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }
        }
    }

    fn scheduler() -> CronJobScheduler {
        let mut kinds = JobKindRegistry::new();
        kinds
            .register(JobKindDefinition::new("RegenerateChecksumCronJob", "Checksums"), || Noop)
            .unwrap();
        kinds
            .register(JobKindDefinition::new(SCRIPT_JOB_KIND, "Script"), || Noop)
            .unwrap();
        kinds.register(JobKindDefinition::new("Slow", "Slow"), || Slow).unwrap();

        let config = SchedulerConfig::default().with_shutdown_timeout(Duration::from_secs(1));
        CronJobScheduler::new(config, Arc::new(kinds), Arc::new(EventBus::new())).unwrap()
    }

    fn checksum(id: &str) -> TaskConfiguration {
        TaskConfiguration::new(id, id, "RegenerateChecksumCronJob")
            .with_cron_expression("0 11 11 11 11 ? 2100")
            .with_property("forceRegeneration", "false")
    }

    const WAIT: Duration = Duration::from_secs(5);
    const POLL: Duration = Duration::from_millis(20);

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recurring_registration() {
        let scheduler = scheduler();
        scheduler.schedule(&checksum("CRJ001")).unwrap();

        assert_eq!(scheduler.trigger_state("CRJ001"), TriggerState::RegisteredRecurring);
        let status = scheduler.status("CRJ001").unwrap();
        assert_eq!(status.cron_expr.as_deref(), Some("0 11 11 11 11 ? 2100"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_immediate_one_time_is_dormant() {
        let scheduler = scheduler();
        let config = TaskConfiguration::new("once", "once", "RegenerateChecksumCronJob")
            .with_immediate_execution(true)
            .with_one_time_execution(true);

        let completed = scheduler.events().watch("once", CronTaskEventType::Completed);
        scheduler.schedule(&config).unwrap();

        assert!(completed.wait(WAIT, POLL).await);
        assert_eq!(scheduler.trigger_state("once"), TriggerState::RegisteredDormant);
        assert!(scheduler.configuration("once").is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_immediate_recurring_fires_and_keeps_trigger() {
        let scheduler = scheduler();
        let config = checksum("both").with_immediate_execution(true);

        let completed = scheduler.events().watch("both", CronTaskEventType::Completed);
        scheduler.schedule(&config).unwrap();

        assert!(completed.wait(WAIT, POLL).await);
        assert_eq!(scheduler.trigger_state("both"), TriggerState::RegisteredRecurring);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_job_kind_leaves_existing_registration() {
        let scheduler = scheduler();
        scheduler.schedule(&checksum("CRJ001")).unwrap();

        let mut broken = checksum("CRJ001");
        broken.job_kind = "mummy".to_string();
        assert!(matches!(
            scheduler.schedule(&broken),
            Err(SchedulerError::JobKindNotFound(kind)) if kind == "mummy"
        ));

        assert_eq!(scheduler.trigger_state("CRJ001"), TriggerState::RegisteredRecurring);
        assert_eq!(
            scheduler.configuration("CRJ001").unwrap().job_kind,
            "RegenerateChecksumCronJob"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_schedule_twice_is_idempotent() {
        let scheduler = scheduler();
        scheduler.schedule(&checksum("CRJ001")).unwrap();
        scheduler.schedule(&checksum("CRJ001")).unwrap();

        assert_eq!(scheduler.registry().job_count(), 1);
        assert_eq!(scheduler.trigger_state("CRJ001"), TriggerState::RegisteredRecurring);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replacement_updates_live_view() {
        let scheduler = scheduler();
        scheduler.schedule(&checksum("CRJ001")).unwrap();

        let replacement = checksum("CRJ001")
            .with_cron_expression("0 0 5 ? * MON")
            .with_property("forceRegeneration", "true");
        scheduler.schedule(&replacement).unwrap();

        let live = scheduler.configuration("CRJ001").unwrap();
        assert_eq!(live.cron_expression(), Some("0 0 5 ? * MON"));
        assert_eq!(live.property("forceRegeneration"), Some("true"));
        assert_eq!(
            scheduler.status("CRJ001").unwrap().cron_expr.as_deref(),
            Some("0 0 5 ? * MON")
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_cron_leaves_job_dormant() {
        let scheduler = scheduler();
        let config = checksum("bad").with_cron_expression("daddy");

        assert!(matches!(
            scheduler.schedule(&config),
            Err(SchedulerError::InvalidCron(_))
        ));
        assert_eq!(scheduler.trigger_state("bad"), TriggerState::RegisteredDormant);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unschedule_is_idempotent() {
        let scheduler = scheduler();
        scheduler.schedule(&checksum("CRJ001")).unwrap();

        assert!(scheduler.unschedule("CRJ001"));
        assert!(!scheduler.unschedule("CRJ001"));
        assert_eq!(scheduler.trigger_state("CRJ001"), TriggerState::Unregistered);
        assert!(scheduler.configuration("CRJ001").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_trigger_now() {
        let scheduler = scheduler();
        scheduler.schedule(&checksum("CRJ001")).unwrap();

        let completed = scheduler.events().watch("CRJ001", CronTaskEventType::Completed);
        scheduler.trigger_now("CRJ001").unwrap();
        assert!(completed.wait(WAIT, POLL).await);
        assert_eq!(scheduler.trigger_state("CRJ001"), TriggerState::RegisteredRecurring);

        assert!(matches!(
            scheduler.trigger_now("missing"),
            Err(SchedulerError::JobNotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_recurring_trigger_fires() {
        let scheduler = scheduler();
        let config = checksum("every-second").with_cron_expression("* * * * * ?");

        let completed = scheduler.events().watch("every-second", CronTaskEventType::Completed);
        scheduler.schedule(&config).unwrap();
        assert!(completed.wait(WAIT, POLL).await);
        assert!(scheduler.status("every-second").unwrap().next_run.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_dynamic_script_names() {
        let scheduler = scheduler();
        for (id, file) in [("s1", "b.groovy"), ("s2", "a.groovy"), ("s3", "a.groovy")] {
            let config = TaskConfiguration::new(id, id, SCRIPT_JOB_KIND)
                .with_cron_expression("0 0 5 * * ?")
                .with_property(SCRIPT_FILE_NAME_FIELD, file);
            scheduler.schedule(&config).unwrap();
        }
        scheduler.schedule(&checksum("CRJ001")).unwrap();

        let names: Vec<String> = scheduler.list_dynamic_script_names().into_iter().collect();
        assert_eq!(names, vec!["a.groovy", "b.groovy"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown() {
        let scheduler = scheduler();
        scheduler.schedule(&checksum("CRJ001")).unwrap();
        let token = scheduler.shutdown_token();

        let runs_before = SLOW_RUNS.load(Ordering::SeqCst);
        let slow = TaskConfiguration::new("slow", "slow", "Slow")
            .with_immediate_execution(true)
            .with_one_time_execution(true);
        let cancelled = scheduler.events().watch("slow", CronTaskEventType::Failed);
        scheduler.schedule(&slow).unwrap();

        scheduler.shutdown().await.unwrap();
        assert!(token.is_cancelled());
        assert!(!scheduler.is_running());
        assert!(cancelled.wait(WAIT, POLL).await);
        assert_eq!(SLOW_RUNS.load(Ordering::SeqCst), runs_before);

        assert!(matches!(scheduler.shutdown().await, Err(SchedulerError::NotRunning)));
        assert!(matches!(
            scheduler.schedule(&checksum("CRJ002")),
            Err(SchedulerError::NotRunning)
        ));
    }
}
