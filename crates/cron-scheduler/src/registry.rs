//! Live registry of scheduled jobs.
//!
//! The `JobRegistry` is the derived, in-memory counterpart of the stored
//! task configurations: at most one job per configuration id, each with at
//! most one recurring trigger, plus execution status for observability.
//! Every registration gets a fresh generation number so that a trigger
//! spawned for a replaced registration can tell it is stale.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use cron_types::TaskConfiguration;

/// Result of a job execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobResult {
    /// Job completed successfully
    Success,
    /// Job failed with an error message
    Failed(String),
}

/// Trigger registration state of a configuration id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerState {
    /// No job registered
    Unregistered,
    /// Job registered without a standing trigger
    RegisteredDormant,
    /// Job registered with a recurring trigger
    RegisteredRecurring,
}

/// Status of a registered job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    /// Configuration id
    pub task_id: String,
    /// Display name
    pub name: String,
    pub job_kind: String,
    /// Cron expression of the standing trigger, if one is registered
    pub cron_expr: Option<String>,
    /// When the job last started (if ever)
    pub last_run: Option<DateTime<Utc>>,
    /// Duration of the last run in milliseconds
    pub last_duration_ms: Option<u64>,
    /// Result of the last execution
    pub last_result: Option<JobResult>,
    /// When the trigger fires next
    pub next_run: Option<DateTime<Utc>>,
    /// Total number of finished runs
    pub run_count: u64,
    /// Total number of failed runs
    pub error_count: u64,
    /// Executions currently in flight
    pub active_runs: u32,
}

impl JobStatus {
    fn new(config: &TaskConfiguration) -> Self {
        Self {
            task_id: config.id.clone(),
            name: config.name.clone(),
            job_kind: config.job_kind.clone(),
            cron_expr: None,
            last_run: None,
            last_duration_ms: None,
            last_result: None,
            next_run: None,
            run_count: 0,
            error_count: 0,
            active_runs: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active_runs > 0
    }
}

struct JobEntry {
    config: TaskConfiguration,
    generation: u64,
    trigger: Option<CancellationToken>,
    status: JobStatus,
}

impl JobEntry {
    fn cancel_trigger(&mut self) {
        if let Some(token) = self.trigger.take() {
            token.cancel();
        }
        self.status.cron_expr = None;
        self.status.next_run = None;
    }
}

/// Registry of live jobs keyed by configuration id.
///
/// # Example
///
/// ```
/// use cron_scheduler::{JobRegistry, JobResult, TriggerState};
/// use cron_types::TaskConfiguration;
///
/// let registry = JobRegistry::new();
/// registry.register(TaskConfiguration::new("CRJ001", "Checksums", "RegenerateChecksumCronJob"));
/// assert_eq!(registry.trigger_state("CRJ001"), TriggerState::RegisteredDormant);
///
/// registry.record_start("CRJ001");
/// assert!(registry.is_running("CRJ001"));
///
/// registry.record_complete("CRJ001", JobResult::Success, 1500);
/// assert!(!registry.is_running("CRJ001"));
/// ```
#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<String, JobEntry>,
    next_generation: AtomicU64,
}

impl JobRegistry {
    /// Create a new empty job registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job for `config`, replacing any registration under the same id.
    ///
    /// A replaced registration loses its trigger; its execution history is kept.
    /// Returns the generation of the new registration.
    pub fn register(&self, config: TaskConfiguration) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut status = JobStatus::new(&config);

        let mut entry = self.jobs.entry(config.id.clone()).or_insert_with(|| JobEntry {
            config: config.clone(),
            generation,
            trigger: None,
            status: status.clone(),
        });

        entry.cancel_trigger();
        let previous = &entry.status;
        status.last_run = previous.last_run;
        status.last_duration_ms = previous.last_duration_ms;
        status.last_result = previous.last_result.clone();
        status.run_count = previous.run_count;
        status.error_count = previous.error_count;
        status.active_runs = previous.active_runs;

        entry.config = config;
        entry.generation = generation;
        entry.status = status;

        generation
    }

    /// Bind a trigger to the registration `generation`.
    ///
    /// Returns false, leaving the registry untouched, when that registration
    /// has been replaced or removed in the meantime.
    pub fn attach_trigger(&self, id: &str, generation: u64, token: CancellationToken, cron_expr: &str) -> bool {
        match self.jobs.get_mut(id) {
            Some(mut entry) if entry.generation == generation => {
                entry.cancel_trigger();
                entry.trigger = Some(token);
                entry.status.cron_expr = Some(cron_expr.to_string());
                true
            }
            _ => false,
        }
    }

    /// Drop the trigger of registration `generation`, e.g. when its schedule
    /// has no future fire times.
    pub fn detach_trigger(&self, id: &str, generation: u64) {
        if let Some(mut entry) = self.jobs.get_mut(id) {
            if entry.generation == generation {
                entry.cancel_trigger();
            }
        }
    }

    /// Remove a job and cancel its trigger.
    pub fn remove(&self, id: &str) -> Option<TaskConfiguration> {
        self.jobs.remove(id).map(|(_, mut entry)| {
            entry.cancel_trigger();
            entry.config
        })
    }

    /// Remove every job, cancelling all triggers.
    pub fn clear(&self) {
        let ids: Vec<String> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            self.remove(&id);
        }
    }

    /// Configuration of the current registration
    pub fn configuration(&self, id: &str) -> Option<TaskConfiguration> {
        self.jobs.get(id).map(|entry| entry.config.clone())
    }

    /// Configuration of registration `generation`, `None` once it is replaced
    pub fn configuration_at(&self, id: &str, generation: u64) -> Option<TaskConfiguration> {
        self.jobs
            .get(id)
            .filter(|entry| entry.generation == generation)
            .map(|entry| entry.config.clone())
    }

    /// All registered configurations
    pub fn configurations(&self) -> Vec<TaskConfiguration> {
        let mut configs: Vec<TaskConfiguration> =
            self.jobs.iter().map(|entry| entry.config.clone()).collect();
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        configs
    }

    pub fn trigger_state(&self, id: &str) -> TriggerState {
        match self.jobs.get(id) {
            None => TriggerState::Unregistered,
            Some(entry) if entry.trigger.is_some() => TriggerState::RegisteredRecurring,
            Some(_) => TriggerState::RegisteredDormant,
        }
    }

    /// Record that a job has started executing.
    pub fn record_start(&self, id: &str) {
        if let Some(mut entry) = self.jobs.get_mut(id) {
            entry.status.active_runs += 1;
            entry.status.last_run = Some(Utc::now());
        }
    }

    /// Record that a job has completed.
    ///
    /// Updates the duration, result, and run/error counts.
    pub fn record_complete(&self, id: &str, result: JobResult, duration_ms: u64) {
        if let Some(mut entry) = self.jobs.get_mut(id) {
            let status = &mut entry.status;
            status.active_runs = status.active_runs.saturating_sub(1);
            status.last_duration_ms = Some(duration_ms);
            status.run_count += 1;
            if matches!(result, JobResult::Failed(_)) {
                status.error_count += 1;
            }
            status.last_result = Some(result);
        }
    }

    /// Update the next fire time of registration `generation`.
    pub fn set_next_run(&self, id: &str, generation: u64, next: Option<DateTime<Utc>>) {
        if let Some(mut entry) = self.jobs.get_mut(id) {
            if entry.generation == generation {
                entry.status.next_run = next;
            }
        }
    }

    /// Get the status of a specific job.
    ///
    /// Returns `None` if the job is not registered.
    pub fn get_status(&self, id: &str) -> Option<JobStatus> {
        self.jobs.get(id).map(|entry| entry.status.clone())
    }

    /// Get the status of all registered jobs, ordered by id.
    pub fn get_all_status(&self) -> Vec<JobStatus> {
        let mut all: Vec<JobStatus> = self.jobs.iter().map(|entry| entry.status.clone()).collect();
        all.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        all
    }

    /// Check if a job is currently running.
    ///
    /// Returns `false` if the job is not registered.
    pub fn is_running(&self, id: &str) -> bool {
        self.jobs
            .get(id)
            .map(|entry| entry.status.is_running())
            .unwrap_or(false)
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    /// Get the number of registered jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}
