//! Catalog of job kinds.
//!
//! Maps a stable job kind id to its parameter schema and a factory producing
//! the runnable body. Populated once at startup, read-only afterwards, so it
//! is shared behind an `Arc` without locking.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cron_types::JobKindDefinition;

use crate::jobs::CronJob;
use crate::SchedulerError;

/// Produces a fresh job body for each firing
pub type JobFactory = Arc<dyn Fn() -> Box<dyn CronJob> + Send + Sync>;

struct JobKind {
    definition: JobKindDefinition,
    factory: JobFactory,
}

/// Registry of job kinds keyed by id.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use cron_scheduler::{CronJob, JobContext, JobError, JobKindRegistry};
/// use cron_types::JobKindDefinition;
///
/// struct Noop;
///
/// #[async_trait]
/// impl CronJob for Noop {
///     async fn run(&self, _ctx: JobContext) -> Result<(), JobError> {
///         Ok(())
///     }
/// }
///
/// let mut kinds = JobKindRegistry::new();
/// kinds.register(JobKindDefinition::new("Noop", "Does nothing"), || Noop).unwrap();
/// assert!(kinds.contains("Noop"));
/// assert!(kinds.create("Missing").is_err());
/// ```
#[derive(Default)]
pub struct JobKindRegistry {
    kinds: BTreeMap<String, JobKind>,
}

impl JobKindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job kind.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::DuplicateJobKind` if the id is taken.
    pub fn register<F, J>(&mut self, definition: JobKindDefinition, factory: F) -> Result<(), SchedulerError>
    where
        F: Fn() -> J + Send + Sync + 'static,
        J: CronJob + 'static,
    {
        if self.kinds.contains_key(&definition.id) {
            return Err(SchedulerError::DuplicateJobKind(definition.id));
        }
        let factory: JobFactory = Arc::new(move || Box::new(factory()) as Box<dyn CronJob>);
        self.kinds.insert(
            definition.id.clone(),
            JobKind {
                definition,
                factory,
            },
        );
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.kinds.contains_key(id)
    }

    /// Schema of a job kind
    pub fn definition(&self, id: &str) -> Option<&JobKindDefinition> {
        self.kinds.get(id).map(|kind| &kind.definition)
    }

    /// All schemas, ordered by id
    pub fn definitions(&self) -> impl Iterator<Item = &JobKindDefinition> {
        self.kinds.values().map(|kind| &kind.definition)
    }

    /// All registered ids, ordered
    pub fn ids(&self) -> Vec<String> {
        self.kinds.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Factory for a job kind.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::JobKindNotFound` for an unknown id.
    pub fn factory(&self, id: &str) -> Result<JobFactory, SchedulerError> {
        self.kinds
            .get(id)
            .map(|kind| kind.factory.clone())
            .ok_or_else(|| SchedulerError::JobKindNotFound(id.to_string()))
    }

    /// Instantiate a job body
    pub fn create(&self, id: &str) -> Result<Box<dyn CronJob>, SchedulerError> {
        self.factory(id).map(|factory| factory())
    }
}

impl fmt::Debug for JobKindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobKindRegistry")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}
