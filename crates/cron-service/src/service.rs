//! Task configuration service.
//!
//! Every write goes validate -> persist -> schedule. A scheduling failure
//! after the configuration was persisted is reported but not rolled back;
//! the stored configuration stays the source of truth and is picked up
//! again by `schedule_all` on the next start.
//!
//! Writes (save, delete, script upload) hold one lock from the store call
//! through the scheduler call, so the live job always matches the store.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use cron_scheduler::jobs::SCRIPT_FILE_NAME_FIELD;
use cron_scheduler::{ConfigurationValidator, CronJobScheduler};
use cron_storage::{ScriptStore, StoredScript, TaskStore};
use cron_types::{JobKindDefinition, TaskConfiguration, TaskConfigurationForm};

use crate::ServiceError;

pub struct CronTaskService {
    store: Arc<dyn TaskStore>,
    scripts: Arc<dyn ScriptStore>,
    validator: Arc<ConfigurationValidator>,
    scheduler: Arc<CronJobScheduler>,
    writes: Mutex<()>,
}

impl CronTaskService {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scripts: Arc<dyn ScriptStore>,
        validator: Arc<ConfigurationValidator>,
        scheduler: Arc<CronJobScheduler>,
    ) -> Self {
        Self {
            store,
            scripts,
            validator,
            scheduler,
            writes: Mutex::new(()),
        }
    }

    fn write_lock(&self) -> MutexGuard<'_, ()> {
        // The guarded unit carries no state, so a poisoned lock is still usable
        self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate, persist and schedule a form.
    ///
    /// `id` replaces the configuration stored under it; without one (or with
    /// a blank one) a fresh id is generated. Returns the id used.
    pub fn save(&self, form: TaskConfigurationForm, id: Option<String>) -> Result<String, ServiceError> {
        self.validator.validate(&form)?;

        let id = id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(TaskConfiguration::generate_id);
        let config = form.into_configuration(id);

        let _guard = self.write_lock();
        self.store.save(&config)?;
        debug!(task_id = %config.id, job_kind = %config.job_kind, "Configuration persisted");

        self.scheduler.schedule(&config)?;
        info!(task_id = %config.id, job_kind = %config.job_kind, "Configuration saved");
        Ok(config.id)
    }

    pub fn get(&self, id: &str) -> Result<Option<TaskConfiguration>, ServiceError> {
        Ok(self.store.find_by_id(id)?)
    }

    /// All stored configurations, ordered by id
    pub fn list(&self) -> Result<Vec<TaskConfiguration>, ServiceError> {
        Ok(self.store.find_all()?)
    }

    /// Delete a configuration and its job.
    ///
    /// The job is unscheduled even when nothing was stored under `id`.
    /// Returns whether a stored configuration was removed.
    pub fn delete(&self, id: &str) -> Result<bool, ServiceError> {
        let _guard = self.write_lock();
        let removed = self.store.delete_by_id(id)?;
        let unscheduled = self.scheduler.unschedule(id);
        info!(task_id = %id, removed, unscheduled, "Configuration deleted");
        Ok(removed)
    }

    /// Job kind catalog, ordered by id
    pub fn job_kinds(&self) -> Vec<JobKindDefinition> {
        self.validator.job_kinds().definitions().cloned().collect()
    }

    /// Script names of the registered script jobs
    pub fn script_names(&self) -> BTreeSet<String> {
        self.scheduler.list_dynamic_script_names()
    }

    /// Attach an uploaded script to an existing configuration.
    ///
    /// Stores the body, records `fileName` on the configuration, then
    /// persists and re-schedules it.
    pub fn upload_script(&self, id: &str, file_name: &str, content: &[u8]) -> Result<(), ServiceError> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(ServiceError::InvalidRequest("script file name is required".to_string()));
        }

        let _guard = self.write_lock();
        let mut config = self
            .store
            .find_by_id(id)?
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;

        self.scripts.save_script(id, file_name, content)?;
        config
            .properties
            .insert(SCRIPT_FILE_NAME_FIELD.to_string(), file_name.to_string());
        self.store.save(&config)?;
        info!(task_id = %id, file_name, bytes = content.len(), "Script uploaded");

        self.scheduler.schedule(&config)?;
        Ok(())
    }

    pub fn script(&self, id: &str) -> Result<Option<StoredScript>, ServiceError> {
        Ok(self.scripts.find_script(id)?)
    }

    /// Schedule every stored configuration.
    ///
    /// Failures are logged and skipped. Returns how many were scheduled.
    pub fn schedule_all(&self) -> Result<usize, ServiceError> {
        let configs = self.store.find_all()?;
        let total = configs.len();
        let mut scheduled = 0;

        for config in &configs {
            match self.scheduler.schedule(config) {
                Ok(()) => scheduled += 1,
                Err(e) => {
                    warn!(task_id = %config.id, job_kind = %config.job_kind, error = %e, "Skipping stored configuration")
                }
            }
        }

        info!(scheduled, total, "Stored configurations scheduled");
        Ok(scheduled)
    }

    pub fn scheduler(&self) -> &Arc<CronJobScheduler> {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use cron_scheduler::jobs::{CLEANUP_EXPIRED_ARTIFACTS_JOB_KIND, REGENERATE_CHECKSUM_JOB_KIND};
    use cron_scheduler::{
        register_builtin_job_kinds, AutocompleteValidators, CronTaskEventType, EventBus, FieldPath,
        FieldTypeValidators, JobContext, JobError, JobKindRegistry, MaintenanceHandler,
        MaintenanceRequest, SchedulerConfig, TriggerState, SCRIPT_JOB_KIND,
    };
    use cron_storage::MemoryTaskStore;

    struct Noop;

    #[async_trait]
    impl MaintenanceHandler for Noop {
        async fn handle(&self, _ctx: &JobContext, _request: MaintenanceRequest) -> Result<(), JobError> {
            Ok(())
        }
    }

    fn service() -> (CronTaskService, Arc<MemoryTaskStore>) {
        let mut kinds = JobKindRegistry::new();
        register_builtin_job_kinds(&mut kinds, Arc::new(Noop)).unwrap();
        let kinds = Arc::new(kinds);

        let storages = BTreeMap::from([("storage0".to_string(), vec!["releases".to_string()])]);
        let validator = ConfigurationValidator::new(
            kinds.clone(),
            FieldTypeValidators::new(),
            AutocompleteValidators::for_storages(&storages),
        )
        .unwrap();
        let scheduler =
            CronJobScheduler::new(SchedulerConfig::default(), kinds, Arc::new(EventBus::new())).unwrap();

        let store = Arc::new(MemoryTaskStore::new());
        let service = CronTaskService::new(
            store.clone(),
            store.clone(),
            Arc::new(validator),
            Arc::new(scheduler),
        );
        (service, store)
    }

    fn checksum_form(force: &str) -> TaskConfigurationForm {
        TaskConfigurationForm::new(REGENERATE_CHECKSUM_JOB_KIND)
            .with_cron_expression("0 11 11 11 11 ? 2100")
            .with_field("storageId", "storage0")
            .with_field("forceRegeneration", force)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_persists_and_schedules() {
        let (service, store) = service();

        let id = service
            .save(checksum_form("false"), Some("CRJ001".to_string()))
            .unwrap();
        assert_eq!(id, "CRJ001");
        assert_eq!(store.len(), 1);
        assert_eq!(
            service.scheduler().trigger_state("CRJ001"),
            TriggerState::RegisteredRecurring
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_generates_id() {
        let (service, _) = service();

        let id = service.save(checksum_form("true"), None).unwrap();
        assert!(!id.is_empty());

        let blank = service.save(checksum_form("true"), Some("  ".to_string())).unwrap();
        assert_ne!(blank, id);
        assert_eq!(service.list().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejected_form_touches_nothing() {
        let (service, store) = service();

        let form = TaskConfigurationForm::new("mummy").with_cron_expression("0 0 * * * ?");
        let err = service.save(form, Some("CRJ002".to_string())).unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.messages_at(FieldPath::JobKind), vec!["Cron job not found"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.is_empty());
        assert_eq!(service.scheduler().trigger_state("CRJ002"), TriggerState::Unregistered);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_replace_keeps_single_registration() {
        let (service, _) = service();

        service.save(checksum_form("false"), Some("CRJ001".to_string())).unwrap();
        service.save(checksum_form("true"), Some("CRJ001".to_string())).unwrap();

        let stored = service.get("CRJ001").unwrap().unwrap();
        assert_eq!(stored.property("forceRegeneration"), Some("true"));
        let live = service.scheduler().configuration("CRJ001").unwrap();
        assert_eq!(live.property("forceRegeneration"), Some("true"));
        assert_eq!(service.scheduler().registry().job_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_unschedules() {
        let (service, _) = service();

        service.save(checksum_form("false"), Some("CRJ001".to_string())).unwrap();
        assert!(service.delete("CRJ001").unwrap());
        assert!(service.get("CRJ001").unwrap().is_none());
        assert_eq!(service.scheduler().trigger_state("CRJ001"), TriggerState::Unregistered);

        assert!(!service.delete("CRJ001").unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_immediate_one_time_without_cron_fires_once() {
        let (service, _) = service();
        let completed = service
            .scheduler()
            .events()
            .watch("CLN001", CronTaskEventType::Completed);

        let form = TaskConfigurationForm::new(CLEANUP_EXPIRED_ARTIFACTS_JOB_KIND)
            .with_field("lastAccessedTimeInDays", "30")
            .with_immediate_execution(true)
            .with_one_time_execution(true);
        service.save(form, Some("CLN001".to_string())).unwrap();

        assert!(completed.wait(Duration::from_secs(5), Duration::from_millis(20)).await);
        assert_eq!(service.scheduler().trigger_state("CLN001"), TriggerState::RegisteredDormant);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upload_script() {
        let (service, _) = service();

        let form = TaskConfigurationForm::new(SCRIPT_JOB_KIND)
            .with_cron_expression("0 0 3 * * ?")
            .with_field(SCRIPT_FILE_NAME_FIELD, "old.groovy");
        service.save(form, Some("SCR001".to_string())).unwrap();

        service.upload_script("SCR001", "cleanup.groovy", b"println 'hi'").unwrap();

        let stored = service.get("SCR001").unwrap().unwrap();
        assert_eq!(stored.property(SCRIPT_FILE_NAME_FIELD), Some("cleanup.groovy"));
        let script = service.script("SCR001").unwrap().unwrap();
        assert_eq!(script.content, b"println 'hi'");
        assert!(service.script_names().contains("cleanup.groovy"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upload_script_errors() {
        let (service, _) = service();

        assert!(matches!(
            service.upload_script("missing", "a.groovy", b""),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.upload_script("missing", "  ", b""),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_schedule_all_skips_failures() {
        let (service, store) = service();

        store
            .save(
                &TaskConfiguration::new("GOOD", "good", REGENERATE_CHECKSUM_JOB_KIND)
                    .with_cron_expression("0 0 5 * * ?"),
            )
            .unwrap();
        store
            .save(&TaskConfiguration::new("GONE", "gone", "RetiredCronJob").with_cron_expression("0 0 5 * * ?"))
            .unwrap();

        assert_eq!(service.schedule_all().unwrap(), 1);
        assert_eq!(service.scheduler().trigger_state("GOOD"), TriggerState::RegisteredRecurring);
        assert_eq!(service.scheduler().trigger_state("GONE"), TriggerState::Unregistered);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_save_and_delete_stay_consistent() {
        let (service, store) = service();
        let service = Arc::new(service);

        let mut handles = Vec::new();
        for i in 0..16 {
            let service = service.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                for _ in 0..25 {
                    if i % 2 == 0 {
                        service.save(checksum_form("false"), Some("RACE01".to_string())).unwrap();
                    } else {
                        service.delete("RACE01").unwrap();
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = store.find_by_id("RACE01").unwrap().is_some();
        let live = service.scheduler().trigger_state("RACE01") != TriggerState::Unregistered;
        assert_eq!(stored, live);
    }

    #[test]
    fn test_job_kinds_catalog() {
        let (service, _) = service();
        let ids: Vec<String> = service.job_kinds().into_iter().map(|d| d.id).collect();
        assert!(ids.contains(&SCRIPT_JOB_KIND.to_string()));
        assert!(ids.contains(&REGENERATE_CHECKSUM_JOB_KIND.to_string()));
    }
}
