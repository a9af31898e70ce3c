//! Persistence contracts used by the scheduling core.

use cron_types::TaskConfiguration;

use crate::error::StorageError;

/// Durable repository of task configurations.
///
/// `save` is an upsert keyed by the configuration id.
pub trait TaskStore: Send + Sync {
    /// Persist a configuration, returning its id
    fn save(&self, config: &TaskConfiguration) -> Result<String, StorageError>;

    fn find_by_id(&self, id: &str) -> Result<Option<TaskConfiguration>, StorageError>;

    /// All stored configurations, ordered by id
    fn find_all(&self) -> Result<Vec<TaskConfiguration>, StorageError>;

    /// Remove a configuration. Returns false when nothing was stored under `id`.
    fn delete_by_id(&self, id: &str) -> Result<bool, StorageError>;
}

/// Script body uploaded for a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredScript {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Storage for uploaded scripts, keyed by configuration id.
///
/// One script per configuration; a new upload replaces the old one.
pub trait ScriptStore: Send + Sync {
    fn save_script(&self, id: &str, file_name: &str, content: &[u8]) -> Result<(), StorageError>;

    fn find_script(&self, id: &str) -> Result<Option<StoredScript>, StorageError>;
}
