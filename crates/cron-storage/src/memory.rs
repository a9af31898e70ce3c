//! In-memory store backed by `DashMap`.

use dashmap::DashMap;

use cron_types::TaskConfiguration;

use crate::error::StorageError;
use crate::store::{ScriptStore, StoredScript, TaskStore};

/// Volatile `TaskStore` + `ScriptStore`. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: DashMap<String, TaskConfiguration>,
    scripts: DashMap<String, StoredScript>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskStore for MemoryTaskStore {
    fn save(&self, config: &TaskConfiguration) -> Result<String, StorageError> {
        if config.id.is_empty() {
            return Err(StorageError::Key("Empty configuration id".to_string()));
        }
        self.tasks.insert(config.id.clone(), config.clone());
        Ok(config.id.clone())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<TaskConfiguration>, StorageError> {
        Ok(self.tasks.get(id).map(|entry| entry.value().clone()))
    }

    fn find_all(&self) -> Result<Vec<TaskConfiguration>, StorageError> {
        let mut all: Vec<TaskConfiguration> =
            self.tasks.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn delete_by_id(&self, id: &str) -> Result<bool, StorageError> {
        self.scripts.remove(id);
        Ok(self.tasks.remove(id).is_some())
    }
}

impl ScriptStore for MemoryTaskStore {
    fn save_script(&self, id: &str, file_name: &str, content: &[u8]) -> Result<(), StorageError> {
        self.scripts.insert(
            id.to_string(),
            StoredScript {
                file_name: file_name.to_string(),
                content: content.to_vec(),
            },
        );
        Ok(())
    }

    fn find_script(&self, id: &str) -> Result<Option<StoredScript>, StorageError> {
        Ok(self.scripts.get(id).map(|entry| entry.value().clone()))
    }
}
