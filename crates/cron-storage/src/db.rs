//! RocksDB wrapper for task configuration storage.
//!
//! Provides:
//! - Database open/close with column family setup
//! - `TaskStore` and `ScriptStore` implementations
//! - Atomic write batches for script uploads and deletes

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use tracing::{debug, info};

use cron_types::TaskConfiguration;

use crate::column_families::{build_cf_descriptors, ALL_CF_NAMES, CF_SCRIPTS, CF_TASKS};
use crate::error::StorageError;
use crate::keys::{ScriptKey, TaskKey};
use crate::store::{ScriptStore, StoredScript, TaskStore};

/// RocksDB-backed store for task configurations and scripts
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(2);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        let mut stats = StorageStats::default();

        if let Some(cf) = self.db.cf_handle(CF_TASKS) {
            stats.task_count = self.count_cf_entries(cf)?;
        }

        // Each script occupies a body and a name entry
        if let Some(cf) = self.db.cf_handle(CF_SCRIPTS) {
            stats.script_count = self.count_cf_entries(cf)? / 2;
        }

        stats.disk_usage_bytes = self.get_disk_usage();

        Ok(stats)
    }

    fn count_cf_entries(&self, cf: &rocksdb::ColumnFamily) -> Result<u64, StorageError> {
        let mut count = 0u64;
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> u64 {
        let mut total_size = 0u64;
        if let Ok(entries) = std::fs::read_dir(self.db.path()) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }
        total_size
    }
}

impl TaskStore for Storage {
    fn save(&self, config: &TaskConfiguration) -> Result<String, StorageError> {
        let cf = self.cf(CF_TASKS)?;
        let key = TaskKey::new(&config.id)?;
        let bytes = config.to_bytes()?;

        self.db.put_cf(cf, key.to_bytes(), bytes)?;
        debug!(task_id = %config.id, job_kind = %config.job_kind, "Stored task configuration");

        Ok(config.id.clone())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<TaskConfiguration>, StorageError> {
        let cf = self.cf(CF_TASKS)?;
        let key = TaskKey::new(id)?;

        match self.db.get_cf(cf, key.to_bytes())? {
            Some(bytes) => Ok(Some(TaskConfiguration::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn find_all(&self) -> Result<Vec<TaskConfiguration>, StorageError> {
        let cf = self.cf(CF_TASKS)?;
        let prefix = TaskKey::PREFIX.as_bytes();

        let mut configs = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            configs.push(TaskConfiguration::from_bytes(&value)?);
        }

        Ok(configs)
    }

    fn delete_by_id(&self, id: &str) -> Result<bool, StorageError> {
        let tasks_cf = self.cf(CF_TASKS)?;
        let scripts_cf = self.cf(CF_SCRIPTS)?;
        let key = TaskKey::new(id)?;

        if self.db.get_cf(tasks_cf, key.to_bytes())?.is_none() {
            return Ok(false);
        }

        let script_key = ScriptKey::new(id)?;
        let mut batch = WriteBatch::default();
        batch.delete_cf(tasks_cf, key.to_bytes());
        batch.delete_cf(scripts_cf, script_key.body_bytes());
        batch.delete_cf(scripts_cf, script_key.name_bytes());
        self.db.write(batch)?;

        debug!(task_id = %id, "Deleted task configuration");
        Ok(true)
    }
}

impl ScriptStore for Storage {
    fn save_script(&self, id: &str, file_name: &str, content: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(CF_SCRIPTS)?;
        let key = ScriptKey::new(id)?;

        // Body and name land together or not at all
        let mut batch = WriteBatch::default();
        batch.put_cf(cf, key.body_bytes(), content);
        batch.put_cf(cf, key.name_bytes(), file_name.as_bytes());
        self.db.write(batch)?;

        debug!(task_id = %id, file_name = %file_name, size = content.len(), "Stored script");
        Ok(())
    }

    fn find_script(&self, id: &str) -> Result<Option<StoredScript>, StorageError> {
        let cf = self.cf(CF_SCRIPTS)?;
        let key = ScriptKey::new(id)?;

        let Some(content) = self.db.get_cf(cf, key.body_bytes())? else {
            return Ok(None);
        };
        let file_name = match self.db.get_cf(cf, key.name_bytes())? {
            Some(bytes) => String::from_utf8(bytes)
                .map_err(|e| StorageError::Serialization(format!("Invalid script name: {}", e)))?,
            None => return Err(StorageError::NotFound(format!("script name for {}", id))),
        };

        Ok(Some(StoredScript { file_name, content }))
    }
}

/// Statistics about the storage.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Number of stored task configurations
    pub task_count: u64,
    /// Number of uploaded scripts
    pub script_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}
