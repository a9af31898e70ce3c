//! Storage layer for the cron task system.
//!
//! Provides:
//! - `TaskStore` / `ScriptStore` contracts consumed by the scheduling core
//! - RocksDB-backed `Storage` with column family isolation per record type
//! - In-memory `MemoryTaskStore` for tests and embedding

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::{ScriptKey, TaskKey};
pub use memory::MemoryTaskStore;
pub use store::{ScriptStore, StoredScript, TaskStore};
