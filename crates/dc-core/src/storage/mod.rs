//! Key-value persistence port
//!
//! The session list is stored as a single JSON blob under one key. Backends
//! only need key-level atomic writes.

mod file;
mod memory;
mod sqlite;

use std::sync::Arc;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::config::{StorageBackend, StorageConfig};
use crate::Result;

/// Durable key-value storage for serialized blobs
pub trait StoragePort: Send + Sync {
    /// Read the value stored under `key`, if any
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Open the backend selected in the storage configuration
pub fn open(config: &StorageConfig) -> Result<Arc<dyn StoragePort>> {
    match config.backend {
        StorageBackend::File => Ok(Arc::new(FileStorage::new(&config.data_dir)?)),
        StorageBackend::Sqlite => {
            if let Some(parent) = config.db_path().parent() {
                std::fs::create_dir_all(parent)?;
            }
            Ok(Arc::new(SqliteStorage::new(config.db_path())?))
        }
    }
}
