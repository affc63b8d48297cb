//! In-memory storage backend backed by a `HashMap`.
//!
//! Keeps everything in memory with no persistence across restarts.
//! Useful for tests and embedded deployments where the caller does its
//! own durability.

use std::{collections::HashMap, sync::RwLock};

use crate::{error::StorageResult, storage::Storage};

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryStorage {
    /// Create a new, empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> StorageResult<usize> {
        Ok(self.entries.read()?.len())
    }

    /// Whether the backend holds no entries
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.entries.read()?.is_empty())
    }
}

impl Storage for InMemoryStorage {
    fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.entries.read()?.get(key).cloned())
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.entries.write()?.insert(key, value);

        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.entries.write()?.remove(key);

        Ok(())
    }
}
