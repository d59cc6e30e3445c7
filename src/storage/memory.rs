use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::StorageError;
use super::Storage;

/// An in-memory storage backend.
///
/// Clones share the same map, which makes `MemoryStorage` the stand-in for a
/// storage medium shared by independent writers.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {

    /// Create a new, empty in-memory storage.
    ///
    /// ##### Example
    ///
    /// ```
    /// use lwwconfig::storage::{MemoryStorage, Storage};
    ///
    /// let storage = MemoryStorage::new();
    /// let sibling = storage.clone();
    ///
    /// storage.set("server.url", "\"http://localhost:5454\"").unwrap();
    /// assert!(sibling.get("server.url").unwrap().is_some());
    /// ```
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has been stored.
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
