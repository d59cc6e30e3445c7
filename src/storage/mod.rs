//! String key-value storage backends.
//!
//! A property persists two entries per key: the encoded value under `key`,
//! and its decimal timestamp under `key.time`. Backends only need to get and
//! set strings; either operation may fail, and callers treat a failure as
//! "value unavailable" rather than propagating it.
//!
//! ##### Backends
//!
//! ###### `MemoryStorage`
//!
//! A map shared by every clone of the handle. Siblings over the same
//! `MemoryStorage` observe each other's writes the next time they read.
//!
//! ###### `FileStorage`
//!
//! One file per key inside a directory. Writes are atomic per key, so a
//! reader never sees a torn value, although `key` and `key.time` are still
//! written separately.

use std::sync::{Arc, OnceLock};

use crate::StorageError;

pub use self::file::FileStorage;
pub use self::memory::MemoryStorage;

mod file;
mod memory;

/// A durable string key-value store with synchronous access.
pub trait Storage: Send + Sync {

    /// Get the value stored under `key`, or `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

impl <S> Storage for Arc<S> where S: Storage + ?Sized {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }
}

/// The storage key holding the timestamp of the value stored under `key`.
///
/// ##### Example
///
/// ```
/// use lwwconfig::storage;
///
/// assert_eq!("ui.theme.time", storage::time_key("ui.theme"));
/// ```
pub fn time_key(key: &str) -> String {
    format!("{}.time", key)
}

/// The process-wide storage used by properties built without an explicit
/// backend.
///
/// Every call returns a handle to the same map.
pub fn shared() -> MemoryStorage {
    static SHARED: OnceLock<MemoryStorage> = OnceLock::new();
    SHARED.get_or_init(MemoryStorage::new).clone()
}

#[cfg(test)]
mod test {

    use std::sync::Arc;

    use super::{shared, MemoryStorage, Storage};

    #[test]
    fn check_shared_is_one_map() {
        shared().set("storage.test.shared", "1").unwrap();
        assert_eq!(Some("1".to_string()), shared().get("storage.test.shared").unwrap());
    }

    #[test]
    fn check_arc_forwards() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage.set("key", "\"value\"").unwrap();
        assert_eq!(Some("\"value\"".to_string()), storage.get("key").unwrap());
    }
}
