//! Named collections of properties.
//!
//! A [`Registry`] maps each property's key to the property itself. It holds
//! properties of different value types side by side, and adds the bulk
//! operations an application needs over its whole settings set: resetting to
//! defaults and exporting or importing a JSON [`Snapshot`].

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::codec::Value;
use crate::property::Property;
use crate::storage::{self, Storage};
use crate::{Error, Rejected, Timestamp};

/// The snapshot format version written by [`Registry::snapshot`].
pub const SNAPSHOT_VERSION: &str = "1.0";

/// The exported state of a registry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub configs: BTreeMap<String, SnapshotEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "exportedAt", default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

/// The exported state of one property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

impl Snapshot {

    /// Render the snapshot as JSON text.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(Error::InvalidSnapshot)
    }

    /// Parse a snapshot from JSON text.
    ///
    /// ##### Example
    ///
    /// ```
    /// use lwwconfig::Snapshot;
    ///
    /// let snapshot = Snapshot::from_json(r#"{"configs": {"ui.theme": {"value": "dark"}}}"#).unwrap();
    /// assert_eq!(1, snapshot.configs.len());
    /// assert!(Snapshot::from_json("{}").is_err());
    /// ```
    pub fn from_json(raw: &str) -> Result<Snapshot, Error> {
        serde_json::from_str(raw).map_err(Error::InvalidSnapshot)
    }
}

/// The type-erased view of a property that the registry works through.
trait Entry: Any {
    fn reset(&mut self) -> Result<(), Rejected>;
    fn export(&self) -> Result<SnapshotEntry, serde_json::Error>;
    fn import(&mut self, entry: &SnapshotEntry, overwrite_newer: bool) -> Result<(), ImportError>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

enum ImportError {
    Decode(serde_json::Error),
    Rejected(Rejected),
}

impl <T> Entry for Property<T> where T: Value {

    fn reset(&mut self) -> Result<(), Rejected> {
        self.set_default()
    }

    fn export(&self) -> Result<SnapshotEntry, serde_json::Error> {
        Ok(SnapshotEntry { value: serde_json::to_value(self.value())?, timestamp: self.timestamp() })
    }

    fn import(&mut self, entry: &SnapshotEntry, overwrite_newer: bool) -> Result<(), ImportError> {
        let value = serde_json::from_value::<T>(entry.value.clone()).map_err(ImportError::Decode)?;
        let written = if overwrite_newer {
            self.force_value(value)
        } else {
            self.set_value(value, Some(entry.timestamp.unwrap_or_else(Timestamp::now)))
        };
        written.map_err(ImportError::Rejected)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A flat collection of uniquely keyed properties.
pub struct Registry {
    storage: Arc<dyn Storage>,
    entries: BTreeMap<String, Box<dyn Entry>>,
}

impl Registry {

    /// Create an empty registry whose [`create`](Registry::create)d
    /// properties persist to `storage`.
    pub fn new<S>(storage: S) -> Registry where S: Storage + 'static {
        Registry { storage: Arc::new(storage), entries: BTreeMap::new() }
    }

    /// Create an empty registry over the process-wide storage.
    pub fn shared() -> Registry {
        Registry::new(storage::shared())
    }

    /// Add a property under its key.
    ///
    /// Fails with [`Error::Duplicate`] if the key is already registered.
    pub fn insert<T>(&mut self, property: Property<T>) -> Result<&mut Property<T>, Error>
    where T: Value {
        let key = property.key().to_string();
        if self.entries.contains_key(&key) {
            return Err(Error::Duplicate(key));
        }
        self.entries.insert(key.clone(), Box::new(property));
        self.require::<T>(&key)
    }

    /// Build a property over the registry's storage and add it.
    ///
    /// ##### Example
    ///
    /// ```
    /// use lwwconfig::Registry;
    /// use lwwconfig::storage::MemoryStorage;
    ///
    /// let mut registry = Registry::new(MemoryStorage::new());
    /// registry.create("server.url", "http://localhost:5454".to_string()).unwrap();
    ///
    /// let url = registry.get::<String>("server.url").unwrap();
    /// assert_eq!("http://localhost:5454", url.value());
    /// assert!(registry.create("server.url", String::new()).is_err());
    /// ```
    pub fn create<K, T>(&mut self, key: K, default: T) -> Result<&mut Property<T>, Error>
    where K: Into<String>, T: Value {
        let property = Property::builder(key, default).storage(self.storage.clone()).build();
        self.insert(property)
    }

    /// The storage used by [`create`](Registry::create).
    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    /// Get the property under `key`, if it exists and holds `T` values.
    pub fn get<T>(&self, key: &str) -> Option<&Property<T>> where T: Value {
        self.entries.get(key).and_then(|entry| entry.as_any().downcast_ref::<Property<T>>())
    }

    /// Get the property under `key` mutably, if it exists and holds `T`
    /// values.
    pub fn get_mut<T>(&mut self, key: &str) -> Option<&mut Property<T>> where T: Value {
        self.entries.get_mut(key).and_then(|entry| entry.as_any_mut().downcast_mut::<Property<T>>())
    }

    /// Get the property under `key` mutably, or say why it is unavailable.
    pub fn require<T>(&mut self, key: &str) -> Result<&mut Property<T>, Error> where T: Value {
        let entry = self.entries.get_mut(key).ok_or_else(|| Error::NotFound(key.to_string()))?;
        entry.as_any_mut()
             .downcast_mut::<Property<T>>()
             .ok_or_else(|| Error::TypeMismatch { key: key.to_string(), expected: type_name::<T>() })
    }

    /// Returns true if a property is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The registered keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the number of registered properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no property is registered.
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Reset every property to its default.
    pub fn load_defaults(&mut self) {
        self.load_defaults_for("");
    }

    /// Reset every property whose key starts with `prefix` to its default.
    ///
    /// Resets are ordinary writes, so a property holding a write newer than
    /// the current time keeps it.
    pub fn load_defaults_for(&mut self, prefix: &str) {
        for (key, entry) in self.entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            if let Err(rejected) = entry.reset() {
                warn!(key = %key, reason = %rejected, "default was not applied");
            }
        }
    }

    /// Export every property's value and timestamp.
    ///
    /// Values that cannot be represented as JSON are logged and left out.
    pub fn snapshot(&self) -> Snapshot {
        let mut configs = BTreeMap::new();
        for (key, entry) in &self.entries {
            match entry.export() {
                Ok(exported) => { configs.insert(key.clone(), exported); },
                Err(err) => error!(key = %key, error = %err, "failed to export value"),
            }
        }
        Snapshot {
            configs,
            version: Some(SNAPSHOT_VERSION.to_string()),
            exported_at: Some(Utc::now()),
        }
    }

    /// Import a snapshot, returning the number of accepted entries.
    ///
    /// Each entry is written with its recorded timestamp (or the current time
    /// if it has none), so it only lands if it is at least as recent as the
    /// stored value. With `overwrite_newer`, entries are written with the
    /// current time regardless of what is stored. Unknown keys, undecodable
    /// values and rejected writes are logged and skipped.
    ///
    /// ##### Example
    ///
    /// ```
    /// use lwwconfig::{Registry, Timestamp};
    /// use lwwconfig::storage::MemoryStorage;
    ///
    /// let mut registry = Registry::new(MemoryStorage::new());
    /// registry.create("ui.theme", "light".to_string()).unwrap();
    /// registry.require::<String>("ui.theme").unwrap()
    ///     .set_value("dark".to_string(), Some(Timestamp::from(1000))).unwrap();
    ///
    /// let snapshot = registry.snapshot();
    /// registry.load_defaults();
    /// assert_eq!("light", registry.get::<String>("ui.theme").unwrap().value());
    ///
    /// assert_eq!(1, registry.restore(&snapshot, true));
    /// assert_eq!("dark", registry.get::<String>("ui.theme").unwrap().value());
    /// ```
    pub fn restore(&mut self, snapshot: &Snapshot, overwrite_newer: bool) -> usize {
        let mut accepted = 0;
        for (key, exported) in &snapshot.configs {
            let entry = match self.entries.get_mut(key) {
                Some(entry) => entry,
                None => {
                    warn!(key = %key, "config key not found in registered configs, skipping");
                    continue;
                }
            };
            match entry.import(exported, overwrite_newer) {
                Ok(()) => accepted += 1,
                Err(ImportError::Decode(err)) => {
                    error!(key = %key, value = %exported.value, error = %err, "failed to decode snapshot value");
                }
                Err(ImportError::Rejected(rejected)) => {
                    warn!(key = %key, reason = %rejected, "snapshot value was not applied");
                }
            }
        }
        accepted
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
         .field("keys", &self.entries.keys().collect::<Vec<_>>())
         .finish()
    }
}

#[cfg(test)]
mod test {

    use std::collections::BTreeMap;

    use tracing_test::traced_test;

    use super::{Registry, Snapshot, SnapshotEntry, SNAPSHOT_VERSION};
    use crate::storage::MemoryStorage;
    use crate::{Error, Property, Timestamp};

    fn registry() -> Registry {
        Registry::new(MemoryStorage::new())
    }

    fn set<T>(registry: &mut Registry, key: &str, value: T, timestamp: u64) where T: crate::codec::Value {
        registry.require::<T>(key).unwrap().set_value(value, Some(Timestamp::from(timestamp))).unwrap();
    }

    fn value<T>(registry: &Registry, key: &str) -> T where T: crate::codec::Value {
        registry.get::<T>(key).unwrap().value().clone()
    }

    #[test]
    fn check_insert_and_get() {
        let storage = MemoryStorage::new();
        let mut registry = Registry::new(storage.clone());
        let property = Property::builder("testKey", "defaultValue".to_string()).storage(storage).build();

        registry.insert(property).unwrap();
        assert!(registry.contains("testKey"));
        assert_eq!("defaultValue", registry.get::<String>("testKey").unwrap().value());
        assert!(registry.get::<String>("nonExistent").is_none());
    }

    #[test]
    fn check_keys_are_unique() {
        let mut registry = registry();
        registry.create("key", 1u32).unwrap();
        match registry.create("key", 2u32) {
            Err(Error::Duplicate(key)) => assert_eq!("key", key),
            other => panic!("unexpected result: {:?}", other.map(|p| p.key().to_string())),
        }
        assert_eq!(1, registry.len());
    }

    #[test]
    fn check_require() {
        let mut registry = registry();
        registry.create("existingKey", "value".to_string()).unwrap();

        match registry.require::<String>("nonExistent") {
            Err(err @ Error::NotFound(_)) => assert_eq!("property 'nonExistent' not found", err.to_string()),
            other => panic!("unexpected result: {:?}", other.map(|p| p.key().to_string())),
        }
        match registry.require::<u32>("existingKey") {
            Err(Error::TypeMismatch { key, .. }) => assert_eq!("existingKey", key),
            other => panic!("unexpected result: {:?}", other.map(|p| p.key().to_string())),
        }
        assert!(registry.get::<u32>("existingKey").is_none());
        assert_eq!("existingKey", registry.require::<String>("existingKey").unwrap().key());
    }

    #[test]
    fn check_load_defaults() {
        let mut registry = registry();
        registry.create("key1", "default1".to_string()).unwrap();
        registry.create("key2", 100).unwrap();

        set(&mut registry, "key1", "changed1".to_string(), 1000);
        set(&mut registry, "key2", 200, 1000);

        registry.load_defaults();
        assert_eq!("default1", value::<String>(&registry, "key1"));
        assert_eq!(100, value::<i32>(&registry, "key2"));

        let mut empty = self::registry();
        empty.load_defaults();
        assert!(empty.is_empty());
    }

    #[test]
    fn check_load_defaults_for_prefix() {
        let mut registry = registry();
        registry.create("ui.theme", "light".to_string()).unwrap();
        registry.create("ui.fontSize", 14).unwrap();
        registry.create("api.endpoint", "http://localhost".to_string()).unwrap();

        set(&mut registry, "ui.theme", "dark".to_string(), 1000);
        set(&mut registry, "ui.fontSize", 16, 1000);
        set(&mut registry, "api.endpoint", "http://production".to_string(), 1000);

        registry.load_defaults_for("ui");
        assert_eq!("light", value::<String>(&registry, "ui.theme"));
        assert_eq!(14, value::<i32>(&registry, "ui.fontSize"));
        assert_eq!("http://production", value::<String>(&registry, "api.endpoint"));

        registry.load_defaults_for("nomatch");
        assert_eq!("http://production", value::<String>(&registry, "api.endpoint"));

        registry.load_defaults_for("");
        assert_eq!("http://localhost", value::<String>(&registry, "api.endpoint"));
    }

    #[test]
    fn check_snapshot() {
        let mut registry = registry();
        registry.create("key1", "value1".to_string()).unwrap();
        registry.create("key2", 42).unwrap();
        let mut nested = BTreeMap::new();
        nested.insert("nested".to_string(), "object".to_string());
        registry.create("key3", nested).unwrap();
        set(&mut registry, "key2", 43, 1000);

        let snapshot = registry.snapshot();
        assert_eq!(serde_json::json!("value1"), snapshot.configs["key1"].value);
        assert_eq!(None, snapshot.configs["key1"].timestamp);
        assert_eq!(serde_json::json!(43), snapshot.configs["key2"].value);
        assert_eq!(Some(Timestamp::from(1000)), snapshot.configs["key2"].timestamp);
        assert_eq!(serde_json::json!({"nested": "object"}), snapshot.configs["key3"].value);
        assert_eq!(Some(SNAPSHOT_VERSION), snapshot.version.as_deref());
        assert!(snapshot.exported_at.is_some());
    }

    #[test]
    fn check_snapshot_json() {
        let mut registry = registry();
        registry.create("ui.theme", "light".to_string()).unwrap();
        set(&mut registry, "ui.theme", "dark".to_string(), 1000);

        let json = registry.snapshot().to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!("dark", parsed["configs"]["ui.theme"]["value"]);
        assert_eq!(1000u64, parsed["configs"]["ui.theme"]["timestamp"]);
        assert_eq!("1.0", parsed["version"]);
        assert!(parsed["exportedAt"].is_string());

        assert_eq!(registry.snapshot().configs, Snapshot::from_json(&json).unwrap().configs);
    }

    #[test]
    fn check_empty_snapshot() {
        let snapshot = registry().snapshot();
        assert!(snapshot.configs.is_empty());
        assert_eq!(Some("1.0"), snapshot.version.as_deref());
    }

    #[test]
    fn check_invalid_snapshot() {
        assert!(matches!(Snapshot::from_json("null"), Err(Error::InvalidSnapshot(_))));
        assert!(matches!(Snapshot::from_json("{}"), Err(Error::InvalidSnapshot(_))));
    }

    #[test]
    fn check_restore() {
        let mut registry = registry();
        registry.create("key1", "default1".to_string()).unwrap();
        registry.create("key2", 0).unwrap();

        let snapshot = Snapshot::from_json(r#"{"configs": {"key1": {"value": "imported1"}, "key2": {"value": 99}}}"#).unwrap();
        assert_eq!(2, registry.restore(&snapshot, false));
        assert_eq!("imported1", value::<String>(&registry, "key1"));
        assert_eq!(99, value::<i32>(&registry, "key2"));
    }

    #[traced_test]
    #[test]
    fn check_restore_skips_unknown_keys() {
        let mut registry = registry();
        registry.create("existing", "value".to_string()).unwrap();

        let snapshot = Snapshot::from_json(r#"{"configs": {"existing": {"value": "updated"}, "nonExisting": {"value": "ignored"}}}"#).unwrap();
        assert_eq!(1, registry.restore(&snapshot, false));
        assert_eq!("updated", value::<String>(&registry, "existing"));
        assert!(!registry.contains("nonExisting"));
        assert!(logs_contain("config key not found in registered configs, skipping"));
    }

    #[traced_test]
    #[test]
    fn check_restore_skips_undecodable_values() {
        let mut registry = registry();
        registry.create("count", 5u32).unwrap();

        let snapshot = Snapshot::from_json(r#"{"configs": {"count": {"value": "five"}}}"#).unwrap();
        assert_eq!(0, registry.restore(&snapshot, false));
        assert_eq!(5, value::<u32>(&registry, "count"));
        assert!(logs_contain("failed to decode snapshot value"));
    }

    #[test]
    fn check_restore_respects_timestamps() {
        let mut registry = registry();
        registry.create("key", "default".to_string()).unwrap();
        set(&mut registry, "key", "current".to_string(), 20_000);

        let mut snapshot = registry.snapshot();
        snapshot.configs.insert("key".to_string(), SnapshotEntry {
            value: serde_json::json!("older"),
            timestamp: Some(Timestamp::from(10_000)),
        });

        assert_eq!(0, registry.restore(&snapshot, false));
        assert_eq!("current", value::<String>(&registry, "key"));

        assert_eq!(1, registry.restore(&snapshot, true));
        assert_eq!("older", value::<String>(&registry, "key"));
    }

    #[test]
    fn check_round_trip_through_json() {
        let mut registry = registry();
        registry.create("str", "hello".to_string()).unwrap();
        registry.create("num", 42).unwrap();
        registry.create("bool", true).unwrap();
        set(&mut registry, "str", "hello".to_string(), 1000);
        set(&mut registry, "num", 42, 1000);
        set(&mut registry, "bool", true, 1000);

        let exported = registry.snapshot().to_json().unwrap();

        set(&mut registry, "str", "changed".to_string(), 1000);
        set(&mut registry, "num", 100, 1000);
        set(&mut registry, "bool", false, 1000);

        assert_eq!(3, registry.restore(&Snapshot::from_json(&exported).unwrap(), false));
        assert_eq!("hello", value::<String>(&registry, "str"));
        assert_eq!(42, value::<i32>(&registry, "num"));
        assert!(value::<bool>(&registry, "bool"));
    }

    #[test]
    fn check_registered_properties_share_storage() {
        let storage = MemoryStorage::new();
        let mut first = Registry::new(storage.clone());
        first.create("ui.theme", "system".to_string()).unwrap();
        set(&mut first, "ui.theme", "dark".to_string(), 1000);

        let mut second = Registry::new(storage);
        second.create("ui.theme", "system".to_string()).unwrap();
        assert_eq!("dark", value::<String>(&second, "ui.theme"));
    }
}
