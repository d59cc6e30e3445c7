//! Persistent last-writer-wins properties.
//!
//! A [`Property`] is the unit of replicated configuration state. It keeps an
//! in-memory copy of its effective value, and persists every accepted write
//! to its storage as two entries: the encoded value under `key` and the
//! write's timestamp under `key.time`.
//!
//! A write is accepted only if it passes two independent gates:
//!
//! 1. its timestamp is at least the one currently in storage (or storage
//!    holds none), and
//! 2. the validator, if any, accepts the value.
//!
//! Rejected writes change nothing: not the cached value, not storage, not the
//! change channel. None of the failures a property can run into (corrupt
//! stored text, a broken backend, stale or invalid writes) panic or escape as
//! errors other than the returned [`Rejected`]; they are logged through
//! `tracing`.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::channel::{Channel, SubscriptionId};
use crate::codec::{self, Value};
use crate::register::{wins, LwwRegister};
use crate::storage::{self, Storage};
use crate::{Rejected, Timestamp};

/// A predicate gating which values a property may hold.
pub type Validator<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

type WriteCallback = Box<dyn FnMut() + Send>;

/// Configures and builds a [`Property`].
pub struct Builder<T> {
    key: String,
    default: T,
    validator: Option<Validator<T>>,
    on_write: Option<WriteCallback>,
    storage: Option<Arc<dyn Storage>>,
}

impl <T> Builder<T> where T: Value {

    /// Reject every candidate value for which `validator` returns false.
    pub fn validator<F>(mut self, validator: F) -> Builder<T>
    where F: Fn(&T) -> bool + Send + Sync + 'static {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Call `on_write` after every accepted write.
    pub fn on_write<F>(mut self, on_write: F) -> Builder<T> where F: FnMut() + Send + 'static {
        self.on_write = Some(Box::new(on_write));
        self
    }

    /// Persist to `storage` instead of the process-wide [`storage::shared`].
    pub fn storage<S>(mut self, storage: S) -> Builder<T> where S: Storage + 'static {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Build the property, loading its current value from storage.
    pub fn build(self) -> Property<T> {
        let storage = self.storage.unwrap_or_else(|| Arc::new(storage::shared()));
        let mut property = Property {
            time_key: storage::time_key(&self.key),
            key: self.key,
            register: LwwRegister::new(self.default.clone(), None),
            changes: Channel::new(self.default.clone()),
            default: self.default,
            validator: self.validator,
            on_write: self.on_write,
            storage,
        };
        let (value, timestamp) = property.load();
        property.register = LwwRegister::new(value.clone(), timestamp);
        property.changes = Channel::new(value);
        property
    }
}

/// A persistent, validated, last-writer-wins configuration value.
pub struct Property<T> {
    key: String,
    time_key: String,
    default: T,
    register: LwwRegister<T>,
    validator: Option<Validator<T>>,
    on_write: Option<WriteCallback>,
    storage: Arc<dyn Storage>,
    changes: Channel<T>,
}

impl <T> Property<T> where T: Value {

    /// Start configuring a property stored under `key`.
    ///
    /// ##### Example
    ///
    /// ```
    /// use lwwconfig::Property;
    /// use lwwconfig::storage::MemoryStorage;
    ///
    /// let angle = Property::builder("geometry.clippingStartAngle", 90.0)
    ///     .validator(|angle: &f64| (0.0..=360.0).contains(angle))
    ///     .storage(MemoryStorage::new())
    ///     .build();
    /// assert_eq!(90.0, *angle.value());
    /// ```
    pub fn builder<K>(key: K, default: T) -> Builder<T> where K: Into<String> {
        Builder { key: key.into(), default, validator: None, on_write: None, storage: None }
    }

    /// Create a property over the process-wide storage, with no validator
    /// and no write callback.
    pub fn new<K>(key: K, default: T) -> Property<T> where K: Into<String> {
        Property::builder(key, default).build()
    }

    /// The storage key of this property.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The value used whenever no valid stored value exists.
    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// The current effective value.
    pub fn value(&self) -> &T {
        self.register.get()
    }

    /// The timestamp of the current value, if it was ever written.
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.register.timestamp()
    }

    /// Write `value` stamped with the current time.
    pub fn set(&mut self, value: T) -> Result<(), Rejected> {
        self.set_value(value, None)
    }

    /// Write `value` stamped with `timestamp`, or the current time if `None`.
    ///
    /// The write is accepted iff the timestamp is not older than the one in
    /// storage and the validator accepts the value. On acceptance the value
    /// is persisted, cached, reported to the write callback and emitted on
    /// the change channel.
    ///
    /// ##### Example
    ///
    /// ```
    /// use lwwconfig::{Property, Rejected, Timestamp};
    /// use lwwconfig::storage::MemoryStorage;
    ///
    /// let mut property = Property::builder("test", String::new())
    ///     .storage(MemoryStorage::new())
    ///     .build();
    ///
    /// property.set_value("update1".to_string(), Some(Timestamp::from(1000))).unwrap();
    /// let stale = property.set_value("update2".to_string(), Some(Timestamp::from(900)));
    /// assert_eq!(Err(Rejected::Stale { candidate: 900.into(), stored: 1000.into() }), stale);
    /// property.set_value("update3".to_string(), Some(Timestamp::from(1100))).unwrap();
    /// assert_eq!("update3", property.value());
    /// ```
    pub fn set_value(&mut self, value: T, timestamp: Option<Timestamp>) -> Result<(), Rejected> {
        let timestamp = timestamp.unwrap_or_else(Timestamp::now);
        if let Some(stored) = self.stored_timestamp() {
            if !wins(timestamp, Some(stored)) {
                warn!(key = %self.key, candidate = %timestamp, stored = %stored,
                      "rejected write older than stored value");
                return Err(Rejected::Stale { candidate: timestamp, stored });
            }
        }
        self.commit(value, timestamp)
    }

    /// Write `value` stamped with the current time, ignoring the stored
    /// timestamp. The validator still applies.
    pub fn force_value(&mut self, value: T) -> Result<(), Rejected> {
        self.commit(value, Timestamp::now())
    }

    /// Reset to the default value.
    ///
    /// This is an ordinary write stamped with the current time, so a more
    /// recent write by another instance still wins over it.
    pub fn set_default(&mut self) -> Result<(), Rejected> {
        self.set_value(self.default.clone(), None)
    }

    /// Subscribe to accepted values.
    ///
    /// `subscriber` is called with the current value immediately, then with
    /// the value of every write this instance accepts.
    ///
    /// ##### Example
    ///
    /// ```
    /// use std::sync::{Arc, Mutex};
    /// use lwwconfig::{Property, Timestamp};
    /// use lwwconfig::storage::MemoryStorage;
    ///
    /// let mut property = Property::builder("test", "initial".to_string())
    ///     .storage(MemoryStorage::new())
    ///     .build();
    ///
    /// let seen = Arc::new(Mutex::new(Vec::new()));
    /// let sink = seen.clone();
    /// property.subscribe(move |value: &String| sink.lock().unwrap().push(value.clone()));
    ///
    /// property.set_value("second".to_string(), Some(Timestamp::from(1000))).unwrap();
    /// property.set_value("stale".to_string(), Some(Timestamp::from(500))).unwrap_err();
    /// property.set_value("third".to_string(), Some(Timestamp::from(1500))).unwrap();
    ///
    /// assert_eq!(vec!["initial", "second", "third"], *seen.lock().unwrap());
    /// ```
    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriptionId
    where F: FnMut(&T) + Send + 'static {
        self.changes.subscribe(subscriber)
    }

    /// Cancel a subscription. Returns false if it was not active.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.changes.unsubscribe(id)
    }

    /// Load the effective value and its timestamp from storage.
    ///
    /// Falls back to the default when the key is absent, the stored text does
    /// not decode, the decoded value fails validation, or storage fails.
    fn load(&self) -> (T, Option<Timestamp>) {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return (self.default.clone(), None),
            Err(err) => {
                error!(key = %self.key, error = %err, "failed to read stored value; using default");
                return (self.default.clone(), None);
            }
        };

        let value = match codec::decode::<T>(&raw) {
            Ok(value) => value,
            Err(err) => {
                error!(key = %self.key, stored = %raw, default = ?self.default, error = %err,
                       "failed to decode stored value; using default");
                return (self.default.clone(), None);
            }
        };

        if !self.accepts(&value) {
            error!(key = %self.key, stored = ?value, default = ?self.default,
                   "stored value failed validation; using default");
            return (self.default.clone(), None);
        }

        let timestamp = self.stored_timestamp();
        debug!(key = %self.key, timestamp = ?timestamp, "loaded stored value");
        (value, timestamp)
    }

    /// The timestamp currently in storage.
    ///
    /// An unparsable timestamp counts as absent. If storage cannot be read,
    /// the cached timestamp stands in for it.
    fn stored_timestamp(&self) -> Option<Timestamp> {
        match self.storage.get(&self.time_key) {
            Ok(None) => None,
            Ok(Some(raw)) => match codec::decode_timestamp(&raw) {
                Ok(timestamp) => Some(timestamp),
                Err(err) => {
                    warn!(key = %self.key, error = %err, "ignoring unparsable stored timestamp");
                    None
                }
            },
            Err(err) => {
                error!(key = %self.key, error = %err, "failed to read stored timestamp");
                self.register.timestamp()
            }
        }
    }

    fn accepts(&self, value: &T) -> bool {
        self.validator.as_ref().map_or(true, |validator| validator(value))
    }

    /// Validate, persist, cache and publish a write whose timestamp has
    /// already been accepted.
    fn commit(&mut self, value: T, timestamp: Timestamp) -> Result<(), Rejected> {
        if !self.accepts(&value) {
            error!(key = %self.key, candidate = ?value, "validation failed");
            return Err(Rejected::Invalid);
        }

        let encoded = match codec::encode_value(&value) {
            Ok(encoded) => encoded,
            Err(err) => {
                error!(key = %self.key, candidate = ?value, error = %err, "failed to encode value");
                return Err(Rejected::Encode(err.to_string()));
            }
        };

        let persisted = self.storage.set(&self.key, &encoded)
            .and_then(|()| self.storage.set(&self.time_key, &codec::encode_timestamp(timestamp)));
        if let Err(err) = persisted {
            error!(key = %self.key, error = %err, "failed to persist value; keeping it in memory");
        }

        debug!(key = %self.key, timestamp = %timestamp, "accepted write");
        self.register.replace(value.clone(), timestamp);
        if let Some(ref mut on_write) = self.on_write {
            on_write();
        }
        self.changes.emit(value);
        Ok(())
    }
}

impl <T> fmt::Debug for Property<T> where T: fmt::Debug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
         .field("key", &self.key)
         .field("value", self.register.get())
         .field("timestamp", &self.register.timestamp())
         .field("default", &self.default)
         .finish()
    }
}
