//! Persistent, conflict-resolving configuration registers.
//!
//! Every user-tunable setting is held by a [`Property`]: a last-writer-wins
//! register whose state lives in a plain string key-value [`Storage`]. Any
//! number of independent writers (processes, threads, sibling instances) may
//! share one storage; conflicts are resolved by comparing the logical
//! [`Timestamp`] carried by each write against the one already persisted,
//! never by arrival order.
//!
//! On top of the register sit a validator hook, default fallback, recovery
//! from corrupted stored text, and a replay-one change [`Channel`].
//!
//! ##### Example
//!
//! ```
//! use lwwconfig::{Property, Timestamp};
//! use lwwconfig::storage::MemoryStorage;
//!
//! let storage = MemoryStorage::new();
//! let mut theme = Property::builder("ui.theme", "system".to_string())
//!     .storage(storage.clone())
//!     .build();
//!
//! theme.set_value("dark".to_string(), Some(Timestamp::from(1000))).unwrap();
//! assert!(theme.set_value("light".to_string(), Some(Timestamp::from(900))).is_err());
//!
//! let reloaded = Property::builder("ui.theme", "system".to_string())
//!     .storage(storage)
//!     .build();
//! assert_eq!("dark", reloaded.value());
//! ```
//!
//! ###### Further Reading
//!
//! 1. [_A comprehensive study of Convergent and Commutative Replicated Data Types_](http://hal.inria.fr/docs/00/55/55/88/PDF/techreport.pdf) (Shapiro, et al.)

use std::fmt;

#[cfg(any(test, feature = "quickcheck_generators"))]
use quickcheck::{Arbitrary, Gen};

use chrono::Utc;
use serde::{Deserialize, Serialize};

pub mod channel;
pub mod codec;
mod error;
pub mod property;
pub mod register;
pub mod registry;
pub mod settings;
pub mod storage;


pub use channel::{Channel, SubscriptionId};
pub use error::{CodecError, Error, Rejected, StorageError};
pub use property::Property;
pub use registry::{Registry, Snapshot};
pub use storage::Storage;

/// A Conflict-free Replicated Data Type.
///
/// Replicas of a CRDT may be updated concurrently and without coordination,
/// and still converge once every update has been seen everywhere.
///
/// ###### Replication
///
/// With state-based replication, the entire state of a mutated replica is
/// merged into remote replicas. With operation-based replication, only the
/// mutating operation is shipped and applied. The registers in this crate
/// use their full state as the operation, so both forms coincide.
///
/// ###### Partial Ordering
///
/// If every update applied to replica `B` has been applied to `A`, then
/// `B <= A`.
pub trait Crdt : Clone + Eq + PartialOrd {

    type Operation: Clone;

    /// Merge a replica into this CRDT.
    ///
    /// This method is used to perform state-based replication.
    fn merge(&mut self, other: Self);

    /// Apply an operation to this CRDT.
    ///
    /// This method is used to perform operation-based replication.
    fn apply(&mut self, operation: Self::Operation);
}

/// The logical timestamp of a write, in milliseconds since the Unix epoch.
///
/// Timestamps decide which of two conflicting writes survives: the larger one
/// wins, and equal timestamps let the later caller through. Writers that do
/// not supply a timestamp are stamped with the wall clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {

    /// The current wall-clock time.
    ///
    /// Clocks before the epoch read as `0`.
    pub fn now() -> Timestamp {
        Timestamp(u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0))
    }

    /// Milliseconds since the Unix epoch.
    ///
    /// ##### Example
    ///
    /// ```
    /// use lwwconfig::Timestamp;
    ///
    /// assert_eq!(1000, Timestamp::from(1000).millis());
    /// ```
    pub fn millis(self) -> u64 {
        self.0
    }
}

impl From<u64> for Timestamp {
    fn from(millis: u64) -> Timestamp {
        Timestamp(millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(any(test, feature = "quickcheck_generators"))]
impl Arbitrary for Timestamp {
    fn arbitrary(g: &mut Gen) -> Timestamp {
        Timestamp(Arbitrary::arbitrary(g))
    }
    fn shrink(&self) -> Box<dyn Iterator<Item = Timestamp>> {
        Box::new(self.millis().shrink().map(Timestamp))
    }
}
