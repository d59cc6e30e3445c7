#[cfg(any(test, feature = "quickcheck_generators"))]
use quickcheck::{Arbitrary, Gen};

use std::cmp::Ordering;

use crate::{Crdt, Timestamp};

/// Whether a write stamped `candidate` supersedes the state stamped `stored`.
///
/// Unstamped state is always superseded; otherwise the candidate must be at
/// least as recent.
///
/// ##### Example
///
/// ```
/// use lwwconfig::Timestamp;
/// use lwwconfig::register::wins;
///
/// assert!(wins(Timestamp::from(5), None));
/// assert!(wins(Timestamp::from(5), Some(Timestamp::from(5))));
/// assert!(!wins(Timestamp::from(4), Some(Timestamp::from(5))));
/// ```
pub fn wins(candidate: Timestamp, stored: Option<Timestamp>) -> bool {
    stored.map_or(true, |stored| candidate >= stored)
}

/// A last-writer-wins register.
#[derive(Debug, Default, Clone)]
pub struct LwwRegister<T> {
    value: T,
    timestamp: Option<Timestamp>,
}

impl <T> LwwRegister<T> {

    /// Create a new last-writer-wins register with the provided initial value
    /// and optional timestamp.
    ///
    /// ##### Example
    ///
    /// ```
    /// use lwwconfig::register::LwwRegister;
    ///
    /// let register = LwwRegister::new("my-value", None);
    /// ```
    pub fn new(value: T, timestamp: Option<Timestamp>) -> LwwRegister<T> {
        LwwRegister { value, timestamp }
    }

    /// Get the current value in the register.
    ///
    /// ##### Example
    ///
    /// ```
    /// # use lwwconfig::register::LwwRegister;
    /// let register = LwwRegister::new("my-value", None);
    /// assert_eq!("my-value", *register.get());
    /// ```
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Get the timestamp associated with the current value in the register.
    ///
    /// ##### Example
    ///
    /// ```
    /// # use lwwconfig::register::LwwRegister;
    /// # use lwwconfig::Timestamp;
    /// let register = LwwRegister::new("my-value", Some(Timestamp::from(7)));
    /// assert_eq!(Some(Timestamp::from(7)), register.timestamp());
    /// ```
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    /// Overwrite the register regardless of its current timestamp.
    ///
    /// Used when the authoritative timestamp lives elsewhere and has already
    /// been compared.
    pub fn replace(&mut self, value: T, timestamp: Timestamp) {
        self.value = value;
        self.timestamp = Some(timestamp);
    }

    /// Consume the register, returning its value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl <T : Clone> LwwRegister<T> {

    /// Set the register to the provided value and timestamp.
    ///
    /// Returns an operation that can be applied to other replicas if the set
    /// succeeds (by having the latest timestamp).
    ///
    /// ##### Example
    ///
    /// ```
    /// # use lwwconfig::register::LwwRegister;
    /// # use lwwconfig::Timestamp;
    /// let mut register = LwwRegister::new("default", None);
    /// assert!(register.set("update1", Timestamp::from(1000)).is_some());
    /// assert!(register.set("update2", Timestamp::from(900)).is_none());
    /// assert_eq!("update1", *register.get());
    /// ```
    pub fn set(&mut self, value: T, timestamp: Timestamp) -> Option<LwwRegister<T>> {
        if wins(timestamp, self.timestamp) {
            self.replace(value, timestamp);
            Some(self.clone())
        } else { None }
    }
}

impl <T> Crdt for LwwRegister<T> where T: Clone + Ord {

    type Operation = LwwRegister<T>;

    /// Merge a replica into this register.
    ///
    /// This method is used to perform state-based replication. The register
    /// keeps whichever state has the larger timestamp; an unstamped replica is
    /// older than any stamped one. When both timestamps are equal the larger
    /// value is kept, so replicas that merge each other converge regardless of
    /// which side wrote last. Local writes through [`set`](LwwRegister::set)
    /// differ: there an equal timestamp lets the new value through.
    ///
    /// ##### Example
    ///
    /// ```
    /// # use lwwconfig::register::LwwRegister;
    /// # use lwwconfig::Timestamp;
    /// use lwwconfig::Crdt;
    ///
    /// let mut local = LwwRegister::new("local", Some(Timestamp::from(1)));
    /// let remote = LwwRegister::new("remote", Some(Timestamp::from(2)));
    ///
    /// local.merge(remote);
    /// assert_eq!("remote", *local.get());
    ///
    /// let mut a = LwwRegister::new(1, Some(Timestamp::from(5)));
    /// let mut b = LwwRegister::new(2, Some(Timestamp::from(5)));
    /// a.merge(b.clone());
    /// b.merge(a.clone());
    /// assert_eq!((2, 2), (*a.get(), *b.get()));
    /// ```
    fn merge(&mut self, other: LwwRegister<T>) {
        if other > *self {
            *self = other;
        }
    }

    /// Apply a set operation to this register.
    ///
    /// This method is used to perform operation-based replication.
    ///
    /// ##### Example
    ///
    /// ```
    /// # use lwwconfig::register::LwwRegister;
    /// # use lwwconfig::{Crdt, Timestamp};
    /// let mut local = LwwRegister::new("local", Some(Timestamp::from(1)));
    /// let mut remote = LwwRegister::new("remote-1", None);
    ///
    /// let op = remote.set("remote-2", Timestamp::from(2)).expect("Register set failed!");
    ///
    /// local.apply(op);
    /// assert_eq!("remote-2", *local.get());
    /// ```
    fn apply(&mut self, other: LwwRegister<T>) {
        self.merge(other);
    }
}

impl <T> PartialEq for LwwRegister<T> where T: PartialEq {
    fn eq(&self, other: &LwwRegister<T>) -> bool {
        self.timestamp == other.timestamp && self.value == other.value
    }
}

impl <T> Eq for LwwRegister<T> where T: Eq {}

impl <T> PartialOrd for LwwRegister<T> where T: Ord {
    fn partial_cmp(&self, other: &LwwRegister<T>) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Registers order by timestamp, then by value.
impl <T> Ord for LwwRegister<T> where T: Ord {
    fn cmp(&self, other: &LwwRegister<T>) -> Ordering {
        self.timestamp.cmp(&other.timestamp).then_with(|| self.value.cmp(&other.value))
    }
}

#[cfg(any(test, feature = "quickcheck_generators"))]
impl <T> Arbitrary for LwwRegister<T> where T: Arbitrary {
    fn arbitrary(g: &mut Gen) -> LwwRegister<T> {
        // Narrow timestamps so that replicas often tie.
        let timestamp = Option::<u8>::arbitrary(g).map(|millis| Timestamp::from(u64::from(millis)));
        LwwRegister { value: Arbitrary::arbitrary(g), timestamp }
    }
    fn shrink(&self) -> Box<dyn Iterator<Item = LwwRegister<T>>> {
        let tuple = (self.value.clone(), self.timestamp);
        Box::new(tuple.shrink().map(|(value, timestamp)| LwwRegister { value, timestamp }))
    }
}
