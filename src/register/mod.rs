//! Register CRDTs.
//!
//! The `set` operation on a register does not commute, so a traditional
//! register cannot be a CRDT. A last-writer-wins register approximates one
//! by resolving concurrent sets with the timestamp attached to each write.
//!
//! ##### Register Types
//!
//! ###### `LwwRegister`
//!
//! A last-writer-wins register. `LwwRegister` does not have a separate
//! operation type for operation-based replication. Instead, operation-based
//! replication uses the full state of the register.
//!
//! `LwwRegister` keeps the value written with the largest timestamp. A local
//! write whose timestamp equals the current one is accepted, so replaying a
//! write is harmless. Merging replicas with equal timestamps keeps the larger
//! value, so every replica settles on the same one. A register that has never
//! been written carries no timestamp and accepts any write.

pub use self::lwwregister::{wins, LwwRegister};

mod lwwregister;
