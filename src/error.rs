use std::io;
use std::num::ParseIntError;

use crate::Timestamp;

/// Failure of a storage backend `get` or `set`.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failure to translate between a typed value and its stored text.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("value could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("stored text could not be decoded: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("stored timestamp {raw:?} is not an integer: {source}")]
    Timestamp { raw: String, source: ParseIntError },
}

/// Why a write to a property was refused.
///
/// A rejected write leaves the property, its storage and its subscribers
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejected {
    #[error("stale write: timestamp {candidate} is older than stored {stored}")]
    Stale { candidate: Timestamp, stored: Timestamp },
    #[error("value failed validation")]
    Invalid,
    #[error("value could not be encoded: {0}")]
    Encode(String),
}

/// Registry and snapshot errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("property '{0}' not found")]
    NotFound(String),
    #[error("property '{0}' is already registered")]
    Duplicate(String),
    #[error("property '{key}' does not hold values of type {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    #[error("invalid config snapshot: {0}")]
    InvalidSnapshot(#[source] serde_json::Error),
}
