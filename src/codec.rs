//! Translation between typed values and their stored text.
//!
//! Values are stored as JSON, so primitives, sequences and plain records all
//! round-trip. A bare string is stored quoted: `"dark"`, not `dark`.
//! Timestamps are stored as decimal integers.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{CodecError, Timestamp};

/// A type that can be held by a property.
pub trait Value: Serialize + DeserializeOwned + Clone + Debug + 'static {}

impl <T> Value for T where T: Serialize + DeserializeOwned + Clone + Debug + 'static {}

/// Encodes a value as stored text.
///
/// ##### Example
///
/// ```
/// use lwwconfig::codec;
///
/// assert_eq!("\"dark\"", codec::encode(&"dark").unwrap());
/// assert_eq!("[1,2,3]", codec::encode(&vec![1, 2, 3]).unwrap());
/// ```
pub fn encode<T>(value: &T) -> Result<String, CodecError> where T: Serialize + ?Sized {
    serde_json::to_string(value).map_err(CodecError::Encode)
}

/// Encodes a value as stored text, failing unless the text decodes back into
/// a `T`.
///
/// JSON has no representation for some values, such as non-finite floats,
/// and `serde_json` writes them as `null`. Such text would read back as
/// corrupt, so it is refused here instead of being stored.
///
/// ##### Example
///
/// ```
/// use lwwconfig::codec;
///
/// assert_eq!("90.0", codec::encode_value(&90.0f64).unwrap());
/// assert!(codec::encode_value(&f64::NAN).is_err());
/// ```
pub fn encode_value<T>(value: &T) -> Result<String, CodecError> where T: Value {
    let raw = encode(value)?;
    serde_json::from_str::<T>(&raw).map_err(CodecError::Encode)?;
    Ok(raw)
}

/// Decodes stored text into a value.
///
/// ##### Example
///
/// ```
/// use lwwconfig::codec;
///
/// assert_eq!(vec![1, 2, 3], codec::decode::<Vec<u8>>("[1,2,3]").unwrap());
/// assert!(codec::decode::<Vec<u8>>("invalid json {]").is_err());
/// ```
pub fn decode<T>(raw: &str) -> Result<T, CodecError> where T: DeserializeOwned {
    serde_json::from_str(raw).map_err(CodecError::Decode)
}

/// Encodes a timestamp as stored text.
pub fn encode_timestamp(timestamp: Timestamp) -> String {
    timestamp.millis().to_string()
}

/// Decodes a stored timestamp. Surrounding whitespace is ignored.
pub fn decode_timestamp(raw: &str) -> Result<Timestamp, CodecError> {
    raw.trim()
       .parse::<u64>()
       .map(Timestamp::from)
       .map_err(|source| CodecError::Timestamp { raw: raw.to_string(), source })
}
