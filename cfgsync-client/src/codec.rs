//! Value serialization. The clients move opaque bytes; this is the JSON
//! encoding applied on top by the typed `get`/`set` helpers.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ClientResult;

/// Encodes a value for storage.
pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> ClientResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes a stored value.
pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> ClientResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}
