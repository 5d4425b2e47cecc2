//! Value codec: typed values to stored bytes and back (JSON).

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{CacheError, Result};

/// Encodes a value for storage.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(CacheError::from)
}

/// Decodes stored bytes into a value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(CacheError::from)
}
