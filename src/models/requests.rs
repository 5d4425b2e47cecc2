//! Request DTOs for the cache HTTP API
//!
//! Defines the structure of incoming request bodies and query strings.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::MAX_KEY_LENGTH;

/// Request body for the WRITE operation (PUT /write)
#[derive(Debug, Clone, Deserialize)]
pub struct WriteRequest {
    /// The cache key
    pub key: String,
    /// Any JSON value
    pub value: serde_json::Value,
    /// Optional TTL in seconds; zero or negative stores an already-stale entry
    #[serde(default)]
    pub ttl: Option<i64>,
}

impl WriteRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        validate_key(&self.key)
    }
}

/// Query string for GET /fetch/:key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchParams {
    /// Optional TTL in seconds for the computed value
    #[serde(default)]
    pub ttl: Option<i64>,
}

/// Checks a key supplied over HTTP.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}

/// Turns a TTL in seconds into a duration, falling back to `default`.
///
/// Negative values clamp to zero.
pub fn resolve_ttl(ttl: Option<i64>, default: Duration) -> Duration {
    match ttl {
        Some(secs) => Duration::from_secs(secs.max(0) as u64),
        None => default,
    }
}
