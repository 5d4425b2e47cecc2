//! Cache Entry Module
//!
//! Defines the stored entry and the freshness rule applied at read time.

use std::time::Duration;

// == Cache Entry ==
/// A value as recorded by a backing store, with its expiration metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Key the entry is stored under
    pub key: String,
    /// Encoded value, opaque to the store
    pub value: Vec<u8>,
    /// Write timestamp (Unix milliseconds)
    pub stored_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry written at `now_ms` with an optional TTL.
    ///
    /// A zero TTL yields an entry that is already stale.
    pub fn new(key: impl Into<String>, value: Vec<u8>, ttl: Option<Duration>, now_ms: u64) -> Self {
        Self {
            key: key.into(),
            value,
            stored_at: now_ms,
            expires_at: expires_at(now_ms, ttl),
        }
    }

    // == Is Fresh ==
    /// Checks whether the entry may still be served at `now_ms`.
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        is_fresh(self.expires_at, now_ms)
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry is stale
    /// - `Some(remaining_ms)` if the entry has TTL and is fresh
    /// - `None` if the entry never expires
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expires_at
            .map(|expires| expires.saturating_sub(now_ms))
    }
}

// == Expiration Policy ==
/// An entry is fresh iff it has no deadline or `now < expires_at`.
///
/// Once the deadline is reached the entry is stale, so a TTL of zero never
/// produces a hit.
pub fn is_fresh(expires_at: Option<u64>, now_ms: u64) -> bool {
    match expires_at {
        Some(expires) => now_ms < expires,
        None => true,
    }
}

/// Computes the absolute deadline for a write at `now_ms`.
pub fn expires_at(now_ms: u64, ttl: Option<Duration>) -> Option<u64> {
    ttl.map(|ttl| now_ms.saturating_add(ttl_millis(ttl)))
}

/// TTL in whole milliseconds, saturating at `u64::MAX`.
pub fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}
