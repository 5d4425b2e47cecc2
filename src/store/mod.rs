//! Backing Store Module
//!
//! The key-value stores a [`ReadThroughCache`](crate::cache::ReadThroughCache)
//! reads from and writes to.
//!
//! # Implementations
//! - [`MemoryStore`]: in-process HashMap with an optional LRU capacity bound
//! - [`RedisStore`]: entries kept as Redis hashes under a key prefix

mod lru;
mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

use crate::cache::CacheEntry;
use crate::error::Result;

pub use lru::LruTracker;
pub use memory::MemoryStore;
pub use redis_store::{RedisConfig, RedisStore};

// == Backing Store ==
/// Durable key -> bytes storage with optional per-entry expiration.
///
/// Stores never apply freshness logic: `get` hands back whatever was recorded,
/// deadline included, and the cache decides whether it is still usable.
///
/// Transport failures are reported as
/// [`CacheError::StoreUnavailable`](crate::error::CacheError::StoreUnavailable).
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Returns the stored entry verbatim, or None if the key was never written.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Replaces the entry for `key`. `expires_at` becomes `now + ttl`, or never
    /// when `ttl` is None. Writing the same value twice is harmless.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Removes one entry. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Removes every entry in the store's namespace.
    async fn clear(&self) -> Result<()>;

    /// Liveness probe for health reporting.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;
}
