//! Memory Store Module
//!
//! In-process backing store: HashMap storage with LRU eviction once full.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{BackingStore, LruTracker};
use crate::cache::CacheEntry;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
}

// == Memory Store ==
/// HashMap-backed store. A `max_entries` of 0 means unbounded.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    max_entries: usize,
    evictions: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates a store holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    /// Creates a store that timestamps writes with `clock`.
    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_entries,
            evictions: AtomicU64::new(0),
            clock,
        }
    }

    // == Purge Expired ==
    /// Physically removes entries whose deadline has passed.
    ///
    /// Returns the number of entries removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut inner = self.inner.write().await;

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.entries.remove(key);
            inner.lru.remove(key);
        }

        expired.len()
    }

    /// Number of entries physically present, stale ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// Entries dropped to stay within `max_entries`.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        // Write lock: reads refresh LRU position
        let mut inner = self.inner.write().await;
        let entry = inner.entries.get(key).cloned();
        if entry.is_some() {
            inner.lru.touch(key);
        }
        Ok(entry)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let entry = CacheEntry::new(key, value, ttl, self.clock.now_ms());
        let mut inner = self.inner.write().await;

        let is_overwrite = inner.entries.contains_key(key);
        if !is_overwrite && self.max_entries > 0 && inner.entries.len() >= self.max_entries {
            if let Some(evicted) = inner.lru.evict_oldest() {
                inner.entries.remove(&evicted);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %evicted, "evicted least recently used entry");
            }
        }

        inner.entries.insert(key.to_string(), entry);
        inner.lru.touch(key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.lru.remove(key);
        Ok(inner.entries.remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.entries.clear();
        inner.lru.clear();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
