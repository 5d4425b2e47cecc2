//! Read-Through Cache Module
//!
//! `fetch` serves fresh entries from the backing store and otherwise runs the
//! caller's computation once per key, sharing the result with every caller
//! that missed while it was running.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::codec;
use super::flight::{FlightTable, Outcome};
use super::stats::{CacheStats, StatsCounters};
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use crate::store::BackingStore;

/// What a store lookup produced, after applying the expiration policy.
enum Lookup {
    Fresh(Vec<u8>),
    Miss,
}

// == Read-Through Cache ==
/// Read-through cache with expiration and single-flight recomputation.
///
/// Cheap to clone; clones share the store handle, the in-flight table and
/// the statistics.
#[derive(Clone)]
pub struct ReadThroughCache {
    store: Arc<dyn BackingStore>,
    clock: Arc<dyn Clock>,
    flights: FlightTable,
    stats: Arc<StatsCounters>,
}

impl ReadThroughCache {
    // == Constructors ==
    /// Creates a cache over `store` using the system clock.
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a cache that judges freshness with `clock`.
    ///
    /// The store should write with the same clock, otherwise deadlines and
    /// reads disagree.
    pub fn with_clock(store: Arc<dyn BackingStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            flights: FlightTable::new(),
            stats: Arc::new(StatsCounters::new()),
        }
    }

    // == Fetch ==
    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// - A fresh entry is returned without calling `compute` or writing.
    /// - On a miss, concurrent callers in this process share one run of
    ///   `compute`. Its result is written with `ttl` (None = never expires)
    ///   and returned to all of them.
    /// - A failed `compute` writes nothing and is returned to every waiter as
    ///   [`CacheError::Compute`]; the next `fetch` tries again.
    /// - An unreachable store is treated as a miss on read, and a failed
    ///   write after a successful computation is logged and skipped.
    ///
    /// The computation runs on its own task. Dropping this future does not
    /// cancel it; the result still reaches other waiters and the store.
    pub async fn fetch<T, F, Fut, E>(&self, key: &str, ttl: Option<Duration>, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        if let Lookup::Fresh(bytes) = self.lookup(key).await? {
            return codec::decode(&bytes);
        }

        let (outcome, ticket) = self.flights.join(key);
        match ticket {
            Some(ticket) => {
                let this = self.clone();
                let key = key.to_string();
                tokio::spawn(async move {
                    let result = this.compute_and_store(&key, ttl, compute).await;
                    ticket.resolve(result);
                });
            }
            None => {
                debug!(key, "joining in-flight computation");
                self.stats.record_coalesced();
            }
        }

        let bytes = outcome.await?;
        codec::decode(&bytes)
    }

    /// Body of a flight. Runs on its own task.
    async fn compute_and_store<T, F, Fut, E>(&self, key: &str, ttl: Option<Duration>, compute: F) -> Outcome
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        // A flight that finished between our lookup and registering this one
        // has already written a fresh entry
        if let Ok(Some(entry)) = self.store.get(key).await {
            if entry.is_fresh(self.clock.now_ms()) {
                debug!(key, "entry became fresh while waiting to compute");
                return Ok(Arc::from(entry.value));
            }
        }

        self.stats.record_computation();
        debug!(key, ?ttl, "computing value");

        let value = match AssertUnwindSafe(compute()).catch_unwind().await {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                self.stats.record_compute_failure();
                let err = CacheError::compute(err);
                warn!(key, error = %err, "computation failed, nothing cached");
                return Err(err);
            }
            Err(_) => {
                self.stats.record_compute_failure();
                warn!(key, "computation panicked, nothing cached");
                return Err(CacheError::compute(anyhow::anyhow!(
                    "computation for '{key}' panicked"
                )));
            }
        };

        let bytes = codec::encode(&value)?;
        if let Err(err) = self.store.set(key, bytes.clone(), ttl).await {
            if !err.is_store_unavailable() {
                return Err(err);
            }
            self.stats.record_store_error();
            warn!(key, error = %err, "could not store computed value, serving it uncached");
        }

        Ok(Arc::from(bytes))
    }

    // == Read ==
    /// Returns the value for `key` if a fresh entry exists.
    ///
    /// An unreachable store reads as absent.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.lookup(key).await? {
            Lookup::Fresh(bytes) => codec::decode(&bytes).map(Some),
            Lookup::Miss => Ok(None),
        }
    }

    async fn lookup(&self, key: &str) -> Result<Lookup> {
        let entry = match self.store.get(key).await {
            Ok(entry) => entry,
            Err(err) if err.is_store_unavailable() => {
                self.stats.record_store_error();
                self.stats.record_miss();
                warn!(key, error = %err, "backing store unavailable, treating as miss");
                return Ok(Lookup::Miss);
            }
            Err(err) => return Err(err),
        };

        match entry {
            Some(entry) if entry.is_fresh(self.clock.now_ms()) => {
                self.stats.record_hit();
                debug!(key, "cache hit");
                Ok(Lookup::Fresh(entry.value))
            }
            Some(_) => {
                self.stats.record_stale();
                debug!(key, "cache entry stale");
                Ok(Lookup::Miss)
            }
            None => {
                self.stats.record_miss();
                debug!(key, "cache miss");
                Ok(Lookup::Miss)
            }
        }
    }

    // == Write ==
    /// Stores `value` under `key`. Store failures are returned to the caller.
    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let bytes = codec::encode(value)?;
        self.store.set(key, bytes, ttl).await?;
        debug!(key, ?ttl, "wrote entry");
        Ok(())
    }

    // == Delete ==
    /// Removes `key`. Returns whether an entry existed.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.store.delete(key).await
    }

    // == Clear ==
    /// Removes every entry from the backing store.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        debug!(store = self.store.name(), "cleared cache");
        Ok(())
    }

    // == Introspection ==
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Number of computations currently running.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// The backing store this cache reads and writes.
    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }
}

impl std::fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("store", &self.store.name())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cache_at(clock: &ManualClock) -> ReadThroughCache {
        let clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = Arc::new(MemoryStore::with_clock(0, clock.clone()));
        ReadThroughCache::with_clock(store, clock)
    }

    #[tokio::test]
    async fn test_read_never_written() {
        let cache = cache_at(&ManualClock::new(0));
        let value: Option<String> = cache.read("missing").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_fetch_computes_then_hits() {
        let cache = cache_at(&ManualClock::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value: u64 = cache
                .fetch("answer", Some(Duration::from_secs(60)), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, anyhow::Error>(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.computations, 1);
    }

    #[tokio::test]
    async fn test_fetch_after_expiry_recomputes() {
        let clock = ManualClock::new(0);
        let cache = cache_at(&clock);

        cache.write("k", "v1", Some(Duration::from_secs(10))).await.unwrap();
        clock.advance(Duration::from_secs(11));

        let value: String = cache
            .fetch("k", Some(Duration::from_secs(10)), || async {
                Ok::<_, anyhow::Error>("v2".to_string())
            })
            .await
            .unwrap();

        assert_eq!(value, "v2");
        assert_eq!(cache.stats().stale, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_never_hits() {
        let cache = cache_at(&ManualClock::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let _: u32 = cache
                .fetch("k", Some(Duration::ZERO), move || async move {
                    Ok::<_, anyhow::Error>(calls.fetch_add(1, Ordering::SeqCst) as u32)
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.read::<u32>("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_compute_is_not_cached() {
        let cache = cache_at(&ManualClock::new(0));

        let result: Result<String> = cache
            .fetch("k", None, || async { Err(anyhow::anyhow!("query timed out")) })
            .await;
        match result {
            Err(CacheError::Compute(err)) => assert!(err.to_string().contains("query timed out")),
            other => panic!("expected compute error, got {other:?}"),
        }

        assert!(cache.read::<String>("k").await.unwrap().is_none());
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.stats().compute_failures, 1);
    }

    #[tokio::test]
    async fn test_panicking_compute_is_reported() {
        let cache = cache_at(&ManualClock::new(0));

        let result: Result<String> = cache
            .fetch("k", None, || async {
                if true {
                    panic!("aggregation bug");
                }
                Ok::<_, anyhow::Error>(String::new())
            })
            .await;

        assert!(matches!(result, Err(CacheError::Compute(_))));
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_fetch_decodes_into_wrong_type() {
        let cache = cache_at(&ManualClock::new(0));
        cache.write("k", "text", None).await.unwrap();

        let result: Result<u64> = cache
            .fetch("k", None, || async { Ok::<_, anyhow::Error>(1) })
            .await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = cache_at(&ManualClock::new(0));
        cache.write("a", &1, None).await.unwrap();
        cache.write("b", &2, None).await.unwrap();

        assert!(cache.delete("a").await.unwrap());
        assert!(!cache.delete("a").await.unwrap());
        assert_eq!(cache.read::<i32>("b").await.unwrap(), Some(2));

        cache.clear().await.unwrap();
        assert!(cache.read::<i32>("b").await.unwrap().is_none());
    }
}
