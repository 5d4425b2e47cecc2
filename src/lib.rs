//! fetch_cache - A read-through expiring cache
//!
//! Serves values from a backing store (in-memory or Redis) while fresh and
//! recomputes them on a miss, running at most one computation per key at a
//! time within the process.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheStats, ReadThroughCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Backend, Config};
pub use error::{CacheError, Result};
pub use store::{BackingStore, MemoryStore, RedisConfig, RedisStore};
pub use tasks::spawn_purge_task;
