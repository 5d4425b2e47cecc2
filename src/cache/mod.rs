//! Cache Module
//!
//! Read-through caching with lazy expiration and single-flight recomputation.

mod codec;
mod entry;
mod flight;
mod read_through;
mod stats;


// Re-export public types
pub use codec::{decode, encode};
pub use entry::{expires_at, is_fresh, ttl_millis, CacheEntry};
pub use read_through::ReadThroughCache;
pub use stats::{CacheStats, StatsCounters};

// == Public Constants ==
/// Maximum allowed key length in bytes at the HTTP boundary
pub const MAX_KEY_LENGTH: usize = 256;
