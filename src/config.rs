//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::store::RedisConfig;

// == Backend ==
/// Which backing store the service runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Redis,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Backend::Memory),
            "redis" => Ok(Backend::Redis),
            other => Err(format!("unknown cache backend '{other}'")),
        }
    }
}

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backing store to use
    pub backend: Backend,
    /// Redis connection URL
    pub redis_url: String,
    /// Namespace prefix for Redis keys
    pub redis_prefix: String,
    /// Per-command Redis timeout in milliseconds
    pub redis_operation_timeout_ms: u64,
    /// Maximum number of entries the memory store can hold (0 = unbounded)
    pub max_entries: usize,
    /// Default TTL in seconds for writes without explicit TTL
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Memory store purge interval in seconds (0 = disabled)
    pub cleanup_interval: u64,
    /// Simulated latency of the demo origin behind `/fetch`, in milliseconds
    pub compute_delay_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - `memory` or `redis` (default: memory)
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1:6379)
    /// - `REDIS_PREFIX` - Redis key prefix (default: fetch_cache:)
    /// - `REDIS_OPERATION_TIMEOUT_MS` - Redis command timeout (default: 2000)
    /// - `MAX_ENTRIES` - Memory store capacity (default: 1000)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Purge frequency in seconds (default: 1)
    /// - `COMPUTE_DELAY_MS` - Demo origin latency (default: 500)
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: parse_env("CACHE_BACKEND").unwrap_or(defaults.backend),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            redis_prefix: env::var("REDIS_PREFIX").unwrap_or(defaults.redis_prefix),
            redis_operation_timeout_ms: parse_env("REDIS_OPERATION_TIMEOUT_MS")
                .unwrap_or(defaults.redis_operation_timeout_ms),
            max_entries: parse_env("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl: parse_env("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_env("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            compute_delay_ms: parse_env("COMPUTE_DELAY_MS").unwrap_or(defaults.compute_delay_ms),
        }
    }

    /// Default TTL as a duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    /// Redis settings derived from this configuration.
    pub fn redis(&self) -> RedisConfig {
        RedisConfig {
            url: self.redis_url.clone(),
            prefix: self.redis_prefix.clone(),
            operation_timeout: Duration::from_millis(self.redis_operation_timeout_ms),
            ..RedisConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            redis_prefix: "fetch_cache:".to_string(),
            redis_operation_timeout_ms: 2000,
            max_entries: 1000,
            default_ttl: 300,
            server_port: 3000,
            cleanup_interval: 1,
            compute_delay_ms: 500,
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
