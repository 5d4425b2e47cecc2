//! Redis Store Module
//!
//! Each cache entry is a Redis hash under `<prefix><key>`:
//!
//! | field        | content                          |
//! |--------------|----------------------------------|
//! | `value`      | encoded value bytes              |
//! | `stored_at`  | write time, Unix ms (decimal)    |
//! | `expires_at` | deadline, Unix ms; absent = never |
//!
//! Writes replace the whole hash inside MULTI/EXEC, so readers never observe
//! a half-written entry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client, ErrorKind, RedisError};
use async_trait::async_trait;
use tracing::{debug, info};

use super::BackingStore;
use crate::cache::{expires_at, ttl_millis, CacheEntry};
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};

const FIELD_VALUE: &str = "value";
const FIELD_STORED_AT: &str = "stored_at";
const FIELD_EXPIRES_AT: &str = "expires_at";

// == Redis Config ==
/// Redis connection settings.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL, e.g. "redis://127.0.0.1:6379"
    pub url: String,
    /// Namespace prepended to every key; `clear` only touches this namespace
    pub prefix: String,
    /// Upper bound for establishing the connection
    pub connect_timeout: Duration,
    /// Upper bound for any single command
    pub operation_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            prefix: "fetch_cache:".to_string(),
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(2),
        }
    }
}

// == Redis Store ==
/// Backing store on a Redis server, reconnecting automatically after drops.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    config: RedisConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connects to the server described by `config`.
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        Self::connect_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Connects and timestamps writes with `clock`.
    pub async fn connect_with_clock(config: RedisConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::StoreUnavailable(format!("invalid Redis URL: {e}")))?;

        let conn = with_timeout(config.connect_timeout, ConnectionManager::new(client)).await?;
        info!(url = %config.url, prefix = %config.prefix, "connected to Redis");

        Ok(Self {
            conn,
            config,
            clock,
        })
    }

    fn key(&self, key: &str) -> String {
        namespaced(&self.config.prefix, key)
    }

    async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = ::redis::RedisResult<T>>,
    {
        with_timeout(self.config.operation_timeout, fut).await
    }
}

#[async_trait]
impl BackingStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, Vec<u8>> = self.run(conn.hgetall(self.key(key))).await?;

        if fields.is_empty() {
            return Ok(None);
        }
        parse_entry(key, fields).map(Some)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let redis_key = self.key(key);
        let now = self.clock.now_ms();

        let mut fields: Vec<(&str, Vec<u8>)> = vec![
            (FIELD_VALUE, value),
            (FIELD_STORED_AT, now.to_string().into_bytes()),
        ];
        if let Some(deadline) = expires_at(now, ttl) {
            fields.push((FIELD_EXPIRES_AT, deadline.to_string().into_bytes()));
        }

        let mut pipe = ::redis::pipe();
        pipe.atomic()
            .del(&redis_key)
            .ignore()
            .hset_multiple(&redis_key, fields.as_slice())
            .ignore();

        if let Some(ttl_ms) = ttl.and_then(|t| physical_ttl_ms(now, t)) {
            pipe.pexpire(&redis_key, ttl_ms).ignore();
        }

        let mut conn = self.conn.clone();
        let () = self.run(pipe.query_async(&mut conn)).await?;
        debug!(key = %redis_key, ?ttl, "stored entry");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self.run(conn.del(self.key(key))).await?;
        Ok(deleted > 0)
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", escape_glob(&self.config.prefix));
        let keys: Vec<String> = self.run(conn.keys(&pattern)).await?;

        if keys.is_empty() {
            return Ok(());
        }

        let deleted: i64 = self.run(conn.del(&keys)).await?;
        info!(deleted, prefix = %self.config.prefix, "cleared Redis namespace");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let cmd = ::redis::cmd("PING");
        let _pong: String = self.run(cmd.query_async(&mut conn)).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

// == Helpers ==
fn namespaced(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}")
}

/// Escapes KEYS glob metacharacters so the prefix matches only itself.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Milliseconds to hand PEXPIRE, or None when the key should persist.
///
/// Zero TTL keeps the (already stale) entry until it is overwritten. A TTL
/// whose deadline Redis cannot represent leaves the key without physical
/// expiry; freshness is still judged from the stored `expires_at`.
fn physical_ttl_ms(now_ms: u64, ttl: Duration) -> Option<i64> {
    let ms = i64::try_from(ttl_millis(ttl)).ok().filter(|ms| *ms > 0)?;
    let now = i64::try_from(now_ms).ok()?;
    now.checked_add(ms).map(|_| ms)
}

async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = ::redis::RedisResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(map_redis_error),
        Err(_) => Err(CacheError::StoreUnavailable(format!(
            "Redis did not answer within {limit:?}"
        ))),
    }
}

/// Reply-type errors mean the stored data is not what we wrote; everything
/// else is a transport problem.
fn map_redis_error(err: RedisError) -> CacheError {
    match err.kind() {
        ErrorKind::TypeError => CacheError::Serialization(err.to_string()),
        _ => CacheError::StoreUnavailable(err.to_string()),
    }
}

fn parse_entry(key: &str, mut fields: HashMap<String, Vec<u8>>) -> Result<CacheEntry> {
    let value = fields.remove(FIELD_VALUE).ok_or_else(|| {
        CacheError::Serialization(format!("entry '{key}' has no '{FIELD_VALUE}' field"))
    })?;
    let stored_at = match fields.get(FIELD_STORED_AT) {
        Some(raw) => parse_millis(key, FIELD_STORED_AT, raw)?,
        None => 0,
    };
    let expires_at = fields
        .get(FIELD_EXPIRES_AT)
        .map(|raw| parse_millis(key, FIELD_EXPIRES_AT, raw))
        .transpose()?;

    Ok(CacheEntry {
        key: key.to_string(),
        value,
        stored_at,
        expires_at,
    })
}

fn parse_millis(key: &str, field: &str, raw: &[u8]) -> Result<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            CacheError::Serialization(format!("entry '{key}' has a malformed '{field}' field"))
        })
}
