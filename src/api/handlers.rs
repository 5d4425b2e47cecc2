//! API Handlers
//!
//! HTTP request handlers for each cache endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use tracing::warn;

use super::origin::SlowOrigin;
use crate::cache::ReadThroughCache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    resolve_ttl, validate_key, FetchParams, HealthResponse, MessageResponse, StatsResponse,
    ValueResponse, WriteRequest,
};
use crate::store::BackingStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Read-through cache over the configured backing store
    pub cache: ReadThroughCache,
    /// Computation used by `/fetch`
    pub origin: SlowOrigin,
    /// TTL applied when a request does not carry one
    pub default_ttl: Duration,
}

impl AppState {
    /// Creates a new AppState over the given cache.
    pub fn new(cache: ReadThroughCache, origin: SlowOrigin, default_ttl: Duration) -> Self {
        Self {
            cache,
            origin,
            default_ttl,
        }
    }

    /// Creates a new AppState from configuration and an already-built store.
    pub fn from_config(config: &Config, store: Arc<dyn BackingStore>) -> Self {
        Self::new(
            ReadThroughCache::new(store),
            SlowOrigin::new(Duration::from_millis(config.compute_delay_ms)),
            config.default_ttl(),
        )
    }
}

/// Handler for PUT /write
///
/// Stores a JSON value under a key with optional TTL.
pub async fn write_handler(
    State(state): State<AppState>,
    Json(req): Json<WriteRequest>,
) -> Result<Json<MessageResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = resolve_ttl(req.ttl, state.default_ttl);
    state.cache.write(&req.key, &req.value, Some(ttl)).await?;

    Ok(Json(MessageResponse::written(req.key)))
}

/// Handler for GET /read/:key
///
/// Returns the value if a fresh entry exists.
pub async fn read_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ValueResponse>> {
    let value: Value = state
        .cache
        .read(&key)
        .await?
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(ValueResponse::new(key, value)))
}

/// Handler for GET /fetch/:key
///
/// Read-through: serves a fresh entry or runs the slow origin once.
pub async fn fetch_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<FetchParams>,
) -> Result<Json<ValueResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = resolve_ttl(params.ttl, state.default_ttl);
    let origin = state.origin.clone();
    let origin_key = key.clone();
    let value: Value = state
        .cache
        .fetch(&key, Some(ttl), move || async move {
            origin.compute(&origin_key).await
        })
        .await?;

    Ok(Json(ValueResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>> {
    if !state.cache.delete(&key).await? {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(MessageResponse::deleted(key)))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<MessageResponse>> {
    state.cache.clear().await?;
    Ok(Json(MessageResponse::cleared()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.cache.stats(),
        state.cache.in_flight(),
    ))
}

/// Handler for GET /health
///
/// Reports "degraded" rather than failing when the store does not answer;
/// the cache keeps serving by recomputing.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.cache.store();
    let reachable = match store.ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(store = store.name(), error = %err, "health check could not reach store");
            false
        }
    };

    Json(HealthResponse::new(store.name(), reachable))
}
