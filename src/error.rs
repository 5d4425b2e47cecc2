//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache and its HTTP surface.
///
/// The type is `Clone` so that a single computation outcome can be handed to
/// every caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Backing store could not be reached or did not answer in time
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Value could not be encoded for storage or decoded on read
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The caller-supplied computation failed
    #[error("Compute failed: {0:#}")]
    Compute(Arc<anyhow::Error>),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl CacheError {
    /// Wraps a computation error so it can be shared between waiters.
    pub fn compute(err: impl Into<anyhow::Error>) -> Self {
        CacheError::Compute(Arc::new(err.into()))
    }

    /// True when the failure came from the backing store transport.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, CacheError::StoreUnavailable(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::Compute(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
