//! API Module
//!
//! HTTP handlers and routing for the cache service.
//!
//! # Endpoints
//! - `PUT /write` - Store a JSON value
//! - `GET /read/:key` - Read a fresh value
//! - `GET /fetch/:key` - Read-through over the slow origin
//! - `DELETE /del/:key` - Delete a key
//! - `DELETE /clear` - Delete every key
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check, including store reachability

pub mod handlers;
mod origin;
pub mod routes;

pub use handlers::*;
pub use origin::SlowOrigin;
pub use routes::create_router;
