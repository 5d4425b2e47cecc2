//! Demo origin behind `GET /fetch/:key`.
//!
//! Stands in for a slow aggregation query: it waits for the configured delay
//! and then describes what it computed and when.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Clone)]
pub struct SlowOrigin {
    delay: Duration,
    runs: Arc<AtomicU64>,
}

impl SlowOrigin {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Produces the value for `key` after the configured delay.
    pub async fn compute(&self, key: &str) -> anyhow::Result<Value> {
        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        info!(key, run, delay = ?self.delay, "running slow origin computation");
        tokio::time::sleep(self.delay).await;

        Ok(json!({
            "key": key,
            "run": run,
            "computed_at": chrono::Utc::now().to_rfc3339(),
        }))
    }

    /// How many times the origin has been asked to compute.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}
