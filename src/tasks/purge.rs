//! Expired Entry Purge Task
//!
//! Background task that periodically drops expired entries from a
//! [`MemoryStore`]. Expiration is already enforced at read time; this only
//! returns memory held by entries nobody reads again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::MemoryStore;

/// Spawns a task that purges expired entries every `interval_secs` seconds.
///
/// The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(MemoryStore::new(1000));
/// let purge_handle = spawn_purge_task(store.clone(), 1);
/// // Later, during shutdown:
/// purge_handle.abort();
/// ```
pub fn spawn_purge_task(store: Arc<MemoryStore>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting expired entry purge with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.purge_expired().await;
            if removed > 0 {
                info!("Purge: removed {} expired entries", removed);
            } else {
                debug!("Purge: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BackingStore;

    #[tokio::test]
    async fn test_purge_task_removes_expired_entries() {
        let store = Arc::new(MemoryStore::new(100));
        store
            .set("expire_soon", b"v".to_vec(), Some(Duration::from_millis(200)))
            .await
            .unwrap();

        let handle = spawn_purge_task(store.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert!(store.get("expire_soon").await.unwrap().is_none());
        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_preserves_valid_entries() {
        let store = Arc::new(MemoryStore::new(100));
        store
            .set("long_lived", b"v".to_vec(), Some(Duration::from_secs(3600)))
            .await
            .unwrap();
        store.set("forever", b"v".to_vec(), None).await.unwrap();

        let handle = spawn_purge_task(store.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.len().await, 2);
        handle.abort();
    }

    #[tokio::test]
    async fn test_purge_task_can_be_aborted() {
        let store = Arc::new(MemoryStore::new(100));
        let handle = spawn_purge_task(store, 1);

        handle.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished());
    }
}
