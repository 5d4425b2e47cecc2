//! fetch_cache - HTTP front end for the read-through cache
//!
//! Exposes the cache over JSON and wires it to the configured backing store.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fetch_cache::api::create_router;
use fetch_cache::{spawn_purge_task, AppState, Backend, BackingStore, Config, MemoryStore, RedisStore};

/// Main entry point for the cache service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the backing store (memory or Redis)
/// 4. Start the purge task for the memory store
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fetch_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fetch_cache service");

    let config = Config::from_env();
    info!(
        "Configuration loaded: backend={:?}, default_ttl={}s, port={}, cleanup_interval={}s",
        config.backend, config.default_ttl, config.server_port, config.cleanup_interval
    );

    let (store, purge_handle) = build_store(&config).await?;
    let state = AppState::from_config(&config, store);
    info!("Read-through cache initialized");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(purge_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Builds the configured backing store, plus the purge task for memory.
async fn build_store(
    config: &Config,
) -> anyhow::Result<(Arc<dyn BackingStore>, Option<JoinHandle<()>>)> {
    match config.backend {
        Backend::Memory => {
            let memory = Arc::new(MemoryStore::new(config.max_entries));
            let purge = (config.cleanup_interval > 0)
                .then(|| spawn_purge_task(memory.clone(), config.cleanup_interval));
            info!(max_entries = config.max_entries, "Using in-memory store");
            Ok((memory as Arc<dyn BackingStore>, purge))
        }
        Backend::Redis => {
            let store = RedisStore::connect(config.redis())
                .await
                .with_context(|| format!("failed to connect to Redis at {}", config.redis_url))?;
            Ok((Arc::new(store) as Arc<dyn BackingStore>, None))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the purge task and allows graceful shutdown.
async fn shutdown_signal(purge_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = purge_handle {
        handle.abort();
        warn!("Purge task aborted");
    }
}
