//! kvcoord service
//!
//! Serves the two-tier cache over HTTP and holds a worker id lease for the
//! lifetime of the process.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kvcoord::api::create_router;
use kvcoord::{AppState, Config, LocalStore, RedisStore, RemoteStore, TwoTierCache, WorkerIdClaimer};

/// Main entry point for the kvcoord service.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Connect to the remote store
/// 4. Claim a worker id and start lease renewal
/// 5. Create the local store (with its sweeper) and the two-tier cache
/// 6. Serve the HTTP API until SIGINT/SIGTERM
///
/// Any failure before the server starts aborts the process.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kvcoord=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting kvcoord");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        expiration_s = config.expiration.as_secs(),
        clean_interval_s = config.clean_interval.as_secs(),
        addrs = ?config.redis.addrs,
        db = config.redis.db,
        port = config.server_port,
        "Configuration loaded"
    );

    let redis = RedisStore::connect(&config.redis)
        .await
        .context("failed to connect to remote store")?;
    let remote: Arc<dyn RemoteStore> = Arc::new(redis);

    let lease = WorkerIdClaimer::new(Arc::clone(&remote), config.worker.clone())
        .claim()
        .await
        .context("failed to obtain a worker id")?;
    info!(worker_id = lease.worker_id(), "Worker id ready");

    let local = LocalStore::new(config.expiration, config.clean_interval);
    let cache = TwoTierCache::new(local.clone(), remote);
    let app = create_router(AppState::new(cache, Some(lease.worker_id())));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Err(e) = local.stop_sweeper() {
        warn!(error = %e, "Local sweeper was not running");
    }
    lease.stop();
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
}
