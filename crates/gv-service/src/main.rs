//! Group Viewing Service
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Install the tracing subscriber
//! 3. Initialize Prometheus metrics recorder
//! 4. Connect the session store (memory or Redis)
//! 5. Build the `Coordinator` and HTTP routes
//! 6. Serve until SIGINT/SIGTERM, then drain session actors

use anyhow::Context;
use common::config::ObservabilityConfig;
use common::secret::ExposeSecret;
use gv_service::config::{Config, StoreBackend, DEFAULT_LOG_FILTER};
use gv_service::coordinator::Coordinator;
use gv_service::observability::metrics::init_metrics_recorder;
use gv_service::observability::HealthState;
use gv_service::routes::{self, AppState};
use gv_service::store::{InMemorySessionStore, RedisSessionStore, SessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    ObservabilityConfig {
        log_filter: DEFAULT_LOG_FILTER.to_string(),
        json_logs: config.json_logs,
    }
    .init_tracing()
    .context("Failed to initialize tracing")?;

    info!(
        instance_id = %config.instance_id,
        bind_address = %config.bind_address,
        store_backend = ?config.store_backend,
        mailbox_capacity = config.mailbox_capacity,
        "Starting Group Viewing Service"
    );

    let metrics_handle = init_metrics_recorder()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize metrics")?;

    let health_state = Arc::new(HealthState::new());

    let store: Arc<dyn SessionStore> = match config.store_backend {
        StoreBackend::Memory => {
            warn!("Using in-memory session store; sessions do not survive restarts");
            Arc::new(InMemorySessionStore::new())
        }
        StoreBackend::Redis => {
            let redis_url = config
                .redis_url
                .as_ref()
                .context("REDIS_URL is required for the redis store backend")?;
            let store = RedisSessionStore::connect(redis_url.expose_secret())
                .await
                .context("Failed to connect to Redis")?;
            info!("Redis session store connected");
            Arc::new(store)
        }
    };

    let shutdown_token = CancellationToken::new();
    let coordinator = Arc::new(Coordinator::with_cancel_token(
        store,
        config.coordinator_config(),
        shutdown_token.child_token(),
    ));

    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.bind_address))?;
    let grace = config.shutdown_grace();

    let state = Arc::new(AppState {
        coordinator: Arc::clone(&coordinator),
        config,
    });
    let app = routes::build_routes(state, Arc::clone(&health_state), Some(metrics_handle));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {addr}"))?;
    health_state.set_ready();
    info!(addr = %addr, "Group Viewing Service listening");

    let server_health = Arc::clone(&health_state);
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        server_health.set_not_ready();
    });

    if let Err(e) = server.await {
        error!(error = %e, "HTTP server error");
    }

    info!("HTTP server stopped, draining sessions...");
    coordinator.shutdown(grace).await;
    shutdown_token.cancel();

    info!("Group Viewing Service shutdown complete");
    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
