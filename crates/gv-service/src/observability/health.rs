//! Health endpoints.
//!
//! - `GET /health` - liveness, answers while the process is running
//! - `GET /ready` - readiness: startup finished, coordinator not draining and
//!   the session store answering a ping
//!
//! `/metrics` is served by the main router from the Prometheus handle.

use crate::coordinator::Coordinator;
use crate::models::ReadinessResponse;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Startup flag behind `/ready`.
///
/// Set once the listener is bound and cleared when a shutdown signal arrives,
/// ahead of the coordinator starting to drain.
#[derive(Debug, Default)]
pub struct HealthState {
    ready: AtomicBool,
}

impl HealthState {
    /// Create a new health state (not ready).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct HealthRouteState {
    health: Arc<HealthState>,
    coordinator: Arc<Coordinator>,
}

/// Router with `/health` and `/ready`.
pub fn health_router(health_state: Arc<HealthState>, coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(HealthRouteState {
            health: health_state,
            coordinator,
        })
}

async fn liveness_handler() -> &'static str {
    "OK"
}

fn not_ready(store: Option<&'static str>, error: &str) -> (StatusCode, Json<ReadinessResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ReadinessResponse {
            status: "not_ready",
            store,
            error: Some(error.to_string()),
        }),
    )
}

/// Store errors are logged here and never returned to the caller.
#[instrument(skip_all, name = "gv.health.readiness")]
async fn readiness_handler(
    State(state): State<HealthRouteState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    if !state.health.is_ready() {
        return not_ready(None, "Service is starting or shutting down");
    }
    if state.coordinator.is_draining() {
        return not_ready(None, "Service is draining");
    }

    if let Err(e) = state.coordinator.check_store().await {
        warn!(target: "gv.health", error = %e, "Readiness check failed: session store unreachable");
        return not_ready(Some("unhealthy"), "Service dependencies unavailable");
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            store: Some("healthy"),
            error: None,
        }),
    )
}
