//! HTTP routes for the group viewing service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_identity};
use crate::observability::{health_router, HealthState};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Routes every session operation to its actor.
    pub coordinator: Arc<Coordinator>,

    /// Service configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health`, `/ready` - liveness and readiness checks (public)
/// - `/metrics` - Prometheus metrics (public)
/// - `/v1/sessions/...` - session API, requires caller identity headers
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(
    state: Arc<AppState>,
    health_state: Arc<HealthState>,
    metrics_handle: Option<PrometheusHandle>,
) -> Router {
    let coordinator = Arc::clone(&state.coordinator);
    let api_routes = Router::new()
        .route(
            "/v1/sessions",
            post(handlers::create_session).get(handlers::list_sessions),
        )
        .route(
            "/v1/sessions/:id",
            get(handlers::get_session).patch(handlers::update_session),
        )
        .route("/v1/sessions/:id/start", post(handlers::start_session))
        .route("/v1/sessions/:id/end", post(handlers::end_session))
        .route(
            "/v1/sessions/:id/participants",
            post(handlers::join_session),
        )
        .route(
            "/v1/sessions/:id/participants/me",
            delete(handlers::leave_session),
        )
        .route(
            "/v1/sessions/:id/control/request",
            post(handlers::request_control),
        )
        .route(
            "/v1/sessions/:id/control/grant",
            post(handlers::grant_control),
        )
        .route(
            "/v1/sessions/:id/control/revoke",
            post(handlers::revoke_control),
        )
        .route("/v1/sessions/:id/playback", post(handlers::issue_control))
        .route(
            "/v1/sessions/:id/events",
            post(handlers::post_event).get(handlers::list_events),
        )
        .route(
            "/v1/sessions/:id/events/:event_id/reactions/:kind",
            put(handlers::add_reaction).delete(handlers::remove_reaction),
        )
        .route("/v1/sessions/:id/polls", post(handlers::create_poll))
        .route(
            "/v1/sessions/:id/polls/:poll_id/responses",
            post(handlers::respond_to_poll),
        )
        .route(
            "/v1/sessions/:id/polls/:poll_id/results",
            get(handlers::poll_results),
        )
        .route_layer(middleware::from_fn(require_identity))
        .with_state(state);

    let mut router = health_router(health_state, coordinator).merge(api_routes);

    // Metrics route with its own state
    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route("/metrics", get(handlers::metrics_handler))
                .with_state(handle),
        );
    }

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    router
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
