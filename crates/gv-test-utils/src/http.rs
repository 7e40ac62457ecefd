//! Helpers for driving the router with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use gv_service::config::Config;
use gv_service::coordinator::Coordinator;
use gv_service::observability::HealthState;
use gv_service::routes::{build_routes, AppState};
use gv_service::session::Caller;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

/// Router over `coordinator` with readiness set and no metrics endpoint.
pub fn test_router(coordinator: Arc<Coordinator>) -> Router {
    let config = Config::from_vars(&HashMap::new()).expect("default config should load");
    let health = Arc::new(HealthState::new());
    health.set_ready();
    build_routes(Arc::new(AppState { coordinator, config }), health, None)
}

/// Build a request carrying `caller`'s identity headers.
pub fn request(method: Method, uri: &str, caller: Option<&Caller>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder
            .header("x-user-id", caller.user_id.as_str())
            .header("x-user-name", caller.user_name.as_str())
            .header("x-user-role", caller.role.as_str());
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("request should build"),
        None => builder.body(Body::empty()).expect("request should build"),
    }
}

/// Send one request and decode the JSON body (`Value::Null` when empty).
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response<Body> = router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    if bytes.is_empty() {
        return (status, Value::Null);
    }
    let json = serde_json::from_slice(&bytes).unwrap_or_else(|_| {
        Value::String(String::from_utf8_lossy(&bytes).into_owned())
    });
    (status, json)
}
