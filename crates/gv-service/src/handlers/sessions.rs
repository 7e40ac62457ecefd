//! Session lifecycle handlers.
//!
//! - `POST /v1/sessions` - create a session hosted by the caller
//! - `GET /v1/sessions` - list sessions matching a query filter
//! - `GET /v1/sessions/{id}` - current session state
//! - `PATCH /v1/sessions/{id}` - update descriptive fields and settings (host only)
//! - `POST /v1/sessions/{id}/start` - start a scheduled session early (host only)
//! - `POST /v1/sessions/{id}/end` - end the session (host only)

use super::parse_session_id;
use crate::errors::GvError;
use crate::models::{CreateSessionRequest, ListSessionsQuery, UpdateSessionRequest};
use crate::routes::AppState;
use crate::session::{Caller, Session, SessionFilter};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Handler for POST /v1/sessions
///
/// # Response
///
/// - 201 Created: the new session
/// - 422 Unprocessable Entity: empty name or video id
/// - 503 Service Unavailable: store unavailable or draining
#[instrument(skip_all, name = "gv.handlers.create_session")]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Session>), GvError> {
    let session = state
        .coordinator
        .create_session(
            &request.name,
            &request.video_id,
            caller,
            request.settings,
            request.options,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Handler for GET /v1/sessions
#[instrument(skip_all, name = "gv.handlers.list_sessions")]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>, GvError> {
    let filter = SessionFilter::from(query);
    let sessions = state.coordinator.list_sessions(&filter).await?;
    Ok(Json(sessions))
}

/// Handler for GET /v1/sessions/{id}
#[instrument(skip_all, name = "gv.handlers.get_session", fields(session_id = %id))]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Session>, GvError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.coordinator.get_session(&id).await?))
}

/// Handler for PATCH /v1/sessions/{id}
///
/// # Response
///
/// - 200 OK: updated session
/// - 403 Forbidden: caller is not the host
/// - 410 Gone: session has ended
#[instrument(skip_all, name = "gv.handlers.update_session", fields(session_id = %id))]
pub async fn update_session(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(update): Json<UpdateSessionRequest>,
) -> Result<Json<Session>, GvError> {
    let id = parse_session_id(&id)?;
    let session = state
        .coordinator
        .update_session_as(&id, &caller.user_id, update)
        .await?;
    Ok(Json(session))
}

/// Handler for POST /v1/sessions/{id}/start
#[instrument(skip_all, name = "gv.handlers.start_session", fields(session_id = %id))]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Session>, GvError> {
    let id = parse_session_id(&id)?;
    let session = state
        .coordinator
        .start_session(&id, &caller.user_id)
        .await?;
    Ok(Json(session))
}

/// Handler for POST /v1/sessions/{id}/end
///
/// # Response
///
/// - 204 No Content: session ended
/// - 403 Forbidden: caller is not the host
/// - 410 Gone: session already ended
#[instrument(skip_all, name = "gv.handlers.end_session", fields(session_id = %id))]
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<StatusCode, GvError> {
    let id = parse_session_id(&id)?;
    state
        .coordinator
        .end_session_as(&id, &caller.user_id)
        .await?;

    info!(
        target: "gv.handlers",
        session_id = %id,
        user_id = %caller.user_id,
        "Session ended by host"
    );
    Ok(StatusCode::NO_CONTENT)
}
