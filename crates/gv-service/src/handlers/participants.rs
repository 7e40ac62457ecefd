//! Participant and playback control handlers.
//!
//! - `POST /v1/sessions/{id}/participants` - join (or rejoin) as the caller
//! - `DELETE /v1/sessions/{id}/participants/me` - leave
//! - `POST /v1/sessions/{id}/control/request` - request playback control
//! - `POST /v1/sessions/{id}/control/grant` - host grants control
//! - `POST /v1/sessions/{id}/control/revoke` - host revokes control
//! - `POST /v1/sessions/{id}/playback` - issue a playback intent

use super::parse_session_id;
use crate::errors::GvError;
use crate::models::{ControlResponse, ControlTargetRequest, PlaybackRequest};
use crate::routes::AppState;
use crate::session::{Caller, Event, LeaveOutcome, Participant};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/sessions/{id}/participants
///
/// # Response
///
/// - 200 OK: the caller's participant entry
/// - 410 Gone: session has ended
/// - 429 Too Many Requests: session at capacity
#[instrument(skip_all, name = "gv.handlers.join", fields(session_id = %id))]
pub async fn join_session(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Participant>, GvError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.coordinator.join(&id, caller).await?))
}

/// Handler for DELETE /v1/sessions/{id}/participants/me
#[instrument(skip_all, name = "gv.handlers.leave", fields(session_id = %id))]
pub async fn leave_session(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<LeaveOutcome>, GvError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.coordinator.leave(&id, &caller.user_id).await?))
}

/// Handler for POST /v1/sessions/{id}/control/request
#[instrument(skip_all, name = "gv.handlers.request_control", fields(session_id = %id))]
pub async fn request_control(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<ControlResponse>, GvError> {
    let id = parse_session_id(&id)?;
    let status = state
        .coordinator
        .request_control(&id, &caller.user_id)
        .await?;
    Ok(Json(ControlResponse { status }))
}

/// Handler for POST /v1/sessions/{id}/control/grant
#[instrument(skip_all, name = "gv.handlers.grant_control", fields(session_id = %id))]
pub async fn grant_control(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<ControlTargetRequest>,
) -> Result<Json<Participant>, GvError> {
    let id = parse_session_id(&id)?;
    let participant = state
        .coordinator
        .grant_control(&id, &caller.user_id, &request.user_id)
        .await?;
    Ok(Json(participant))
}

/// Handler for POST /v1/sessions/{id}/control/revoke
#[instrument(skip_all, name = "gv.handlers.revoke_control", fields(session_id = %id))]
pub async fn revoke_control(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<ControlTargetRequest>,
) -> Result<Json<Participant>, GvError> {
    let id = parse_session_id(&id)?;
    let participant = state
        .coordinator
        .revoke_control(&id, &caller.user_id, &request.user_id)
        .await?;
    Ok(Json(participant))
}

/// Handler for POST /v1/sessions/{id}/playback
///
/// # Response
///
/// - 200 OK: the recorded `control` event
/// - 403 Forbidden: caller does not hold control
/// - 422 Unprocessable Entity: seek or speed change without a valid value
#[instrument(skip_all, name = "gv.handlers.issue_control", fields(session_id = %id))]
pub async fn issue_control(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<PlaybackRequest>,
) -> Result<Json<Event>, GvError> {
    let id = parse_session_id(&id)?;
    let event = state
        .coordinator
        .issue_control(&id, &caller.user_id, request.action, request.value)
        .await?;
    Ok(Json(event))
}
