//! Poll handlers.

use super::{parse_poll_id, parse_session_id};
use crate::errors::GvError;
use crate::models::{CreatePollRequest, PollResponseRequest};
use crate::routes::AppState;
use crate::session::{Caller, Poll, PollResults};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/sessions/{id}/polls
#[instrument(skip_all, name = "gv.handlers.create_poll", fields(session_id = %id))]
pub async fn create_poll(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<CreatePollRequest>,
) -> Result<(StatusCode, Json<Poll>), GvError> {
    let id = parse_session_id(&id)?;
    let poll = state
        .coordinator
        .create_poll(
            &id,
            &caller.user_id,
            &request.question,
            request.options,
            request.poll_options,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(poll)))
}

/// Handler for POST /v1/sessions/{id}/polls/{poll_id}/responses
///
/// A second response from the same caller replaces the first.
///
/// # Response
///
/// - 200 OK: results including the caller's response
/// - 409 Conflict: poll has expired
/// - 422 Unprocessable Entity: invalid option selection
#[instrument(skip_all, name = "gv.handlers.respond_to_poll", fields(session_id = %id))]
pub async fn respond_to_poll(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((id, poll_id)): Path<(String, String)>,
    Json(request): Json<PollResponseRequest>,
) -> Result<Json<PollResults>, GvError> {
    let id = parse_session_id(&id)?;
    let poll_id = parse_poll_id(&poll_id)?;

    let results = state
        .coordinator
        .respond_to_poll(
            &id,
            &poll_id,
            &caller.user_id,
            &caller.user_name,
            request.selected,
        )
        .await?;
    Ok(Json(results))
}

/// Handler for GET /v1/sessions/{id}/polls/{poll_id}/results
#[instrument(skip_all, name = "gv.handlers.poll_results", fields(session_id = %id))]
pub async fn poll_results(
    State(state): State<Arc<AppState>>,
    Path((id, poll_id)): Path<(String, String)>,
) -> Result<Json<PollResults>, GvError> {
    let id = parse_session_id(&id)?;
    let poll_id = parse_poll_id(&poll_id)?;
    Ok(Json(state.coordinator.poll_results(&id, &poll_id).await?))
}
