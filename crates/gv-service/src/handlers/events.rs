//! Event log handlers.
//!
//! - `POST /v1/sessions/{id}/events` - append a chat, question or reaction event
//! - `GET /v1/sessions/{id}/events?after=N` - replay events after a sequence
//! - `PUT /v1/sessions/{id}/events/{event_id}/reactions/{kind}` - add a reaction
//! - `DELETE /v1/sessions/{id}/events/{event_id}/reactions/{kind}` - remove it
//!
//! Event content is never logged.

use super::{parse_event_id, parse_reaction_kind, parse_session_id};
use crate::errors::GvError;
use crate::models::{EventsQuery, PostEventRequest};
use crate::routes::AppState;
use crate::session::{Caller, Event};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/sessions/{id}/events
///
/// # Response
///
/// - 201 Created: the appended event
/// - 403 Forbidden: feature disabled or caller not an active participant
/// - 410 Gone: session has ended
#[instrument(skip_all, name = "gv.handlers.post_event", fields(session_id = %id))]
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
    Json(request): Json<PostEventRequest>,
) -> Result<(StatusCode, Json<Event>), GvError> {
    let id = parse_session_id(&id)?;
    let event = state
        .coordinator
        .post_event(
            &id,
            &caller.user_id,
            request.event_type,
            &request.content,
            request.options,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Handler for GET /v1/sessions/{id}/events
#[instrument(skip_all, name = "gv.handlers.list_events", fields(session_id = %id))]
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, GvError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.coordinator.events_since(&id, query.after).await?))
}

/// Handler for PUT /v1/sessions/{id}/events/{event_id}/reactions/{kind}
///
/// Idempotent: reacting twice leaves a single reaction.
#[instrument(skip_all, name = "gv.handlers.add_reaction", fields(session_id = %id))]
pub async fn add_reaction(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((id, event_id, kind)): Path<(String, String, String)>,
) -> Result<Json<Event>, GvError> {
    let id = parse_session_id(&id)?;
    let event_id = parse_event_id(&event_id)?;
    let kind = parse_reaction_kind(&kind)?;

    let event = state
        .coordinator
        .add_reaction(&id, &event_id, &caller.user_id, kind)
        .await?;
    Ok(Json(event))
}

/// Handler for DELETE /v1/sessions/{id}/events/{event_id}/reactions/{kind}
///
/// Removing a reaction the caller never made is a no-op.
#[instrument(skip_all, name = "gv.handlers.remove_reaction", fields(session_id = %id))]
pub async fn remove_reaction(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((id, event_id, kind)): Path<(String, String, String)>,
) -> Result<Json<Event>, GvError> {
    let id = parse_session_id(&id)?;
    let event_id = parse_event_id(&event_id)?;
    let kind = parse_reaction_kind(&kind)?;

    let event = state
        .coordinator
        .remove_reaction(&id, &event_id, &caller.user_id, kind)
        .await?;
    Ok(Json(event))
}
