//! Request and response bodies for the HTTP boundary.
//!
//! Domain types (`Session`, `Participant`, `Event`, `Poll`, ...) serialize
//! directly as responses; only inputs and small wrappers live here.

use crate::session::{
    ControlOutcome, CreateSessionOptions, EventOptions, EventType, PlaybackAction, PollOptions,
    SessionFilter, SessionStatus, SessionUpdate, SettingsOverrides,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on `limit` for session listings.
pub const MAX_LIST_LIMIT: usize = 200;

/// Body of `POST /v1/sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub video_id: String,
    #[serde(default)]
    pub settings: SettingsOverrides,
    #[serde(flatten)]
    pub options: CreateSessionOptions,
}

/// Body of `PATCH /v1/sessions/{id}`.
pub type UpdateSessionRequest = SessionUpdate;

/// Query of `GET /v1/sessions`.
///
/// `tags` is comma separated; `q` searches name and description.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListSessionsQuery {
    pub host_id: Option<String>,
    pub participant_id: Option<String>,
    pub video_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub course_id: Option<String>,
    pub group_id: Option<String>,
    pub start_after: Option<DateTime<Utc>>,
    pub start_before: Option<DateTime<Utc>>,
    pub q: Option<String>,
    pub tags: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl From<ListSessionsQuery> for SessionFilter {
    fn from(query: ListSessionsQuery) -> Self {
        let tags = query.tags.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });

        SessionFilter {
            host_id: query.host_id,
            participant_id: query.participant_id,
            video_id: query.video_id,
            status: query.status,
            course_id: query.course_id,
            group_id: query.group_id,
            start_after: query.start_after,
            start_before: query.start_before,
            search_text: query.q.filter(|q| !q.trim().is_empty()),
            tags: tags.filter(|t| !t.is_empty()),
            offset: query.offset,
            limit: Some(query.limit.unwrap_or(MAX_LIST_LIMIT).min(MAX_LIST_LIMIT)),
        }
    }
}

/// Body of the grant and revoke endpoints.
#[derive(Debug, Deserialize)]
pub struct ControlTargetRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlResponse {
    pub status: ControlOutcome,
}

/// Body of `POST /v1/sessions/{id}/playback`.
#[derive(Debug, Deserialize)]
pub struct PlaybackRequest {
    pub action: PlaybackAction,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Body of `POST /v1/sessions/{id}/events`.
#[derive(Debug, Deserialize)]
pub struct PostEventRequest {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub content: String,
    #[serde(flatten)]
    pub options: EventOptions,
}

/// Query of `GET /v1/sessions/{id}/events`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventsQuery {
    /// Return events with a sequence greater than this.
    pub after: u64,
}

/// Body of `POST /v1/sessions/{id}/polls`.
#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<String>,
    #[serde(flatten)]
    pub poll_options: PollOptions,
}

/// Body of `POST /v1/sessions/{id}/polls/{poll_id}/responses`.
#[derive(Debug, Deserialize)]
pub struct PollResponseRequest {
    pub selected: Vec<usize>,
}

/// Body of `GET /ready`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Session store reachability, when it was checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<&'static str>,

    /// Generic reason; infrastructure details stay in the logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
