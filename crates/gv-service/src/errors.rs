//! Group viewing error types.
//!
//! Every coordinator operation returns `Result<_, GvError>`. Domain rejections
//! (`SessionEnded`, `FeatureDisabled`, ...) are permanent for the given input;
//! only `Store`, `Internal` and `Draining` are worth retrying.
//!
//! Errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! returned to clients never contain store or channel details; those are
//! logged server-side.

use crate::session::Feature;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Group viewing error type.
///
/// Maps to HTTP status codes:
/// - not-found kinds: 404
/// - `SessionEnded`: 410
/// - `FeatureDisabled`, `NotAuthorized`: 403
/// - `InvalidPollOption`, `InvalidRequest`: 422
/// - `PollExpired`, `Conflict`: 409
/// - `CapacityExceeded`: 429
/// - `Store`, `Draining`: 503
/// - `Internal`: 500
#[derive(Debug, Error)]
pub enum GvError {
    /// Operation referenced an unknown session id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Mutation attempted after the session reached `ended`.
    #[error("Session has ended")]
    SessionEnded,

    /// The session settings disable the requested feature.
    #[error("Feature disabled: {0}")]
    FeatureDisabled(Feature),

    /// Caller lacks the authority for this operation.
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Option index out of range, empty selection, or several indices on a
    /// single-select poll.
    #[error("Invalid poll option: {0}")]
    InvalidPollOption(String),

    /// Poll response submitted after the poll's expiry.
    #[error("Poll has expired")]
    PollExpired,

    /// Referenced event does not exist in the session.
    #[error("Event not found: {0}")]
    EventNotFound(String),

    /// Referenced poll does not exist in the session.
    #[error("Poll not found: {0}")]
    PollNotFound(String),

    /// Referenced participant does not exist in the session.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Malformed input (empty name, too few poll options, missing seek value).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Request conflicts with current state (e.g. leaving twice).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Session is at its participant cap.
    #[error("Session at capacity: {0}")]
    CapacityExceeded(u32),

    /// Coordinator is shutting down.
    #[error("Coordinator is draining")]
    Draining,

    /// Session store failed; state was not changed.
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error with context (actor channel failures).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GvError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GvError::SessionNotFound(_)
            | GvError::EventNotFound(_)
            | GvError::PollNotFound(_)
            | GvError::ParticipantNotFound(_) => StatusCode::NOT_FOUND,
            GvError::SessionEnded => StatusCode::GONE,
            GvError::FeatureDisabled(_) | GvError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            GvError::InvalidPollOption(_) | GvError::InvalidRequest(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            GvError::PollExpired | GvError::Conflict(_) => StatusCode::CONFLICT,
            GvError::CapacityExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            GvError::Store(_) | GvError::Draining => StatusCode::SERVICE_UNAVAILABLE,
            GvError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller may retry the same request.
    ///
    /// Domain rejections are permanent for the given input; infrastructure
    /// failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GvError::Store(_) | GvError::Internal(_) | GvError::Draining
        )
    }

    /// Returns a bounded label string for the error variant (for metrics).
    ///
    /// Uses variant names, not message content.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            GvError::SessionNotFound(_) => "session_not_found",
            GvError::SessionEnded => "session_ended",
            GvError::FeatureDisabled(_) => "feature_disabled",
            GvError::NotAuthorized(_) => "not_authorized",
            GvError::InvalidPollOption(_) => "invalid_poll_option",
            GvError::PollExpired => "poll_expired",
            GvError::EventNotFound(_) => "event_not_found",
            GvError::PollNotFound(_) => "poll_not_found",
            GvError::ParticipantNotFound(_) => "participant_not_found",
            GvError::InvalidRequest(_) => "invalid_request",
            GvError::Conflict(_) => "conflict",
            GvError::CapacityExceeded(_) => "capacity_exceeded",
            GvError::Draining => "draining",
            GvError::Store(_) => "store",
            GvError::Internal(_) => "internal",
        }
    }

    /// Returns a stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            GvError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            GvError::SessionEnded => "SESSION_ENDED",
            GvError::FeatureDisabled(_) => "FEATURE_DISABLED",
            GvError::NotAuthorized(_) => "NOT_AUTHORIZED",
            GvError::InvalidPollOption(_) => "INVALID_POLL_OPTION",
            GvError::PollExpired => "POLL_EXPIRED",
            GvError::EventNotFound(_) | GvError::PollNotFound(_) | GvError::ParticipantNotFound(_) => {
                "NOT_FOUND"
            }
            GvError::InvalidRequest(_) => "INVALID_REQUEST",
            GvError::Conflict(_) => "CONFLICT",
            GvError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            GvError::Draining => "DRAINING",
            GvError::Store(_) => "STORE_UNAVAILABLE",
            GvError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns a client-safe error message (no internal details).
    pub fn client_message(&self) -> String {
        match self {
            GvError::Store(_) => "Session storage is temporarily unavailable".to_string(),
            GvError::Internal(_) => "An internal error occurred".to_string(),
            GvError::Draining => "Server is shutting down, please retry".to_string(),
            GvError::SessionNotFound(_) => "Session not found".to_string(),
            GvError::EventNotFound(_) => "Event not found".to_string(),
            GvError::PollNotFound(_) => "Poll not found".to_string(),
            GvError::ParticipantNotFound(_) => "Participant not found".to_string(),
            GvError::SessionEnded
            | GvError::FeatureDisabled(_)
            | GvError::PollExpired
            | GvError::CapacityExceeded(_) => self.to_string(),
            GvError::NotAuthorized(msg)
            | GvError::InvalidPollOption(msg)
            | GvError::InvalidRequest(msg)
            | GvError::Conflict(msg) => msg.clone(),
        }
    }
}

impl From<StoreError> for GvError {
    fn from(err: StoreError) -> Self {
        GvError::Store(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for GvError {
    fn into_response(self) -> Response {
        match &self {
            GvError::Store(err) => {
                tracing::error!(target: "gv.store", error = %err, "Session store operation failed");
            }
            GvError::Internal(err) => {
                tracing::error!(target: "gv.internal", error = %err, "Internal error");
            }
            _ => {}
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.client_message(),
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}
