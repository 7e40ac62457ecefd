//! HTTP request handlers for the group viewing service.
//!
//! Handlers resolve path parameters, pull the `Caller` placed in extensions
//! by the identity middleware, and delegate to the `Coordinator`. Malformed
//! ids are reported as not found rather than as a parse failure.

pub mod events;
pub mod metrics;
pub mod participants;
pub mod polls;
pub mod sessions;

pub use events::{add_reaction, list_events, post_event, remove_reaction};
pub use metrics::metrics_handler;
pub use participants::{
    grant_control, issue_control, join_session, leave_session, request_control, revoke_control,
};
pub use polls::{create_poll, poll_results, respond_to_poll};
pub use sessions::{
    create_session, end_session, get_session, list_sessions, start_session, update_session,
};

use crate::errors::GvError;
use crate::session::ReactionKind;
use common::types::{EventId, PollId, SessionId};

pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, GvError> {
    raw.parse()
        .map_err(|_| GvError::SessionNotFound(raw.to_string()))
}

pub(crate) fn parse_event_id(raw: &str) -> Result<EventId, GvError> {
    raw.parse().map_err(|_| GvError::EventNotFound(raw.to_string()))
}

pub(crate) fn parse_poll_id(raw: &str) -> Result<PollId, GvError> {
    raw.parse().map_err(|_| GvError::PollNotFound(raw.to_string()))
}

pub(crate) fn parse_reaction_kind(raw: &str) -> Result<ReactionKind, GvError> {
    raw.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_ids_map_to_not_found() {
        assert!(matches!(
            parse_session_id("not-a-uuid"),
            Err(GvError::SessionNotFound(_))
        ));
        assert!(matches!(parse_event_id("42"), Err(GvError::EventNotFound(_))));
        assert!(matches!(parse_poll_id(""), Err(GvError::PollNotFound(_))));
        assert!(matches!(
            parse_reaction_kind("shrug"),
            Err(GvError::InvalidRequest(_))
        ));
        assert!(parse_reaction_kind("lightbulb").is_ok());
    }
}
