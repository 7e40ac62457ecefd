//! Session actor mailbox messages.
//!
//! Every message carries a `oneshot` sender for the reply. Read-only queries
//! are not messages: they are served from the published snapshot.

use crate::errors::GvError;
use crate::session::{
    Caller, ControlOutcome, Event, EventOptions, EventType, LeaveOutcome, Participant,
    PlaybackAction, Poll, ReactionKind, Session, SessionUpdate,
};
use common::types::{EventId, PollId};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Reply channel for a message producing `T`.
pub type Reply<T> = oneshot::Sender<Result<T, GvError>>;

/// Messages handled by a `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// `caller_id`, when set, must be the current host.
    Update {
        update: SessionUpdate,
        caller_id: Option<String>,
        respond_to: Reply<Arc<Session>>,
    },
    Start {
        caller_id: String,
        respond_to: Reply<Arc<Session>>,
    },
    /// `caller_id`, when set, must be the current host.
    End {
        caller_id: Option<String>,
        respond_to: Reply<()>,
    },
    Join {
        caller: Caller,
        respond_to: Reply<Participant>,
    },
    Leave {
        user_id: String,
        respond_to: Reply<LeaveOutcome>,
    },
    RequestControl {
        user_id: String,
        respond_to: Reply<ControlOutcome>,
    },
    GrantControl {
        host_id: String,
        target_id: String,
        respond_to: Reply<Participant>,
    },
    RevokeControl {
        host_id: String,
        target_id: String,
        respond_to: Reply<Participant>,
    },
    PostEvent {
        author_id: String,
        event_type: EventType,
        content: String,
        options: EventOptions,
        respond_to: Reply<Event>,
    },
    AddReaction {
        event_id: EventId,
        user_id: String,
        kind: ReactionKind,
        respond_to: Reply<Event>,
    },
    RemoveReaction {
        event_id: EventId,
        user_id: String,
        kind: ReactionKind,
        respond_to: Reply<Event>,
    },
    IssueControl {
        user_id: String,
        action: PlaybackAction,
        value: Option<f64>,
        respond_to: Reply<Event>,
    },
    CreatePoll {
        creator_id: String,
        question: String,
        options: Vec<String>,
        poll_options: crate::session::PollOptions,
        respond_to: Reply<Poll>,
    },
    RespondToPoll {
        poll_id: PollId,
        user_id: String,
        user_name: String,
        selected: Vec<usize>,
        respond_to: Reply<Poll>,
    },
}

impl SessionMessage {
    /// Bounded name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            SessionMessage::Update { .. } => "update_session",
            SessionMessage::Start { .. } => "start_session",
            SessionMessage::End { .. } => "end_session",
            SessionMessage::Join { .. } => "join",
            SessionMessage::Leave { .. } => "leave",
            SessionMessage::RequestControl { .. } => "request_control",
            SessionMessage::GrantControl { .. } => "grant_control",
            SessionMessage::RevokeControl { .. } => "revoke_control",
            SessionMessage::PostEvent { .. } => "post_event",
            SessionMessage::AddReaction { .. } => "add_reaction",
            SessionMessage::RemoveReaction { .. } => "remove_reaction",
            SessionMessage::IssueControl { .. } => "issue_control",
            SessionMessage::CreatePoll { .. } => "create_poll",
            SessionMessage::RespondToPoll { .. } => "respond_to_poll",
        }
    }
}
