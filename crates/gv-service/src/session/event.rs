//! Event log entries.

use super::{Role, SYSTEM_USER_ID, SYSTEM_USER_NAME};
use common::types::{EventId, PollId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Kind of log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Chat,
    System,
    Control,
    Reaction,
    Question,
    Poll,
    PollResponse,
}

impl EventType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::Chat => "chat",
            EventType::System => "system",
            EventType::Control => "control",
            EventType::Reaction => "reaction",
            EventType::Question => "question",
            EventType::Poll => "poll",
            EventType::PollResponse => "poll_response",
        }
    }
}

/// Fixed set of emoji reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    ThumbsUp,
    ThumbsDown,
    Clap,
    Heart,
    Laugh,
    Confused,
    Lightbulb,
}

impl std::str::FromStr for ReactionKind {
    type Err = crate::errors::GvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbs_up" => Ok(ReactionKind::ThumbsUp),
            "thumbs_down" => Ok(ReactionKind::ThumbsDown),
            "clap" => Ok(ReactionKind::Clap),
            "heart" => Ok(ReactionKind::Heart),
            "laugh" => Ok(ReactionKind::Laugh),
            "confused" => Ok(ReactionKind::Confused),
            "lightbulb" => Ok(ReactionKind::Lightbulb),
            other => Err(crate::errors::GvError::InvalidRequest(format!(
                "unknown reaction kind: {other}"
            ))),
        }
    }
}

/// Playback intent carried by `control` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackAction {
    Play,
    Pause,
    Seek,
    SpeedChange,
}

impl PlaybackAction {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            PlaybackAction::Play => "play",
            PlaybackAction::Pause => "pause",
            PlaybackAction::Seek => "seek",
            PlaybackAction::SpeedChange => "speed_change",
        }
    }
}

/// Structured data attached to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    PollCreated {
        poll_id: PollId,
    },
    Control {
        action: PlaybackAction,
        value: Option<f64>,
    },
    HostChange {
        new_host_id: String,
    },
    /// Free-form data supplied by the author.
    Custom {
        data: serde_json::Value,
    },
}

/// One entry in a session's event log.
///
/// Immutable once appended except for `reactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub session_id: SessionId,
    /// Position in the session's log, starting at 1.
    pub sequence: u64,
    pub user_id: String,
    pub user_name: String,
    pub user_role: Role,
    pub event_type: EventType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Media position (seconds) the event refers to.
    pub time_code: Option<f64>,
    pub reply_to: Option<EventId>,
    #[serde(default)]
    pub reactions: BTreeMap<ReactionKind, BTreeSet<String>>,
    pub payload: Option<EventPayload>,
}

impl Event {
    /// Number of distinct users who reacted with `kind`.
    #[must_use]
    pub fn reaction_count(&self, kind: ReactionKind) -> usize {
        self.reactions.get(&kind).map_or(0, BTreeSet::len)
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.user_id == SYSTEM_USER_ID
    }
}

/// Optional fields for [`Session::post_event`](super::Session::post_event).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventOptions {
    pub time_code: Option<f64>,
    pub reply_to: Option<EventId>,
    pub data: Option<serde_json::Value>,
}

/// Event fields chosen by the caller of `append_event`; the session assigns
/// the rest.
pub(crate) struct EventDraft {
    pub user_id: String,
    pub user_name: String,
    pub user_role: Role,
    pub event_type: EventType,
    pub content: String,
    pub time_code: Option<f64>,
    pub reply_to: Option<EventId>,
    pub payload: Option<EventPayload>,
}

impl EventDraft {
    pub(crate) fn system(content: String, payload: Option<EventPayload>) -> Self {
        Self {
            user_id: SYSTEM_USER_ID.to_string(),
            user_name: SYSTEM_USER_NAME.to_string(),
            user_role: Role::Admin,
            event_type: EventType::System,
            content,
            time_code: None,
            reply_to: None,
            payload,
        }
    }
}
