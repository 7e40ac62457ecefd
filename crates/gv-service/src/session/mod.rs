//! Session aggregate.
//!
//! A [`Session`] owns its participants, event log and polls. All mutation goes
//! through the methods in the submodules, each of which runs the lifecycle
//! gate first:
//!
//! - [`lifecycle`]: create, update, start, end
//! - [`registry`]: presence, host handoff, control requests and grants
//! - [`event_log`]: chat/question events and reactions
//! - [`playback`]: play/pause/seek/speed intents
//! - [`polling`]: poll creation, responses, results
//!
//! Methods are synchronous and take `now` explicitly. The owning
//! `SessionActor` serializes calls and decides when the result is committed.

pub mod event;
pub mod event_log;
pub mod filter;
pub mod lifecycle;
pub mod participant;
pub mod playback;
pub mod poll;
pub mod polling;
pub mod registry;

pub use event::{
    Event, EventOptions, EventPayload, EventType, PlaybackAction, ReactionKind,
};
pub use filter::SessionFilter;
pub use participant::{ControlOutcome, LeaveOutcome, Participant};
pub use poll::{OptionTally, Poll, PollOptions, PollResponse, PollResults};

use crate::errors::GvError;
use chrono::{DateTime, Duration, Utc};
use common::types::{EventId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Reserved author identity for coordinator-generated events.
pub const SYSTEM_USER_ID: &str = "system";
/// Display name of the reserved system author.
pub const SYSTEM_USER_NAME: &str = "System";

/// Role of a caller or participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// Instructors and admins receive the same defaults and control rights.
    #[must_use]
    pub const fn is_instructor_equivalent(&self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = GvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(GvError::InvalidRequest(format!("unknown role: {other}"))),
        }
    }
}

/// Verified identity of whoever is invoking an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            role,
        }
    }

    /// Callers may not act as the system author.
    pub fn ensure_not_reserved(&self) -> Result<(), GvError> {
        if self.user_id.eq_ignore_ascii_case(SYSTEM_USER_ID) {
            Err(GvError::NotAuthorized(format!(
                "user id '{}' is reserved",
                self.user_id
            )))
        } else {
            Ok(())
        }
    }
}

/// Session status. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Ended,
}

impl SessionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        }
    }
}

/// Toggleable session features, named in `FeatureDisabled` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Chat,
    Reactions,
    Questions,
    Polls,
    AnonymousPolls,
    ParticipantControl,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::Chat => "chat",
            Feature::Reactions => "reactions",
            Feature::Questions => "questions",
            Feature::Polls => "polls",
            Feature::AnonymousPolls => "anonymous_polls",
            Feature::ParticipantControl => "participant_control",
        };
        f.write_str(name)
    }
}

/// Per-session feature settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub allow_participant_control: bool,
    pub allow_chat: bool,
    pub allow_reactions: bool,
    pub allow_questions: bool,
    pub allow_polls: bool,
    pub allow_anonymous_polls: bool,
    pub require_hand_raise: bool,
    pub auto_accept_hand_raise: bool,
    pub show_participant_cursors: bool,
    pub show_participant_names: bool,
    pub record_session: bool,
    pub max_participants: Option<u32>,
    pub access_code: Option<String>,
    pub waiting_room: bool,
}

impl Settings {
    /// Defaults derived from the host's role.
    ///
    /// Instructor-equivalent hosts get a moderated room: participant control,
    /// polls, hand-raise, recording and a waiting room. Student-hosted rooms
    /// get the inverse, with hand-raises auto-accepted.
    #[must_use]
    pub fn for_host_role(role: Role) -> Self {
        let moderated = role.is_instructor_equivalent();
        Self {
            allow_participant_control: moderated,
            allow_chat: true,
            allow_reactions: true,
            allow_questions: true,
            allow_polls: moderated,
            allow_anonymous_polls: moderated,
            require_hand_raise: moderated,
            auto_accept_hand_raise: !moderated,
            show_participant_cursors: true,
            show_participant_names: true,
            record_session: moderated,
            max_participants: None,
            access_code: None,
            waiting_room: moderated,
        }
    }

    /// Apply explicit overrides on top of these settings.
    pub fn apply(&mut self, overrides: &SettingsOverrides) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = overrides.$field { self.$field = v; })*
            };
        }
        set!(
            allow_participant_control,
            allow_chat,
            allow_reactions,
            allow_questions,
            allow_polls,
            allow_anonymous_polls,
            require_hand_raise,
            auto_accept_hand_raise,
            show_participant_cursors,
            show_participant_names,
            record_session,
            waiting_room
        );
        if let Some(max) = overrides.max_participants {
            self.max_participants = max;
        }
        if let Some(code) = &overrides.access_code {
            self.access_code.clone_from(code);
        }
    }

    /// Whether the given event type is allowed for external authors.
    pub(crate) fn check_event_type(&self, event_type: EventType) -> Result<(), GvError> {
        let (enabled, feature) = match event_type {
            EventType::Chat => (self.allow_chat, Feature::Chat),
            EventType::Reaction => (self.allow_reactions, Feature::Reactions),
            EventType::Question => (self.allow_questions, Feature::Questions),
            EventType::Poll | EventType::PollResponse => (self.allow_polls, Feature::Polls),
            EventType::System | EventType::Control => return Ok(()),
        };
        if enabled {
            Ok(())
        } else {
            Err(GvError::FeatureDisabled(feature))
        }
    }
}

/// Explicit setting overrides; `None` keeps the current value.
///
/// The optional limits take `Some(None)` to clear them. On the wire an absent
/// field keeps the value and an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOverrides {
    pub allow_participant_control: Option<bool>,
    pub allow_chat: Option<bool>,
    pub allow_reactions: Option<bool>,
    pub allow_questions: Option<bool>,
    pub allow_polls: Option<bool>,
    pub allow_anonymous_polls: Option<bool>,
    pub require_hand_raise: Option<bool>,
    pub auto_accept_hand_raise: Option<bool>,
    pub show_participant_cursors: Option<bool>,
    pub show_participant_names: Option<bool>,
    pub record_session: Option<bool>,
    #[serde(
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_participants: Option<Option<u32>>,
    #[serde(
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_code: Option<Option<String>>,
    pub waiting_room: Option<bool>,
}

/// Distinguish an explicit `null` from an absent field (which `default` covers).
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Optional descriptive fields accepted at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateSessionOptions {
    pub description: Option<String>,
    pub course_id: Option<String>,
    pub group_id: Option<String>,
    pub tags: Vec<String>,
    /// Future start time; the session is `scheduled` until then.
    pub scheduled_start: Option<DateTime<Utc>>,
}

/// Partial update of a session's descriptive fields and settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub course_id: Option<String>,
    pub group_id: Option<String>,
    pub settings: Option<SettingsOverrides>,
}

/// A group viewing session and everything it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub video_id: String,
    pub description: Option<String>,
    pub course_id: Option<String>,
    pub group_id: Option<String>,
    pub tags: Vec<String>,
    pub host_id: String,
    pub host_name: String,
    pub host_role: Role,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub settings: Settings,
    pub participants: Vec<Participant>,
    /// Append-only log. Entries are shared, so copying the aggregate copies
    /// pointers and a reaction only clones the event it touches.
    pub events: Vec<Arc<Event>>,
    pub polls: Vec<Poll>,
    /// Sequence number of the last appended event (0 when the log is empty).
    pub last_sequence: u64,
}

impl Session {
    /// Lifecycle gate run before every mutation.
    pub fn ensure_open(&self) -> Result<(), GvError> {
        if self.status == SessionStatus::Ended {
            Err(GvError::SessionEnded)
        } else {
            Ok(())
        }
    }

    /// Copy for callers outside the owning actor. See [`Poll::into_public`].
    #[must_use]
    pub fn into_public(mut self) -> Self {
        self.polls = self.polls.into_iter().map(Poll::into_public).collect();
        self
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.status == SessionStatus::Ended
    }

    #[must_use]
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub(crate) fn participant_mut(&mut self, user_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }

    /// Like [`Session::participant_mut`] but reports an unknown identity.
    pub(crate) fn require_participant_mut(
        &mut self,
        user_id: &str,
    ) -> Result<&mut Participant, GvError> {
        self.participant_mut(user_id)
            .ok_or_else(|| GvError::ParticipantNotFound(user_id.to_string()))
    }

    /// Number of participants currently present.
    #[must_use]
    pub fn active_participant_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_active).count()
    }

    #[must_use]
    pub fn event(&self, event_id: &EventId) -> Option<&Event> {
        self.events
            .iter()
            .find(|e| &e.id == event_id)
            .map(|e| e.as_ref())
    }

    #[must_use]
    pub fn is_host(&self, user_id: &str) -> bool {
        self.host_id == user_id
    }

    /// Timestamp for the next event: `now`, bumped past the previous event's
    /// timestamp when the clock has not advanced.
    fn next_event_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.events.last() {
            Some(last) if now <= last.timestamp => last.timestamp + Duration::milliseconds(1),
            _ => now,
        }
    }

    /// Append an event to the log, assigning sequence, id and timestamp.
    pub(crate) fn append_event(&mut self, draft: event::EventDraft, now: DateTime<Utc>) -> Event {
        let timestamp = self.next_event_time(now);
        self.last_sequence += 1;
        let event = Event {
            id: EventId::new(),
            session_id: self.id,
            sequence: self.last_sequence,
            user_id: draft.user_id,
            user_name: draft.user_name,
            user_role: draft.user_role,
            event_type: draft.event_type,
            content: draft.content,
            timestamp,
            time_code: draft.time_code,
            reply_to: draft.reply_to,
            reactions: std::collections::BTreeMap::new(),
            payload: draft.payload,
        };
        self.events.push(Arc::new(event.clone()));
        event
    }

    /// Append a coordinator-authored system event. Bypasses feature toggles.
    pub(crate) fn append_system_event(
        &mut self,
        content: String,
        payload: Option<EventPayload>,
        now: DateTime<Utc>,
    ) {
        self.append_event(event::EventDraft::system(content, payload), now);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_support {
    use super::*;

    pub fn instructor() -> Caller {
        Caller::new("inst-1", "Dr. Rivera", Role::Instructor)
    }

    pub fn student(n: u32) -> Caller {
        Caller::new(format!("stu-{n}"), format!("Student {n}"), Role::Student)
    }

    pub fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    pub fn at(seconds: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(seconds)
    }

    /// Active instructor-hosted session created at `t0`.
    pub fn instructor_session() -> Session {
        Session::create(
            "Intro to Rust",
            "vid-42",
            &instructor(),
            &SettingsOverrides::default(),
            CreateSessionOptions::default(),
            t0(),
        )
        .unwrap()
    }

    /// Active student-hosted session created at `t0`.
    pub fn student_session() -> Session {
        Session::create(
            "Study group",
            "vid-7",
            &student(1),
            &SettingsOverrides::default(),
            CreateSessionOptions::default(),
            t0(),
        )
        .unwrap()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_role_defaults_for_instructor() {
        let s = Settings::for_host_role(Role::Instructor);
        assert!(s.allow_participant_control);
        assert!(s.allow_polls);
        assert!(s.allow_anonymous_polls);
        assert!(s.require_hand_raise);
        assert!(!s.auto_accept_hand_raise);
        assert!(s.record_session);
        assert!(s.waiting_room);
        assert!(s.allow_chat && s.allow_reactions && s.allow_questions);
    }

    #[test]
    fn test_admin_is_instructor_equivalent() {
        assert_eq!(
            Settings::for_host_role(Role::Admin),
            Settings::for_host_role(Role::Instructor)
        );
    }

    #[test]
    fn test_role_defaults_for_student() {
        let s = Settings::for_host_role(Role::Student);
        assert!(!s.allow_participant_control);
        assert!(!s.allow_polls);
        assert!(!s.require_hand_raise);
        assert!(s.auto_accept_hand_raise);
        assert!(!s.waiting_room);
        assert!(s.show_participant_names);
    }

    #[test]
    fn test_overrides_win_over_defaults() {
        let mut s = Settings::for_host_role(Role::Student);
        s.apply(&SettingsOverrides {
            allow_polls: Some(true),
            allow_chat: Some(false),
            max_participants: Some(Some(30)),
            ..Default::default()
        });
        assert!(s.allow_polls);
        assert!(!s.allow_chat);
        assert_eq!(s.max_participants, Some(30));
        // Untouched fields keep the role default
        assert!(s.auto_accept_hand_raise);
    }

    #[test]
    fn test_null_limits_clear_and_absent_limits_keep() {
        let mut s = Settings::for_host_role(Role::Instructor);
        s.apply(&SettingsOverrides {
            max_participants: Some(Some(10)),
            access_code: Some(Some("abc123".to_string())),
            ..Default::default()
        });

        let keep: SettingsOverrides = serde_json::from_str(r#"{"allow_chat": false}"#).unwrap();
        s.apply(&keep);
        assert_eq!(s.max_participants, Some(10));
        assert_eq!(s.access_code.as_deref(), Some("abc123"));

        let clear: SettingsOverrides =
            serde_json::from_str(r#"{"max_participants": null, "access_code": null}"#).unwrap();
        assert_eq!(clear.max_participants, Some(None));
        s.apply(&clear);
        assert_eq!(s.max_participants, None);
        assert_eq!(s.access_code, None);
    }

    #[test]
    fn test_system_identity_is_reserved() {
        assert!(student(1).ensure_not_reserved().is_ok());
        for id in ["system", "SYSTEM"] {
            let caller = Caller::new(id, "Impostor", Role::Admin);
            assert!(matches!(
                caller.ensure_not_reserved(),
                Err(GvError::NotAuthorized(_))
            ));
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Instructor".parse::<Role>().unwrap(), Role::Instructor);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("professor".parse::<Role>().is_err());
    }

    #[test]
    fn test_event_timestamps_strictly_increase_with_frozen_clock() {
        let mut session = instructor_session();
        session.append_system_event("a".to_string(), None, t0());
        session.append_system_event("b".to_string(), None, t0());

        let times: Vec<_> = session.events.iter().map(|e| e.timestamp).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        let seqs: Vec<_> = session.events.iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_session_roundtrips_through_json() {
        let mut session = instructor_session();
        session.join(&student(1), at(1)).unwrap();
        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }
}
