//! Posting events and aggregating reactions.

use super::event::EventDraft;
use super::{Event, EventOptions, EventPayload, EventType, Feature, ReactionKind, Session};
use crate::errors::GvError;
use chrono::{DateTime, Utc};
use common::types::EventId;
use std::sync::Arc;

impl Session {
    /// Append a participant-authored event.
    ///
    /// `system` and `control` entries cannot be posted here; the former are
    /// coordinator-generated and the latter go through `issue_control`.
    pub fn post_event(
        &mut self,
        author_id: &str,
        event_type: EventType,
        content: &str,
        options: EventOptions,
        now: DateTime<Utc>,
    ) -> Result<Event, GvError> {
        self.ensure_open()?;
        self.settings.check_event_type(event_type)?;
        if matches!(event_type, EventType::System | EventType::Control) {
            return Err(GvError::NotAuthorized(format!(
                "{} events cannot be posted directly",
                event_type.as_str()
            )));
        }

        let author = self
            .participant(author_id)
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                GvError::NotAuthorized("only active participants can post".to_string())
            })?;
        let (user_name, user_role) = (author.user_name.clone(), author.role);

        if let Some(reply_to) = &options.reply_to {
            if self.event(reply_to).is_none() {
                return Err(GvError::EventNotFound(reply_to.to_string()));
            }
        }
        if content.trim().is_empty() {
            return Err(GvError::InvalidRequest("content must not be empty".to_string()));
        }

        let draft = EventDraft {
            user_id: author_id.to_string(),
            user_name,
            user_role,
            event_type,
            content: content.to_string(),
            time_code: options.time_code,
            reply_to: options.reply_to,
            payload: options.data.map(|data| EventPayload::Custom { data }),
        };
        let event = self.append_event(draft, now);
        if let Some(author) = self.participant_mut(author_id) {
            author.touch(now);
        }
        Ok(event)
    }

    fn event_mut(&mut self, event_id: &EventId) -> Result<&mut Event, GvError> {
        self.events
            .iter_mut()
            .find(|e| e.id == *event_id)
            .map(Arc::make_mut)
            .ok_or_else(|| GvError::EventNotFound(event_id.to_string()))
    }

    /// Add `user_id`'s reaction to an event. Repeating it changes nothing.
    pub fn add_reaction(
        &mut self,
        event_id: &EventId,
        user_id: &str,
        kind: ReactionKind,
        now: DateTime<Utc>,
    ) -> Result<Event, GvError> {
        self.ensure_open()?;
        if !self.settings.allow_reactions {
            return Err(GvError::FeatureDisabled(Feature::Reactions));
        }

        let event = self.event_mut(event_id)?;
        event
            .reactions
            .entry(kind)
            .or_default()
            .insert(user_id.to_string());
        let event = event.clone();

        if let Some(participant) = self.participant_mut(user_id) {
            participant.touch(now);
        }
        Ok(event)
    }

    /// Remove `user_id`'s reaction. Absent reactions are a no-op; empty
    /// reaction sets are dropped.
    pub fn remove_reaction(
        &mut self,
        event_id: &EventId,
        user_id: &str,
        kind: ReactionKind,
        now: DateTime<Utc>,
    ) -> Result<Event, GvError> {
        self.ensure_open()?;

        let event = self.event_mut(event_id)?;
        if let Some(users) = event.reactions.get_mut(&kind) {
            users.remove(user_id);
            if users.is_empty() {
                event.reactions.remove(&kind);
            }
        }
        let event = event.clone();

        if let Some(participant) = self.participant_mut(user_id) {
            participant.touch(now);
        }
        Ok(event)
    }

    /// Events with a sequence greater than `after_sequence`, in log order.
    #[must_use]
    pub fn events_since(&self, after_sequence: u64) -> Vec<Event> {
        // Sequences are dense from 1, so the cursor is also a slice offset.
        let start = usize::try_from(after_sequence).unwrap_or(usize::MAX);
        self.events
            .iter()
            .skip(start)
            .map(|e| Event::clone(e))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::session::test_support::*;
    use crate::session::{CreateSessionOptions, SettingsOverrides};

    fn chat(session: &mut Session, author: &str, text: &str, at_s: i64) -> Result<Event, GvError> {
        session.post_event(author, EventType::Chat, text, EventOptions::default(), at(at_s))
    }

    #[test]
    fn test_post_chat_assigns_sequence_and_author() {
        let mut session = instructor_session();
        session.join(&student(1), at(1)).unwrap();

        let event = chat(&mut session, "stu-1", "hello", 2).unwrap();
        assert_eq!(event.sequence, 3);
        assert_eq!(event.user_name, "Student 1");
        assert_eq!(event.event_type, EventType::Chat);
        assert_eq!(session.participant("stu-1").unwrap().last_activity, at(2));
    }

    #[test]
    fn test_post_rejects_privileged_types() {
        let mut session = instructor_session();
        for event_type in [EventType::System, EventType::Control] {
            let err = session
                .post_event("inst-1", event_type, "x", EventOptions::default(), at(1))
                .unwrap_err();
            assert!(matches!(err, GvError::NotAuthorized(_)));
        }
    }

    #[test]
    fn test_post_rejects_disabled_types() {
        let mut session = Session::create(
            "Quiet",
            "vid",
            &instructor(),
            &SettingsOverrides {
                allow_chat: Some(false),
                allow_questions: Some(false),
                ..Default::default()
            },
            CreateSessionOptions::default(),
            t0(),
        )
        .unwrap();

        assert!(matches!(
            chat(&mut session, "inst-1", "hi", 1),
            Err(GvError::FeatureDisabled(Feature::Chat))
        ));
        assert!(matches!(
            session.post_event("inst-1", EventType::Question, "why?", EventOptions::default(), at(1)),
            Err(GvError::FeatureDisabled(Feature::Questions))
        ));
    }

    #[test]
    fn test_post_requires_active_participant() {
        let mut session = instructor_session();
        assert!(matches!(
            chat(&mut session, "stranger", "hi", 1),
            Err(GvError::NotAuthorized(_))
        ));

        session.join(&student(1), at(1)).unwrap();
        session.leave("stu-1", at(2)).unwrap();
        assert!(matches!(
            chat(&mut session, "stu-1", "hi", 3),
            Err(GvError::NotAuthorized(_))
        ));
    }

    #[test]
    fn test_post_validates_reply_and_content() {
        let mut session = instructor_session();
        let err = session
            .post_event(
                "inst-1",
                EventType::Chat,
                "re",
                EventOptions {
                    reply_to: Some(EventId::new()),
                    ..Default::default()
                },
                at(1),
            )
            .unwrap_err();
        assert!(matches!(err, GvError::EventNotFound(_)));

        assert!(matches!(
            chat(&mut session, "inst-1", "   ", 1),
            Err(GvError::InvalidRequest(_))
        ));

        let first = chat(&mut session, "inst-1", "question?", 2).unwrap();
        let reply = session
            .post_event(
                "inst-1",
                EventType::Chat,
                "answer",
                EventOptions {
                    reply_to: Some(first.id),
                    time_code: Some(12.5),
                    data: Some(serde_json::json!({"pinned": true})),
                },
                at(3),
            )
            .unwrap();
        assert_eq!(reply.reply_to, Some(first.id));
        assert_eq!(reply.time_code, Some(12.5));
        assert!(matches!(reply.payload, Some(EventPayload::Custom { .. })));
    }

    #[test]
    fn test_reactions_are_sets() {
        let mut session = instructor_session();
        let event = chat(&mut session, "inst-1", "nice", 1).unwrap();

        session.add_reaction(&event.id, "u1", ReactionKind::Heart, at(2)).unwrap();
        let updated = session.add_reaction(&event.id, "u1", ReactionKind::Heart, at(3)).unwrap();
        assert_eq!(updated.reaction_count(ReactionKind::Heart), 1);

        // Removing an absent reaction is a no-op
        let unchanged = session
            .remove_reaction(&event.id, "u2", ReactionKind::Heart, at(4))
            .unwrap();
        assert_eq!(unchanged.reaction_count(ReactionKind::Heart), 1);

        let cleared = session
            .remove_reaction(&event.id, "u1", ReactionKind::Heart, at(5))
            .unwrap();
        assert!(cleared.reactions.is_empty());
    }

    #[test]
    fn test_reactions_disabled_and_unknown_event() {
        let mut session = Session::create(
            "No emoji",
            "vid",
            &instructor(),
            &SettingsOverrides {
                allow_reactions: Some(false),
                ..Default::default()
            },
            CreateSessionOptions::default(),
            t0(),
        )
        .unwrap();
        let first = session.events[0].id;

        assert!(matches!(
            session.add_reaction(&first, "u1", ReactionKind::Clap, at(1)),
            Err(GvError::FeatureDisabled(Feature::Reactions))
        ));
        // Removal is not gated by the toggle
        session.remove_reaction(&first, "u1", ReactionKind::Clap, at(1)).unwrap();

        assert!(matches!(
            session.remove_reaction(&EventId::new(), "u1", ReactionKind::Clap, at(1)),
            Err(GvError::EventNotFound(_))
        ));
    }

    #[test]
    fn test_events_since_cursor() {
        let mut session = instructor_session();
        chat(&mut session, "inst-1", "one", 1).unwrap();
        chat(&mut session, "inst-1", "two", 2).unwrap();

        let all = session.events_since(0);
        assert_eq!(all.len(), 3);
        let tail = session.events_since(2);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].content, "two");
        assert!(session.events_since(99).is_empty());
    }

    #[test]
    fn test_log_order_matches_timestamp_then_sequence() {
        let mut session = instructor_session();
        chat(&mut session, "inst-1", "a", 0).unwrap();
        chat(&mut session, "inst-1", "b", 0).unwrap();
        chat(&mut session, "inst-1", "c", -5).unwrap();

        let mut sorted = session.events.clone();
        sorted.sort_by(|a, b| (a.timestamp, a.sequence).cmp(&(b.timestamp, b.sequence)));
        assert_eq!(sorted, session.events);
    }
}
