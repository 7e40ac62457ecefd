//! Session creation, update, start and end.

use super::{
    Caller, CreateSessionOptions, Participant, Session, SessionStatus, SessionUpdate, Settings,
    SettingsOverrides,
};
use crate::errors::GvError;
use chrono::{DateTime, Utc};
use common::types::SessionId;

fn require_non_empty(value: &str, field: &str) -> Result<(), GvError> {
    if value.trim().is_empty() {
        Err(GvError::InvalidRequest(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

impl Session {
    /// Create a session hosted by `host`.
    ///
    /// The host is enrolled with control and a "created the session" system
    /// event opens the log. The session starts `scheduled` when
    /// `options.scheduled_start` lies in the future, `active` otherwise.
    pub fn create(
        name: &str,
        video_id: &str,
        host: &Caller,
        overrides: &SettingsOverrides,
        options: CreateSessionOptions,
        now: DateTime<Utc>,
    ) -> Result<Session, GvError> {
        host.ensure_not_reserved()?;
        require_non_empty(name, "name")?;
        require_non_empty(video_id, "video_id")?;

        let mut settings = Settings::for_host_role(host.role);
        settings.apply(overrides);

        let (status, start_time) = match options.scheduled_start {
            Some(start) if start > now => (SessionStatus::Scheduled, start),
            _ => (SessionStatus::Active, now),
        };

        let mut session = Session {
            id: SessionId::new(),
            name: name.to_string(),
            video_id: video_id.to_string(),
            description: options.description,
            course_id: options.course_id,
            group_id: options.group_id,
            tags: options.tags,
            host_id: host.user_id.clone(),
            host_name: host.user_name.clone(),
            host_role: host.role,
            status,
            start_time,
            created_at: now,
            end_time: None,
            settings,
            participants: vec![Participant::new(host, true, now)],
            events: Vec::new(),
            polls: Vec::new(),
            last_sequence: 0,
        };
        session.append_system_event(format!("{} created the session", host.user_name), None, now);
        Ok(session)
    }

    /// Promote a scheduled session whose start time has passed.
    ///
    /// Returns true if the status changed.
    pub fn promote_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == SessionStatus::Scheduled && self.start_time <= now {
            self.status = SessionStatus::Active;
            true
        } else {
            false
        }
    }

    /// Update descriptive fields and settings.
    pub fn update(&mut self, update: SessionUpdate) -> Result<(), GvError> {
        self.ensure_open()?;

        if let Some(name) = update.name {
            require_non_empty(&name, "name")?;
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        if let Some(course_id) = update.course_id {
            self.course_id = Some(course_id);
        }
        if let Some(group_id) = update.group_id {
            self.group_id = Some(group_id);
        }
        if let Some(overrides) = update.settings {
            self.settings.apply(&overrides);
        }
        Ok(())
    }

    /// Gate for host-only operations: the session must be open and
    /// `caller_id` must be its current host.
    pub fn ensure_host(&self, caller_id: &str, action: &str) -> Result<(), GvError> {
        self.ensure_open()?;
        if self.is_host(caller_id) {
            Ok(())
        } else {
            Err(GvError::NotAuthorized(format!(
                "only the host can {action} the session"
            )))
        }
    }

    /// Activate a scheduled session ahead of its start time. Host only.
    ///
    /// Starting an already active session succeeds without change.
    pub fn start(&mut self, caller_id: &str, now: DateTime<Utc>) -> Result<(), GvError> {
        self.ensure_host(caller_id, "start")?;
        if self.status == SessionStatus::Scheduled {
            self.status = SessionStatus::Active;
            self.start_time = now;
        }
        Ok(())
    }

    /// End the session. Deactivates every participant and stamps `end_time`.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<(), GvError> {
        self.ensure_open()?;

        self.status = SessionStatus::Ended;
        self.end_time = Some(now);
        for participant in &mut self.participants {
            participant.deactivate(now);
        }
        self.append_system_event("Session ended".to_string(), None, now);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::session::test_support::*;
    use crate::session::EventType;

    #[test]
    fn test_create_enrolls_host_with_control() {
        let session = instructor_session();

        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.host_id, "inst-1");
        assert_eq!(session.participants.len(), 1);
        assert!(session.participants[0].has_control);
        assert!(session.participants[0].is_active);

        assert_eq!(session.events.len(), 1);
        assert_eq!(session.events[0].event_type, EventType::System);
        assert_eq!(session.events[0].content, "Dr. Rivera created the session");
        assert_eq!(session.events[0].user_id, "system");
    }

    #[test]
    fn test_create_rejects_empty_name_or_video() {
        let err = Session::create(
            "  ",
            "vid",
            &instructor(),
            &SettingsOverrides::default(),
            CreateSessionOptions::default(),
            t0(),
        )
        .unwrap_err();
        assert!(matches!(err, GvError::InvalidRequest(_)));

        let err = Session::create(
            "Name",
            "",
            &instructor(),
            &SettingsOverrides::default(),
            CreateSessionOptions::default(),
            t0(),
        )
        .unwrap_err();
        assert!(matches!(err, GvError::InvalidRequest(_)));
    }

    #[test]
    fn test_future_start_is_scheduled() {
        let session = Session::create(
            "Later",
            "vid",
            &instructor(),
            &SettingsOverrides::default(),
            CreateSessionOptions {
                scheduled_start: Some(at(3600)),
                ..Default::default()
            },
            t0(),
        )
        .unwrap();
        assert_eq!(session.status, SessionStatus::Scheduled);
        assert_eq!(session.start_time, at(3600));

        let past = Session::create(
            "Already",
            "vid",
            &instructor(),
            &SettingsOverrides::default(),
            CreateSessionOptions {
                scheduled_start: Some(at(-60)),
                ..Default::default()
            },
            t0(),
        )
        .unwrap();
        assert_eq!(past.status, SessionStatus::Active);
    }

    #[test]
    fn test_promote_if_due() {
        let mut session = Session::create(
            "Later",
            "vid",
            &instructor(),
            &SettingsOverrides::default(),
            CreateSessionOptions {
                scheduled_start: Some(at(60)),
                ..Default::default()
            },
            t0(),
        )
        .unwrap();

        assert!(!session.promote_if_due(at(59)));
        assert_eq!(session.status, SessionStatus::Scheduled);
        assert!(session.promote_if_due(at(60)));
        assert_eq!(session.status, SessionStatus::Active);
        assert!(!session.promote_if_due(at(61)));
    }

    #[test]
    fn test_start_is_host_only() {
        let mut session = Session::create(
            "Later",
            "vid",
            &instructor(),
            &SettingsOverrides::default(),
            CreateSessionOptions {
                scheduled_start: Some(at(3600)),
                ..Default::default()
            },
            t0(),
        )
        .unwrap();

        let err = session.start("stu-1", at(1)).unwrap_err();
        assert!(matches!(err, GvError::NotAuthorized(_)));

        session.start("inst-1", at(2)).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.start_time, at(2));

        // Idempotent once active
        session.start("inst-1", at(3)).unwrap();
        assert_eq!(session.start_time, at(2));
    }

    #[test]
    fn test_end_deactivates_everyone_and_is_final() {
        let mut session = instructor_session();
        session.join(&student(1), at(1)).unwrap();
        session.leave("stu-1", at(2)).unwrap();
        session.join(&student(2), at(3)).unwrap();

        session.end(at(10)).unwrap();

        assert_eq!(session.status, SessionStatus::Ended);
        assert_eq!(session.end_time, Some(at(10)));
        assert!(session.participants.iter().all(|p| !p.is_active));
        // Earlier leave time is preserved
        assert_eq!(session.participant("stu-1").unwrap().leave_time, Some(at(2)));
        assert_eq!(session.participant("stu-2").unwrap().leave_time, Some(at(10)));
        assert_eq!(session.events.last().unwrap().content, "Session ended");

        let events_before = session.events.len();
        assert!(matches!(session.end(at(11)), Err(GvError::SessionEnded)));
        assert_eq!(session.events.len(), events_before);
        assert_eq!(session.end_time, Some(at(10)));
    }

    #[test]
    fn test_update_changes_fields_and_settings() {
        let mut session = instructor_session();
        session
            .update(SessionUpdate {
                name: Some("Renamed".to_string()),
                tags: Some(vec!["rust".to_string()]),
                settings: Some(SettingsOverrides {
                    allow_chat: Some(false),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(session.name, "Renamed");
        assert_eq!(session.tags, vec!["rust"]);
        assert!(!session.settings.allow_chat);
    }

    #[test]
    fn test_ensure_host_follows_handoff() {
        let mut session = instructor_session();
        session.join(&student(1), at(1)).unwrap();
        assert!(session.ensure_host("inst-1", "end").is_ok());

        session.leave("inst-1", at(2)).unwrap();
        let err = session.ensure_host("inst-1", "end").unwrap_err();
        assert!(matches!(err, GvError::NotAuthorized(_)));
        assert!(session.ensure_host("stu-1", "end").is_ok());

        session.end(at(3)).unwrap();
        assert!(matches!(
            session.ensure_host("stu-1", "end"),
            Err(GvError::SessionEnded)
        ));
    }

    #[test]
    fn test_update_rejected_after_end() {
        let mut session = instructor_session();
        session.end(at(1)).unwrap();
        let err = session
            .update(SessionUpdate {
                name: Some("Too late".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, GvError::SessionEnded));
        assert_eq!(session.name, "Intro to Rust");
    }
}
