//! Poll creation and responses.

use super::{EventPayload, Feature, Poll, PollOptions, PollResponse, PollResults, Session};
use crate::errors::GvError;
use chrono::{DateTime, Utc};
use common::types::PollId;

impl Session {
    /// Open a poll and announce it in the event log.
    pub fn create_poll(
        &mut self,
        creator_id: &str,
        question: &str,
        options: Vec<String>,
        poll_options: PollOptions,
        now: DateTime<Utc>,
    ) -> Result<Poll, GvError> {
        self.ensure_open()?;
        if !self.settings.allow_polls {
            return Err(GvError::FeatureDisabled(Feature::Polls));
        }
        if poll_options.is_anonymous && !self.settings.allow_anonymous_polls {
            return Err(GvError::FeatureDisabled(Feature::AnonymousPolls));
        }
        let creator_name = self
            .participant(creator_id)
            .filter(|p| p.is_active)
            .map(|p| p.user_name.clone())
            .ok_or_else(|| {
                GvError::NotAuthorized("only participants can create polls".to_string())
            })?;
        if question.trim().is_empty() {
            return Err(GvError::InvalidRequest("question must not be empty".to_string()));
        }
        if options.len() < 2 {
            return Err(GvError::InvalidRequest(
                "a poll needs at least two options".to_string(),
            ));
        }
        if options.iter().any(|o| o.trim().is_empty()) {
            return Err(GvError::InvalidRequest(
                "poll options must not be empty".to_string(),
            ));
        }

        let poll = Poll {
            id: PollId::new(),
            session_id: self.id,
            creator_id: creator_id.to_string(),
            question: question.to_string(),
            options,
            created: now,
            expires: poll_options.expires,
            is_anonymous: poll_options.is_anonymous,
            is_multi_select: poll_options.is_multi_select,
            responses: Vec::new(),
        };
        self.polls.push(poll.clone());
        self.append_system_event(
            format!("{creator_name} created a poll: {question}"),
            Some(EventPayload::PollCreated { poll_id: poll.id }),
            now,
        );
        if let Some(creator) = self.participant_mut(creator_id) {
            creator.touch(now);
        }
        Ok(poll)
    }

    fn poll(&self, poll_id: &PollId) -> Result<&Poll, GvError> {
        self.polls
            .iter()
            .find(|p| &p.id == poll_id)
            .ok_or_else(|| GvError::PollNotFound(poll_id.to_string()))
    }

    /// Record an answer, replacing any earlier answer from the same identity.
    pub fn respond_to_poll(
        &mut self,
        poll_id: &PollId,
        user_id: &str,
        user_name: &str,
        selected: &[usize],
        now: DateTime<Utc>,
    ) -> Result<Poll, GvError> {
        self.ensure_open()?;

        let poll = self
            .polls
            .iter_mut()
            .find(|p| &p.id == poll_id)
            .ok_or_else(|| GvError::PollNotFound(poll_id.to_string()))?;
        if poll.is_expired(now) {
            return Err(GvError::PollExpired);
        }

        let mut selected_options = selected.to_vec();
        selected_options.sort_unstable();
        selected_options.dedup();

        if selected_options.is_empty() {
            return Err(GvError::InvalidPollOption(
                "at least one option must be selected".to_string(),
            ));
        }
        if let Some(bad) = selected_options.iter().find(|&&i| i >= poll.options.len()) {
            return Err(GvError::InvalidPollOption(format!(
                "option {bad} is out of range"
            )));
        }
        if !poll.is_multi_select && selected_options.len() > 1 {
            return Err(GvError::InvalidPollOption(
                "poll accepts a single option".to_string(),
            ));
        }

        poll.responses.retain(|r| r.user_id != user_id);
        poll.responses.push(PollResponse {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            selected_options,
            timestamp: now,
        });
        let poll = poll.clone();

        if let Some(participant) = self.participant_mut(user_id) {
            participant.touch(now);
        }
        Ok(poll)
    }

    /// Tallies for a poll. Readable after the session ends.
    pub fn poll_results(&self, poll_id: &PollId) -> Result<PollResults, GvError> {
        self.poll(poll_id).map(Poll::results)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::session::test_support::*;
    use crate::session::{CreateSessionOptions, SettingsOverrides};

    fn opts(labels: &[&str]) -> Vec<String> {
        labels.iter().map(ToString::to_string).collect()
    }

    fn single_poll(session: &mut Session) -> Poll {
        session
            .create_poll(
                "inst-1",
                "Pick one",
                opts(&["A", "B", "C"]),
                PollOptions::default(),
                at(1),
            )
            .unwrap()
    }

    #[test]
    fn test_create_poll_announces_it() {
        let mut session = instructor_session();
        let poll = single_poll(&mut session);

        let event = session.events.last().unwrap();
        assert_eq!(event.content, "Dr. Rivera created a poll: Pick one");
        assert_eq!(event.payload, Some(EventPayload::PollCreated { poll_id: poll.id }));
        assert_eq!(session.polls.len(), 1);
    }

    #[test]
    fn test_create_poll_rejections_in_order() {
        let mut student_hosted = student_session();
        assert!(matches!(
            student_hosted.create_poll("stu-1", "Q", opts(&["a", "b"]), PollOptions::default(), at(1)),
            Err(GvError::FeatureDisabled(Feature::Polls))
        ));

        let mut session = Session::create(
            "No anonymity",
            "vid",
            &instructor(),
            &SettingsOverrides {
                allow_anonymous_polls: Some(false),
                ..Default::default()
            },
            CreateSessionOptions::default(),
            t0(),
        )
        .unwrap();
        let anonymous = PollOptions {
            is_anonymous: true,
            ..Default::default()
        };
        assert!(matches!(
            session.create_poll("inst-1", "Q", opts(&["a", "b"]), anonymous, at(1)),
            Err(GvError::FeatureDisabled(Feature::AnonymousPolls))
        ));
        assert!(matches!(
            session.create_poll("nobody", "Q", opts(&["a", "b"]), PollOptions::default(), at(1)),
            Err(GvError::NotAuthorized(_))
        ));
        assert!(matches!(
            session.create_poll("inst-1", "Q", opts(&["only"]), PollOptions::default(), at(1)),
            Err(GvError::InvalidRequest(_))
        ));
        assert!(matches!(
            session.create_poll("inst-1", "Q", opts(&["a", " "]), PollOptions::default(), at(1)),
            Err(GvError::InvalidRequest(_))
        ));
        assert!(session.polls.is_empty());
    }

    #[test]
    fn test_response_replaces_prior() {
        let mut session = instructor_session();
        let poll = single_poll(&mut session);

        session.respond_to_poll(&poll.id, "u1", "Ana", &[0], at(2)).unwrap();
        let updated = session.respond_to_poll(&poll.id, "u1", "Ana", &[2], at(3)).unwrap();

        assert_eq!(updated.responses.len(), 1);
        assert_eq!(updated.responses[0].selected_options, vec![2]);
        assert_eq!(updated.tally(), vec![0, 0, 1]);
    }

    #[test]
    fn test_invalid_selections() {
        let mut session = instructor_session();
        let poll = single_poll(&mut session);

        for selection in [&[][..], &[5][..], &[0, 1][..]] {
            assert!(matches!(
                session.respond_to_poll(&poll.id, "u1", "Ana", selection, at(2)),
                Err(GvError::InvalidPollOption(_))
            ));
        }
        // Duplicate indices collapse to one
        let ok = session.respond_to_poll(&poll.id, "u1", "Ana", &[1, 1], at(2)).unwrap();
        assert_eq!(ok.responses[0].selected_options, vec![1]);
    }

    #[test]
    fn test_multi_select_dedupes_and_sorts() {
        let mut session = instructor_session();
        let poll = session
            .create_poll(
                "inst-1",
                "Pick many",
                opts(&["A", "B", "C"]),
                PollOptions {
                    is_multi_select: true,
                    ..Default::default()
                },
                at(1),
            )
            .unwrap();
        let updated = session
            .respond_to_poll(&poll.id, "u1", "Ana", &[2, 0, 2], at(2))
            .unwrap();
        assert_eq!(updated.responses[0].selected_options, vec![0, 2]);
    }

    #[test]
    fn test_expired_and_unknown_polls() {
        let mut session = instructor_session();
        let poll = session
            .create_poll(
                "inst-1",
                "Quick",
                opts(&["yes", "no"]),
                PollOptions {
                    expires: Some(at(30)),
                    ..Default::default()
                },
                at(1),
            )
            .unwrap();

        session.respond_to_poll(&poll.id, "u1", "Ana", &[0], at(30)).unwrap();
        assert!(matches!(
            session.respond_to_poll(&poll.id, "u2", "Ben", &[1], at(31)),
            Err(GvError::PollExpired)
        ));
        assert!(matches!(
            session.respond_to_poll(&PollId::new(), "u2", "Ben", &[1], at(2)),
            Err(GvError::PollNotFound(_))
        ));
    }

    #[test]
    fn test_results_survive_session_end() {
        let mut session = instructor_session();
        let poll = single_poll(&mut session);
        session.respond_to_poll(&poll.id, "u1", "Ana", &[1], at(2)).unwrap();
        session.end(at(3)).unwrap();

        let results = session.poll_results(&poll.id).unwrap();
        assert_eq!(results.total_respondents, 1);
        assert_eq!(results.options[1].votes, 1);
        assert_eq!(results.options[1].voters, vec!["Ana"]);

        assert!(matches!(
            session.respond_to_poll(&poll.id, "u2", "Ben", &[0], at(4)),
            Err(GvError::SessionEnded)
        ));
    }
}
