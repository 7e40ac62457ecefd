//! Session listing filter.

use super::{Session, SessionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Criteria for `list_sessions`. All set criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFilter {
    pub host_id: Option<String>,
    /// Sessions in which this identity has (or had) a participant entry.
    pub participant_id: Option<String>,
    pub video_id: Option<String>,
    pub status: Option<SessionStatus>,
    pub course_id: Option<String>,
    pub group_id: Option<String>,
    /// Inclusive lower bound on `start_time`.
    pub start_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `start_time`.
    pub start_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring over name and description.
    pub search_text: Option<String>,
    /// Matches when the session shares at least one tag.
    pub tags: Option<Vec<String>>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl SessionFilter {
    #[must_use]
    pub fn matches(&self, session: &Session) -> bool {
        if self.host_id.as_ref().is_some_and(|h| &session.host_id != h) {
            return false;
        }
        if let Some(user_id) = &self.participant_id {
            if session.participant(user_id).is_none() {
                return false;
            }
        }
        if self.video_id.as_ref().is_some_and(|v| &session.video_id != v) {
            return false;
        }
        if self.status.is_some_and(|s| session.status != s) {
            return false;
        }
        if self.course_id.is_some() && session.course_id != self.course_id {
            return false;
        }
        if self.group_id.is_some() && session.group_id != self.group_id {
            return false;
        }
        if self.start_after.is_some_and(|t| session.start_time < t) {
            return false;
        }
        if self.start_before.is_some_and(|t| session.start_time > t) {
            return false;
        }
        if let Some(text) = &self.search_text {
            let needle = text.to_lowercase();
            let in_name = session.name.to_lowercase().contains(&needle);
            let in_description = session
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_name && !in_description {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.is_empty() && !tags.iter().any(|t| session.tags.contains(t)) {
                return false;
            }
        }
        true
    }

    /// Filter and paginate sessions already in creation order.
    ///
    /// `offset` applies even without a `limit`.
    pub fn apply<I>(&self, sessions: I) -> Vec<Session>
    where
        I: IntoIterator<Item = Session>,
    {
        let matching = sessions
            .into_iter()
            .filter(|s| self.matches(s))
            .skip(self.offset.unwrap_or(0));
        match self.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }
}
