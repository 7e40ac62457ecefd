//! Polls and derived results.

use chrono::{DateTime, Utc};
use common::types::{PollId, SessionId};
use serde::{Deserialize, Serialize};

/// A live poll. Responses hold at most one entry per identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub session_id: SessionId,
    pub creator_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub created: DateTime<Utc>,
    pub expires: Option<DateTime<Utc>>,
    pub is_anonymous: bool,
    pub is_multi_select: bool,
    pub responses: Vec<PollResponse>,
}

/// One identity's answer to a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    pub user_id: String,
    pub user_name: String,
    /// Distinct, ascending option indices.
    pub selected_options: Vec<usize>,
    pub timestamp: DateTime<Utc>,
}

/// Optional poll flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollOptions {
    pub is_anonymous: bool,
    pub is_multi_select: bool,
    pub expires: Option<DateTime<Utc>>,
}

/// Per-option result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionTally {
    pub option: String,
    pub votes: usize,
    /// Respondent names; empty for anonymous polls.
    pub voters: Vec<String>,
}

/// Read-only poll summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResults {
    pub poll_id: PollId,
    pub question: String,
    pub is_anonymous: bool,
    pub is_multi_select: bool,
    pub total_respondents: usize,
    pub options: Vec<OptionTally>,
}

impl Poll {
    /// Strict comparison: a poll expiring exactly at `now` still accepts.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires < now)
    }

    /// Vote count per option, derived from the current responses.
    #[must_use]
    pub fn tally(&self) -> Vec<usize> {
        let mut counts = vec![0; self.options.len()];
        for response in &self.responses {
            for &index in &response.selected_options {
                if let Some(count) = counts.get_mut(index) {
                    *count += 1;
                }
            }
        }
        counts
    }

    /// Copy safe to hand outside the session: an anonymous poll drops its
    /// responses so nobody can read who chose what.
    #[must_use]
    pub fn into_public(mut self) -> Self {
        if self.is_anonymous {
            self.responses.clear();
        }
        self
    }

    #[must_use]
    pub fn results(&self) -> PollResults {
        let counts = self.tally();
        let options = self
            .options
            .iter()
            .zip(counts)
            .enumerate()
            .map(|(index, (option, votes))| {
                let voters = if self.is_anonymous {
                    Vec::new()
                } else {
                    self.responses
                        .iter()
                        .filter(|r| r.selected_options.contains(&index))
                        .map(|r| r.user_name.clone())
                        .collect()
                };
                OptionTally {
                    option: option.clone(),
                    votes,
                    voters,
                }
            })
            .collect();

        PollResults {
            poll_id: self.id,
            question: self.question.clone(),
            is_anonymous: self.is_anonymous,
            is_multi_select: self.is_multi_select,
            total_respondents: self.responses.len(),
            options,
        }
    }
}
