//! Participant entries and registry outcomes.

use super::{Caller, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry per identity in a session. Leaving marks the entry inactive;
/// rejoining reactivates the same entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
    pub join_time: DateTime<Utc>,
    pub leave_time: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub last_activity: DateTime<Utc>,
    /// Last media position reached through a seek, in seconds.
    pub last_position: Option<f64>,
    pub has_control: bool,
    pub raised_hand: bool,
}

impl Participant {
    pub(crate) fn new(caller: &Caller, has_control: bool, now: DateTime<Utc>) -> Self {
        Self {
            user_id: caller.user_id.clone(),
            user_name: caller.user_name.clone(),
            role: caller.role,
            join_time: now,
            leave_time: None,
            is_active: true,
            last_activity: now,
            last_position: None,
            has_control,
            raised_hand: false,
        }
    }

    /// Leave time is stamped only if not already set.
    pub(crate) fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.raised_hand = false;
        if self.leave_time.is_none() {
            self.leave_time = Some(now);
        }
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }
}

/// Result of a participant leaving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveOutcome {
    /// Identity of the promoted host, when the host left and someone remained.
    pub new_host: Option<String>,
    /// True when the host left with nobody else present.
    pub session_ended: bool,
}

/// Result of a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlOutcome {
    Granted,
    Pending,
}
