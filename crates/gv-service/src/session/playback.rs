//! Playback control intents.

use super::event::EventDraft;
use super::{Event, EventPayload, EventType, PlaybackAction, Session};
use crate::errors::GvError;
use chrono::{DateTime, Utc};

fn describe(name: &str, action: PlaybackAction, value: Option<f64>) -> String {
    match (action, value) {
        (PlaybackAction::Play, _) => format!("{name} played"),
        (PlaybackAction::Pause, _) => format!("{name} paused"),
        (PlaybackAction::Seek, Some(v)) => format!("{name} seeked to {v}"),
        (PlaybackAction::SpeedChange, Some(v)) => format!("{name} changed speed to {v}"),
        (PlaybackAction::Seek | PlaybackAction::SpeedChange, None) => {
            format!("{name} {}", action.as_str())
        }
    }
}

fn validate(action: PlaybackAction, value: Option<f64>) -> Result<(), GvError> {
    match action {
        PlaybackAction::Play | PlaybackAction::Pause => Ok(()),
        PlaybackAction::Seek => match value {
            Some(v) if v.is_finite() && v >= 0.0 => Ok(()),
            _ => Err(GvError::InvalidRequest(
                "seek requires a non-negative position".to_string(),
            )),
        },
        PlaybackAction::SpeedChange => match value {
            Some(v) if v.is_finite() && v > 0.0 => Ok(()),
            _ => Err(GvError::InvalidRequest(
                "speed change requires a positive rate".to_string(),
            )),
        },
    }
}

impl Session {
    /// Record a playback intent from a participant holding control.
    ///
    /// Not subject to feature toggles. A seek also records the caller's
    /// position.
    pub fn issue_control(
        &mut self,
        user_id: &str,
        action: PlaybackAction,
        value: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Event, GvError> {
        self.ensure_open()?;

        let participant = self
            .participant_mut(user_id)
            .filter(|p| p.is_active && p.has_control)
            .ok_or_else(|| {
                GvError::NotAuthorized("caller does not hold playback control".to_string())
            })?;
        validate(action, value)?;

        participant.touch(now);
        if action == PlaybackAction::Seek {
            participant.last_position = value;
        }
        let (user_name, user_role) = (participant.user_name.clone(), participant.role);

        let draft = EventDraft {
            user_id: user_id.to_string(),
            content: describe(&user_name, action, value),
            user_name,
            user_role,
            event_type: EventType::Control,
            time_code: None,
            reply_to: None,
            payload: Some(EventPayload::Control { action, value }),
        };
        Ok(self.append_event(draft, now))
    }
}
