//! Participant presence, host handoff and control authority.

use super::{
    Caller, ControlOutcome, EventPayload, Feature, LeaveOutcome, Participant, Session,
};
use crate::errors::GvError;
use chrono::{DateTime, Utc};

impl Session {
    /// Join or rejoin the session.
    ///
    /// A returning identity keeps its original join time, display name and
    /// control grant. Only a participant who had left produces a "rejoined"
    /// event; refreshing an active entry is silent.
    pub fn join(&mut self, caller: &Caller, now: DateTime<Utc>) -> Result<Participant, GvError> {
        self.ensure_open()?;
        caller.ensure_not_reserved()?;

        let already_active = self
            .participant(&caller.user_id)
            .map(|p| p.is_active);
        if already_active != Some(true) {
            if let Some(max) = self.settings.max_participants {
                if self.active_participant_count() >= max as usize {
                    return Err(GvError::CapacityExceeded(max));
                }
            }
        }

        if let Some(existing) = self.participant_mut(&caller.user_id) {
            let rejoined = !existing.is_active;
            existing.is_active = true;
            existing.leave_time = None;
            existing.touch(now);
            let participant = existing.clone();
            if rejoined {
                self.append_system_event(
                    format!("{} rejoined the session", participant.user_name),
                    None,
                    now,
                );
            }
            return Ok(participant);
        }

        let has_control =
            !self.settings.require_hand_raise || caller.role.is_instructor_equivalent();
        let participant = Participant::new(caller, has_control, now);
        self.participants.push(participant.clone());
        self.append_system_event(format!("{} joined the session", caller.user_name), None, now);
        Ok(participant)
    }

    /// Leave the session.
    ///
    /// When the host leaves, the first remaining active participant (by join
    /// order) becomes host with control. With nobody left the session ends.
    pub fn leave(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<LeaveOutcome, GvError> {
        self.ensure_open()?;

        let participant = self.require_participant_mut(user_id)?;
        if !participant.is_active {
            return Err(GvError::Conflict(format!(
                "participant {user_id} has already left"
            )));
        }
        participant.deactivate(now);
        let name = participant.user_name.clone();
        self.append_system_event(format!("{name} left the session"), None, now);

        if !self.is_host(user_id) {
            return Ok(LeaveOutcome {
                new_host: None,
                session_ended: false,
            });
        }

        let next_host = self
            .participants
            .iter_mut()
            .find(|p| p.is_active)
            .map(|next| {
                next.has_control = true;
                next.raised_hand = false;
                (next.user_id.clone(), next.user_name.clone(), next.role)
            });

        match next_host {
            Some((id, name, role)) => {
                self.host_id = id.clone();
                self.host_name = name.clone();
                self.host_role = role;
                self.append_system_event(
                    format!("{name} is now the host"),
                    Some(EventPayload::HostChange {
                        new_host_id: id.clone(),
                    }),
                    now,
                );
                Ok(LeaveOutcome {
                    new_host: Some(id),
                    session_ended: false,
                })
            }
            None => {
                self.end(now)?;
                Ok(LeaveOutcome {
                    new_host: None,
                    session_ended: true,
                })
            }
        }
    }

    /// Ask for playback control.
    pub fn request_control(
        &mut self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ControlOutcome, GvError> {
        self.ensure_open()?;
        if !self.settings.allow_participant_control {
            return Err(GvError::FeatureDisabled(Feature::ParticipantControl));
        }
        let auto_accept = self.settings.auto_accept_hand_raise;

        let participant = self.require_participant_mut(user_id)?;
        participant.touch(now);
        if participant.has_control {
            return Ok(ControlOutcome::Granted);
        }

        let name = participant.user_name.clone();
        if auto_accept {
            participant.has_control = true;
            participant.raised_hand = false;
            self.append_system_event(format!("{name} now has control"), None, now);
            Ok(ControlOutcome::Granted)
        } else {
            participant.raised_hand = true;
            self.append_system_event(format!("{name} requested control"), None, now);
            Ok(ControlOutcome::Pending)
        }
    }

    fn ensure_host_registry(&self, caller_id: &str, action: &str) -> Result<(), GvError> {
        if self.is_host(caller_id) {
            Ok(())
        } else {
            Err(GvError::NotAuthorized(format!("only the host can {action}")))
        }
    }

    /// Host grants control to `target_id`.
    pub fn grant_control(
        &mut self,
        host_id: &str,
        target_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Participant, GvError> {
        self.ensure_open()?;
        self.ensure_host_registry(host_id, "grant control")?;
        let host_name = self.host_name.clone();

        let target = self.require_participant_mut(target_id)?;
        target.has_control = true;
        target.raised_hand = false;
        let target = target.clone();

        self.append_system_event(
            format!("{} was granted control by {host_name}", target.user_name),
            None,
            now,
        );
        Ok(target)
    }

    /// Host revokes control from `target_id`. The host's own control cannot
    /// be revoked.
    pub fn revoke_control(
        &mut self,
        host_id: &str,
        target_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Participant, GvError> {
        self.ensure_open()?;
        self.ensure_host_registry(host_id, "revoke control")?;
        if self.is_host(target_id) {
            return Err(GvError::InvalidRequest(
                "the host always holds control".to_string(),
            ));
        }
        let host_name = self.host_name.clone();

        let target = self.require_participant_mut(target_id)?;
        target.has_control = false;
        let target = target.clone();

        self.append_system_event(
            format!("{host_name} revoked control from {}", target.user_name),
            None,
            now,
        );
        Ok(target)
    }
}
