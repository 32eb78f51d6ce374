//! Inbound caregiver replies
//!
//! Turns a free-text reply into an accept on the engine after checking that
//! the sender is on the roster and qualified for the shift's role.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use fanout_core::{
    parse_reply_intent, AcceptOutcome, CaregiverId, FanoutError, FanoutStatus, ReplyIntent,
    ShiftId,
};

use crate::engine::SharedFanoutEngine;
use crate::roster::Roster;

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("no caregiver with phone {phone}")]
    UnknownCaregiver { phone: String },

    #[error(transparent)]
    Fanout(#[from] FanoutError),
}

/// A message received from a caregiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundReply {
    pub from_phone: String,
    pub shift_id: ShiftId,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Claimed,
    AlreadyClaimed,
    Closed,
    Declined,
    NotEligible,
    NotUnderstood,
}

impl ReplyStatus {
    /// Whether the reply was acted on as the caregiver intended
    pub fn is_success(self) -> bool {
        matches!(self, Self::Claimed | Self::Declined)
    }
}

/// What happened to a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOutcome {
    pub success: bool,
    pub status: ReplyStatus,
    pub message: String,
    pub intent: ReplyIntent,
    pub claimed_by: Option<CaregiverId>,
}

impl ReplyOutcome {
    fn new(status: ReplyStatus, intent: ReplyIntent, message: impl Into<String>) -> Self {
        Self {
            success: status.is_success(),
            status,
            message: message.into(),
            intent,
            claimed_by: None,
        }
    }

    fn claimed_by(mut self, caregiver: Option<CaregiverId>) -> Self {
        self.claimed_by = caregiver;
        self
    }
}

pub struct ReplyHandler {
    engine: SharedFanoutEngine,
    roster: Arc<Roster>,
}

impl ReplyHandler {
    pub fn new(engine: SharedFanoutEngine, roster: Arc<Roster>) -> Self {
        Self { engine, roster }
    }

    /// Handle one reply.
    ///
    /// # Errors
    ///
    /// `UnknownCaregiver` if the phone is not on the roster, and
    /// `Fanout(UnknownShift)` if the shift was never admitted.
    pub fn handle(&self, reply: &InboundReply) -> Result<ReplyOutcome, ReplyError> {
        let caregiver =
            self.roster
                .find_by_phone(&reply.from_phone)
                .ok_or_else(|| ReplyError::UnknownCaregiver {
                    phone: reply.from_phone.clone(),
                })?;
        let shift = self.engine.shift(&reply.shift_id)?;
        let intent = parse_reply_intent(&reply.body);

        debug!(
            shift_id = %reply.shift_id,
            caregiver_id = %caregiver.id,
            ?intent,
            "Reply received"
        );

        if caregiver.role != shift.required_role {
            warn!(
                shift_id = %shift.id,
                caregiver_id = %caregiver.id,
                caregiver_role = %caregiver.role,
                required_role = %shift.required_role,
                "Reply from caregiver without the required role"
            );
            return Ok(ReplyOutcome::new(
                ReplyStatus::NotEligible,
                intent,
                format!("Not eligible: shift requires {}", shift.required_role),
            ));
        }

        match intent {
            ReplyIntent::Accept => self.accept(&shift.id, caregiver.id.clone()),
            ReplyIntent::Decline => {
                info!(shift_id = %shift.id, caregiver_id = %caregiver.id, "Shift declined");
                let claimed_by = self.engine.get_status(&shift.id)?.resolved_by;
                Ok(ReplyOutcome::new(ReplyStatus::Declined, intent, "Shift declined")
                    .claimed_by(claimed_by))
            }
            ReplyIntent::Unknown => Ok(ReplyOutcome::new(
                ReplyStatus::NotUnderstood,
                intent,
                "Reply not understood. Reply YES to claim or NO to decline.",
            )),
        }
    }

    fn accept(&self, shift_id: &ShiftId, caregiver: CaregiverId) -> Result<ReplyOutcome, ReplyError> {
        let intent = ReplyIntent::Accept;
        let outcome = match self.engine.accept(shift_id, caregiver)? {
            AcceptOutcome::Resolved { caregiver_id } => {
                ReplyOutcome::new(ReplyStatus::Claimed, intent, "Shift successfully claimed")
                    .claimed_by(Some(caregiver_id))
            }
            AcceptOutcome::AlreadyFinal {
                status: FanoutStatus::Resolved,
                claimed_by,
            } => ReplyOutcome::new(ReplyStatus::AlreadyClaimed, intent, "Shift already claimed")
                .claimed_by(claimed_by),
            AcceptOutcome::AlreadyFinal { status, claimed_by } => ReplyOutcome::new(
                ReplyStatus::Closed,
                intent,
                format!("Shift is no longer open ({status})"),
            )
            .claimed_by(claimed_by),
            AcceptOutcome::NotFound => {
                return Err(FanoutError::UnknownShift {
                    shift_id: shift_id.clone(),
                }
                .into())
            }
        };
        Ok(outcome)
    }
}
