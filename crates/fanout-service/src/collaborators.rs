//! External collaborator contracts
//!
//! The engine consumes two services it does not own:
//!
//! - [`CaregiverDirectory`]: who holds a given role
//! - [`NotificationGateway`]: delivers one offer to one caregiver
//!
//! Both are object-safe async traits so the engine can hold them as
//! `Arc<dyn ...>` and tests can swap in scripted fakes.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fanout_core::{CaregiverId, ContactChannel, Role, Shift, ShiftId};

/// Why the directory could not answer
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Source of role assignments.
#[async_trait]
pub trait CaregiverDirectory: Send + Sync {
    /// Caregivers currently qualified for `role`.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::Unavailable` when the source cannot be reached.
    /// The caller defers the round; nothing is recorded.
    async fn find_eligible(&self, role: &Role) -> Result<BTreeSet<CaregiverId>, DirectoryError>;
}

/// One offer to one caregiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub shift_id: ShiftId,
    pub caregiver_id: CaregiverId,
    pub role: Role,
    pub scheduled_at: DateTime<Utc>,
    pub round: u32,
    pub channel: ContactChannel,
}

impl Notification {
    pub fn new(shift: &Shift, caregiver_id: CaregiverId, round: u32, channel: ContactChannel) -> Self {
        Self {
            shift_id: shift.id.clone(),
            caregiver_id,
            role: shift.required_role.clone(),
            scheduled_at: shift.scheduled_at,
            round,
            channel,
        }
    }
}

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Push/SMS/voice transport.
///
/// Failures are reported as `DeliveryOutcome::Failed`, never as a panic or
/// an error that aborts the round.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn notify(&self, notification: &Notification) -> DeliveryOutcome;
}
