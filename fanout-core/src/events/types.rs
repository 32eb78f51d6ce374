//! Event types for shift fanout

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shift::{CaregiverId, ContactChannel, ShiftId};

/// Everything observable about a shift's fanout lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FanoutEvent {
    /// A new shift passed the dedup check
    ShiftAdmitted {
        shift_id: ShiftId,
        timestamp: DateTime<Utc>,
    },

    /// A posting for a known shift id was acknowledged and dropped
    DuplicateIgnored {
        shift_id: ShiftId,
        timestamp: DateTime<Utc>,
    },

    /// A round finished dispatching and was committed
    RoundDispatched {
        shift_id: ShiftId,
        round: u32,
        channel: ContactChannel,
        sent: Vec<CaregiverId>,
        failed: Vec<CaregiverId>,
        timestamp: DateTime<Utc>,
    },

    /// A due round could not run and will be retried next tick
    RoundDeferred {
        shift_id: ShiftId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    ShiftResolved {
        shift_id: ShiftId,
        caregiver_id: CaregiverId,
        timestamp: DateTime<Utc>,
    },

    ShiftExhausted {
        shift_id: ShiftId,
        rounds: u32,
        timestamp: DateTime<Utc>,
    },
}

impl FanoutEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            FanoutEvent::ShiftAdmitted { timestamp, .. } => *timestamp,
            FanoutEvent::DuplicateIgnored { timestamp, .. } => *timestamp,
            FanoutEvent::RoundDispatched { timestamp, .. } => *timestamp,
            FanoutEvent::RoundDeferred { timestamp, .. } => *timestamp,
            FanoutEvent::ShiftResolved { timestamp, .. } => *timestamp,
            FanoutEvent::ShiftExhausted { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            FanoutEvent::ShiftAdmitted { .. } => "shift_admitted",
            FanoutEvent::DuplicateIgnored { .. } => "duplicate_ignored",
            FanoutEvent::RoundDispatched { .. } => "round_dispatched",
            FanoutEvent::RoundDeferred { .. } => "round_deferred",
            FanoutEvent::ShiftResolved { .. } => "shift_resolved",
            FanoutEvent::ShiftExhausted { .. } => "shift_exhausted",
        }
    }

    /// Every fanout event is scoped to one shift
    pub fn shift_id(&self) -> &ShiftId {
        match self {
            FanoutEvent::ShiftAdmitted { shift_id, .. }
            | FanoutEvent::DuplicateIgnored { shift_id, .. }
            | FanoutEvent::RoundDispatched { shift_id, .. }
            | FanoutEvent::RoundDeferred { shift_id, .. }
            | FanoutEvent::ShiftResolved { shift_id, .. }
            | FanoutEvent::ShiftExhausted { shift_id, .. } => shift_id,
        }
    }
}
