//! Fanout State: Tracks contact rounds and the lifecycle of one shift

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::shift::{CaregiverId, ContactChannel, ShiftId};

/// Lifecycle of a shift's fanout. Moves forward only.
///
/// ```text
/// Pending ──▶ InProgress ──▶ Resolved
///    │            │  ▲  └───▶ Exhausted
///    │            └──┘
///    └──────────────────────▶ Resolved | Exhausted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FanoutStatus {
    /// Admitted, no round run yet
    Pending,
    /// At least one round has run, rounds remain
    InProgress,
    /// A caregiver accepted
    Resolved,
    /// Out of rounds or out of people to reach
    Exhausted,
}

impl FanoutStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Exhausted)
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    /// `InProgress → InProgress` is the only self-loop.
    pub fn can_transition_to(self, next: FanoutStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::InProgress)
            | (Self::Pending, Self::Resolved)
            | (Self::Pending, Self::Exhausted)
            | (Self::InProgress, Self::InProgress)
            | (Self::InProgress, Self::Resolved)
            | (Self::InProgress, Self::Exhausted) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for FanoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Resolved => write!(f, "resolved"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Record of a single executed round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Which round this was (1-indexed)
    pub round: u32,
    pub channel: ContactChannel,
    pub dispatched_at: DateTime<Utc>,
    /// Caregivers whose delivery reported `Sent`
    pub sent: Vec<CaregiverId>,
    /// Caregivers whose delivery failed this round
    pub failed: Vec<CaregiverId>,
}

/// Result of an `accept` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AcceptOutcome {
    /// The shift moved to `Resolved`
    Resolved { caregiver_id: CaregiverId },
    /// The shift was already terminal; nothing changed
    AlreadyFinal {
        status: FanoutStatus,
        claimed_by: Option<CaregiverId>,
    },
    NotFound,
}

impl AcceptOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

/// Full fanout state for a single shift
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftFanoutState {
    pub shift_id: ShiftId,
    pub status: FanoutStatus,
    /// Rounds executed so far
    pub round_count: u32,
    /// Dispatch time of the most recent round
    pub last_contact_at: Option<DateTime<Utc>>,
    /// Everyone who has been reached for this shift. Only grows.
    pub contacted_caregivers: BTreeSet<CaregiverId>,
    /// Caregivers whose deliveries failed and who have not been reached since
    pub failed_deliveries: BTreeSet<CaregiverId>,
    /// Ceiling on escalation rounds
    pub max_rounds: u32,
    pub admitted_at: DateTime<Utc>,
    pub resolved_by: Option<CaregiverId>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub round_history: Vec<RoundRecord>,
}

impl ShiftFanoutState {
    /// Create a fresh `Pending` state
    pub fn new(shift_id: ShiftId, max_rounds: u32, admitted_at: DateTime<Utc>) -> Self {
        Self {
            shift_id,
            status: FanoutStatus::Pending,
            round_count: 0,
            last_contact_at: None,
            contacted_caregivers: BTreeSet::new(),
            failed_deliveries: BTreeSet::new(),
            max_rounds,
            admitted_at,
            resolved_by: None,
            resolved_at: None,
            round_history: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the cooldown since the last round has elapsed.
    /// A shift that never ran a round is always due.
    pub fn cooldown_elapsed(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.last_contact_at {
            None => true,
            Some(last) => now - last >= cooldown,
        }
    }

    /// Earliest time the next round may start
    pub fn next_due_at(&self, cooldown: Duration) -> Option<DateTime<Utc>> {
        self.last_contact_at.map(|last| last + cooldown)
    }

    /// Apply a status change if it respects the forward-only order.
    fn transition(&mut self, next: FanoutStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Record an executed round.
    ///
    /// `Sent` caregivers join `contacted_caregivers`; failed ones are remembered
    /// but stay eligible. Moves `Pending → InProgress` on the first round.
    pub fn record_round(
        &mut self,
        channel: ContactChannel,
        sent: Vec<CaregiverId>,
        failed: Vec<CaregiverId>,
        now: DateTime<Utc>,
    ) {
        self.round_count += 1;
        self.last_contact_at = Some(now);

        for caregiver in &sent {
            self.failed_deliveries.remove(caregiver);
            self.contacted_caregivers.insert(caregiver.clone());
        }
        for caregiver in &failed {
            if !self.contacted_caregivers.contains(caregiver) {
                self.failed_deliveries.insert(caregiver.clone());
            }
        }

        self.round_history.push(RoundRecord {
            round: self.round_count,
            channel,
            dispatched_at: now,
            sent,
            failed,
        });

        self.transition(FanoutStatus::InProgress);
    }

    /// Move to `Exhausted`. Returns false if already terminal.
    pub fn mark_exhausted(&mut self) -> bool {
        self.transition(FanoutStatus::Exhausted)
    }

    /// Resolve the shift in favour of `caregiver`.
    pub fn resolve(&mut self, caregiver: CaregiverId, now: DateTime<Utc>) -> AcceptOutcome {
        if self.is_terminal() {
            return AcceptOutcome::AlreadyFinal {
                status: self.status,
                claimed_by: self.resolved_by.clone(),
            };
        }
        self.transition(FanoutStatus::Resolved);
        self.resolved_by = Some(caregiver.clone());
        self.resolved_at = Some(now);
        AcceptOutcome::Resolved {
            caregiver_id: caregiver,
        }
    }

    /// Get a summary for logging
    pub fn summary(&self) -> String {
        format!(
            "shift={} status={} rounds={}/{} contacted={} failed={}",
            self.shift_id,
            self.status,
            self.round_count,
            self.max_rounds,
            self.contacted_caregivers.len(),
            self.failed_deliveries.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn ids(names: &[&str]) -> Vec<CaregiverId> {
        names.iter().map(|n| CaregiverId::new(*n)).collect()
    }

    #[test]
    fn test_new_state_is_pending() {
        let state = ShiftFanoutState::new(ShiftId::new("s1"), 2, t0());
        assert_eq!(state.status, FanoutStatus::Pending);
        assert_eq!(state.round_count, 0);
        assert!(state.last_contact_at.is_none());
        assert!(state.contacted_caregivers.is_empty());
        assert!(state.cooldown_elapsed(t0(), Duration::minutes(10)));
    }

    #[test]
    fn test_forward_only_transitions() {
        use FanoutStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Exhausted));
        assert!(!InProgress.can_transition_to(Pending));
        assert!(!Resolved.can_transition_to(InProgress));
        assert!(!Exhausted.can_transition_to(Resolved));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_record_round_only_marks_sent() {
        let mut state = ShiftFanoutState::new(ShiftId::new("s1"), 3, t0());
        state.record_round(ContactChannel::Sms, ids(&["a"]), ids(&["b"]), t0());

        assert_eq!(state.status, FanoutStatus::InProgress);
        assert_eq!(state.round_count, 1);
        assert_eq!(state.last_contact_at, Some(t0()));
        assert!(state.contacted_caregivers.contains(&CaregiverId::new("a")));
        assert!(!state.contacted_caregivers.contains(&CaregiverId::new("b")));
        assert!(state.failed_deliveries.contains(&CaregiverId::new("b")));

        // b gets through on the retry
        let later = t0() + Duration::minutes(10);
        state.record_round(ContactChannel::Call, ids(&["b"]), vec![], later);
        assert!(state.contacted_caregivers.contains(&CaregiverId::new("b")));
        assert!(state.failed_deliveries.is_empty());
        assert_eq!(state.round_history.len(), 2);
        assert_eq!(state.round_history[1].round, 2);
    }

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let mut state = ShiftFanoutState::new(ShiftId::new("s1"), 3, t0());
        state.record_round(ContactChannel::Sms, ids(&["a"]), vec![], t0());
        let cooldown = Duration::minutes(10);

        assert!(!state.cooldown_elapsed(t0() + Duration::minutes(9), cooldown));
        assert!(state.cooldown_elapsed(t0() + cooldown, cooldown));
        assert_eq!(state.next_due_at(cooldown), Some(t0() + cooldown));
    }

    #[test]
    fn test_resolve_is_final() {
        let mut state = ShiftFanoutState::new(ShiftId::new("s1"), 2, t0());
        let first = state.resolve(CaregiverId::new("a"), t0());
        assert!(first.is_resolved());
        assert_eq!(state.resolved_by, Some(CaregiverId::new("a")));

        let second = state.resolve(CaregiverId::new("b"), t0());
        assert_eq!(
            second,
            AcceptOutcome::AlreadyFinal {
                status: FanoutStatus::Resolved,
                claimed_by: Some(CaregiverId::new("a")),
            }
        );
        assert!(!state.mark_exhausted());
        assert_eq!(state.status, FanoutStatus::Resolved);
    }

    #[test]
    fn test_accept_outcome_serialization() {
        let resolved = serde_json::to_value(AcceptOutcome::Resolved {
            caregiver_id: CaregiverId::new("a"),
        })
        .unwrap();
        assert_eq!(resolved["outcome"], "resolved");
        assert_eq!(resolved["caregiver_id"], "a");

        let final_outcome = AcceptOutcome::AlreadyFinal {
            status: FanoutStatus::Resolved,
            claimed_by: Some(CaregiverId::new("a")),
        };
        let json = serde_json::to_value(&final_outcome).unwrap();
        assert_eq!(json["outcome"], "already_final");
        assert_eq!(json["status"], "RESOLVED");
        assert_eq!(json["claimed_by"], "a");
        let back: AcceptOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, final_outcome);

        let missing = serde_json::to_value(AcceptOutcome::NotFound).unwrap();
        assert_eq!(missing["outcome"], "not_found");
    }
}
