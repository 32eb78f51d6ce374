//! Escalation Engine: deterministic decisions for contact rounds
//!
//! Consumes a `ShiftFanoutState`, the directory's eligible set, and "now" to
//! decide whether a round is due, whom it reaches, and how its results are
//! committed. No I/O happens in this module.
//!
//! A round is split in two so that dispatch can happen outside any lock:
//!
//! ```text
//! check_due ──▶ plan_round ──▶ (dispatch, async, elsewhere) ──▶ commit_round
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::FanoutConfig;
use crate::escalation::state::{FanoutStatus, ShiftFanoutState};
use crate::shift::{CaregiverId, ContactChannel};

/// Whether a shift should run a round right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueCheck {
    Due,
    CoolingDown { next_due_at: DateTime<Utc> },
    Terminal { status: FanoutStatus },
}

/// What a due round should do with the directory's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RoundDecision {
    /// Dispatch to these caregivers as round `round`
    Dispatch {
        round: u32,
        channel: ContactChannel,
        candidates: BTreeSet<CaregiverId>,
    },
    /// Nobody new left to reach after at least one round
    Exhaust { rounds: u32 },
    /// The shift became terminal before planning
    Skip { status: FanoutStatus },
}

/// Per-caregiver results of a dispatched round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCommit {
    pub round: u32,
    pub channel: ContactChannel,
    pub sent: Vec<CaregiverId>,
    pub failed: Vec<CaregiverId>,
}

/// What committing a round did to the state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Round recorded; status after the commit
    Applied { status: FanoutStatus },
    /// Shift went terminal while the round was in flight; nothing recorded
    Discarded { status: FanoutStatus },
    /// Another round already committed this round number; nothing recorded
    Stale { round_count: u32 },
}

/// Pure round decisions over a `ShiftFanoutState`
#[derive(Debug, Clone)]
pub struct EscalationEngine {
    cooldown: Duration,
    retry_failed_deliveries: bool,
    call_after_round: u32,
}

impl EscalationEngine {
    /// Create a new engine with default config
    pub fn new() -> Self {
        Self::with_config(&FanoutConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: &FanoutConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            retry_failed_deliveries: config.retry_failed_deliveries,
            call_after_round: config.call_after_round,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Is a round due? `Pending` shifts always are; `InProgress` shifts once
    /// the cooldown since the last round has fully elapsed.
    pub fn check_due(&self, state: &ShiftFanoutState, now: DateTime<Utc>) -> DueCheck {
        if state.is_terminal() {
            return DueCheck::Terminal {
                status: state.status,
            };
        }
        if state.status == FanoutStatus::Pending || state.cooldown_elapsed(now, self.cooldown) {
            return DueCheck::Due;
        }
        DueCheck::CoolingDown {
            next_due_at: state
                .next_due_at(self.cooldown)
                .unwrap_or(now + self.cooldown),
        }
    }

    /// Candidate set for the next round: eligible minus already contacted
    /// (and minus earlier failures when retries are disabled).
    pub fn candidates(
        &self,
        state: &ShiftFanoutState,
        eligible: &BTreeSet<CaregiverId>,
    ) -> BTreeSet<CaregiverId> {
        eligible
            .iter()
            .filter(|c| !state.contacted_caregivers.contains(*c))
            .filter(|c| self.retry_failed_deliveries || !state.failed_deliveries.contains(*c))
            .cloned()
            .collect()
    }

    /// Decide what a due round does with the directory's eligible set.
    pub fn plan_round(
        &self,
        state: &ShiftFanoutState,
        eligible: &BTreeSet<CaregiverId>,
    ) -> RoundDecision {
        if state.is_terminal() {
            return RoundDecision::Skip {
                status: state.status,
            };
        }

        let candidates = self.candidates(state, eligible);

        // Out of people: stop instead of ticking empty rounds until max_rounds
        if candidates.is_empty() && state.round_count > 0 {
            return RoundDecision::Exhaust {
                rounds: state.round_count,
            };
        }

        let round = state.round_count + 1;
        RoundDecision::Dispatch {
            round,
            channel: ContactChannel::for_round(round, self.call_after_round),
            candidates,
        }
    }

    /// Record a dispatched round. Applies only if the shift is still live and
    /// no other round committed in the meantime.
    pub fn commit_round(
        &self,
        state: &mut ShiftFanoutState,
        commit: RoundCommit,
        now: DateTime<Utc>,
    ) -> CommitOutcome {
        if state.is_terminal() {
            return CommitOutcome::Discarded {
                status: state.status,
            };
        }
        if commit.round != state.round_count + 1 {
            return CommitOutcome::Stale {
                round_count: state.round_count,
            };
        }

        state.record_round(commit.channel, commit.sent, commit.failed, now);

        if state.round_count >= state.max_rounds {
            state.mark_exhausted();
        }

        CommitOutcome::Applied {
            status: state.status,
        }
    }

    /// Apply an `Exhaust` decision. Returns false if the shift was already terminal.
    pub fn exhaust(&self, state: &mut ShiftFanoutState) -> bool {
        state.mark_exhausted()
    }
}

impl Default for EscalationEngine {
    fn default() -> Self {
        Self::new()
    }
}
