//! Fanout Engine: async round runner
//!
//! Wraps the deterministic `EscalationEngine` with the I/O half of a round:
//!
//! ```text
//!   try_begin_round (per-shift guard, skip if busy)
//!     → check_due (cooldown / terminal)
//!     → CaregiverDirectory::find_eligible  (error → defer, no mutation)
//!     → plan_round under the state lock
//!     → JoinSet::spawn(notify) × candidates
//!     → commit_round under the state lock (discarded if resolved meanwhile)
//! ```
//!
//! The state lock is never held across an `.await`. Only the per-shift round
//! guard spans the whole round, so `accept` is never blocked by an in-flight
//! dispatch.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use fanout_core::{
    AcceptOutcome, CaregiverId, CommitOutcome, ContactChannel, DueCheck, EscalationEngine,
    FanoutConfig, FanoutError, FanoutEvent, FanoutEventBus, FanoutResult, FanoutStatus,
    FanoutStore, RoundCommit, RoundDecision, SharedClock, SharedEventBus, SharedFanoutStore,
    Shift, ShiftEntry, ShiftFanoutState, ShiftId, SystemClock,
};

use crate::collaborators::{CaregiverDirectory, DeliveryOutcome, Notification, NotificationGateway};
use crate::gate::{IngestionGate, SubmitOutcome};

/// Shared reference to FanoutEngine
pub type SharedFanoutEngine = Arc<FanoutEngine>;

/// What one attempt to run a round did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoundOutcome {
    /// Round committed
    Dispatched {
        round: u32,
        channel: ContactChannel,
        sent: Vec<CaregiverId>,
        failed: Vec<CaregiverId>,
        status: FanoutStatus,
    },
    /// Nobody new to reach; shift moved to `Exhausted`
    Exhausted { rounds: u32 },
    /// Cooldown has not elapsed
    NotDue { next_due_at: DateTime<Utc> },
    /// Shift is terminal
    Skipped { status: FanoutStatus },
    /// Another round for this shift is in flight
    Busy,
    /// Shift went terminal during dispatch; the round was not recorded
    Discarded { status: FanoutStatus },
    /// Another round committed first; this one was not recorded
    Superseded { round_count: u32 },
}

/// Tally of one scheduler tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    pub evaluated: usize,
    pub dispatched: usize,
    pub exhausted: usize,
    pub deferred: usize,
    pub not_due: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TickReport {
    fn record(&mut self, result: &FanoutResult<RoundOutcome>) {
        self.evaluated += 1;
        match result {
            Ok(RoundOutcome::Dispatched { status, .. }) => {
                self.dispatched += 1;
                if *status == FanoutStatus::Exhausted {
                    self.exhausted += 1;
                }
            }
            Ok(RoundOutcome::Exhausted { .. }) => self.exhausted += 1,
            Ok(RoundOutcome::NotDue { .. }) => self.not_due += 1,
            Ok(
                RoundOutcome::Skipped { .. }
                | RoundOutcome::Busy
                | RoundOutcome::Discarded { .. }
                | RoundOutcome::Superseded { .. },
            ) => self.skipped += 1,
            Err(FanoutError::DirectoryUnavailable { .. }) => self.deferred += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Caller-facing view of a shift's fanout state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftStatusView {
    pub shift_id: ShiftId,
    pub status: FanoutStatus,
    pub round_count: u32,
    pub max_rounds: u32,
    pub contacted_caregivers: BTreeSet<CaregiverId>,
    pub last_contact_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<CaregiverId>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<ShiftFanoutState> for ShiftStatusView {
    fn from(state: ShiftFanoutState) -> Self {
        Self {
            shift_id: state.shift_id,
            status: state.status,
            round_count: state.round_count,
            max_rounds: state.max_rounds,
            contacted_caregivers: state.contacted_caregivers,
            last_contact_at: state.last_contact_at,
            resolved_by: state.resolved_by,
            resolved_at: state.resolved_at,
        }
    }
}

/// Owns the store and drives every shift through its rounds.
pub struct FanoutEngine {
    config: FanoutConfig,
    decisions: EscalationEngine,
    store: SharedFanoutStore,
    gate: IngestionGate,
    directory: Arc<dyn CaregiverDirectory>,
    gateway: Arc<dyn NotificationGateway>,
    clock: SharedClock,
    bus: SharedEventBus,
}

impl FanoutEngine {
    pub fn new(
        config: FanoutConfig,
        directory: Arc<dyn CaregiverDirectory>,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Self {
        let store = FanoutStore::new().shared();
        let clock: SharedClock = Arc::new(SystemClock);
        let bus = FanoutEventBus::with_capacity(config.event_capacity).shared();
        let gate = IngestionGate::new(store.clone(), clock.clone(), bus.clone(), config.max_rounds);

        Self {
            decisions: EscalationEngine::with_config(&config),
            config,
            store,
            gate,
            directory,
            gateway,
            clock,
            bus,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self.rebuild_gate();
        self
    }

    /// Publish to an existing bus instead of a private one.
    pub fn with_event_bus(mut self, bus: SharedEventBus) -> Self {
        self.bus = bus;
        self.rebuild_gate();
        self
    }

    pub fn shared(self) -> SharedFanoutEngine {
        Arc::new(self)
    }

    fn rebuild_gate(&mut self) {
        self.gate = IngestionGate::new(
            self.store.clone(),
            self.clock.clone(),
            self.bus.clone(),
            self.config.max_rounds,
        );
    }

    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedFanoutStore {
        &self.store
    }

    pub fn event_bus(&self) -> &SharedEventBus {
        &self.bus
    }

    pub fn gate(&self) -> &IngestionGate {
        &self.gate
    }

    /// Admit a posting without running a round.
    pub fn submit(&self, shift: Shift) -> FanoutResult<SubmitOutcome> {
        self.gate.submit(shift)
    }

    /// Admit a posting and immediately run its first round.
    ///
    /// A directory outage during that first round does not fail the
    /// submission; the round is deferred to the next tick.
    pub async fn submit_and_trigger(&self, shift: Shift) -> FanoutResult<SubmitOutcome> {
        let shift_id = shift.id.clone();
        let outcome = self.gate.submit(shift)?;
        if !outcome.is_admitted() {
            return Ok(outcome);
        }

        match self.process_shift(&shift_id).await {
            Ok(round) => debug!(shift_id = %shift_id, ?round, "Initial round finished"),
            Err(e) if e.is_retryable() => {
                debug!(shift_id = %shift_id, error = %e, "Initial round deferred")
            }
            Err(e) => return Err(e),
        }
        Ok(outcome)
    }

    /// Run a round for one shift if it is due.
    pub async fn process_shift(&self, shift_id: &ShiftId) -> FanoutResult<RoundOutcome> {
        let entry = self
            .store
            .get(shift_id)?
            .ok_or_else(|| FanoutError::UnknownShift {
                shift_id: shift_id.clone(),
            })?;
        self.run_round(&entry).await
    }

    /// Evaluate every non-terminal shift, each in its own task.
    ///
    /// A slow directory or gateway call for one shift does not hold up the
    /// others. The returned future completes once every evaluation has.
    pub async fn tick(self: &Arc<Self>) -> FanoutResult<TickReport> {
        let entries = self.store.active_entries()?;
        debug!(active = entries.len(), "Scheduler tick");

        let handles: Vec<_> = entries
            .into_iter()
            .map(|entry| {
                let engine = Arc::clone(self);
                tokio::spawn(async move { engine.run_round(&entry).await })
            })
            .collect();

        let mut report = TickReport::default();
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(result) => report.record(&result),
                Err(e) => {
                    warn!(error = %e, "Shift evaluation task panicked");
                    report.evaluated += 1;
                    report.failed += 1;
                }
            }
        }

        if report.dispatched + report.exhausted + report.deferred + report.failed > 0 {
            info!(
                evaluated = report.evaluated,
                dispatched = report.dispatched,
                exhausted = report.exhausted,
                deferred = report.deferred,
                failed = report.failed,
                "Tick complete"
            );
        }
        Ok(report)
    }

    /// A caregiver claims the shift.
    pub fn accept(&self, shift_id: &ShiftId, caregiver: CaregiverId) -> FanoutResult<AcceptOutcome> {
        let Some(entry) = self.store.get(shift_id)? else {
            return Ok(AcceptOutcome::NotFound);
        };

        let now = self.clock.now();
        let outcome = entry.with_state(|state| state.resolve(caregiver, now))?;

        match &outcome {
            AcceptOutcome::Resolved { caregiver_id } => {
                info!(shift_id = %shift_id, caregiver_id = %caregiver_id, "Shift resolved");
                self.bus.publish(FanoutEvent::ShiftResolved {
                    shift_id: shift_id.clone(),
                    caregiver_id: caregiver_id.clone(),
                    timestamp: now,
                });
            }
            AcceptOutcome::AlreadyFinal { status, .. } => {
                debug!(shift_id = %shift_id, status = %status, "Accept on final shift ignored");
            }
            AcceptOutcome::NotFound => {}
        }
        Ok(outcome)
    }

    /// Current status of a shift.
    pub fn get_status(&self, shift_id: &ShiftId) -> FanoutResult<ShiftStatusView> {
        self.state(shift_id).map(ShiftStatusView::from)
    }

    /// Full state snapshot, including round history.
    pub fn state(&self, shift_id: &ShiftId) -> FanoutResult<ShiftFanoutState> {
        let entry = self.entry(shift_id)?;
        Ok(entry.snapshot()?)
    }

    /// The posting that was admitted under `shift_id`.
    pub fn shift(&self, shift_id: &ShiftId) -> FanoutResult<Shift> {
        Ok(self.entry(shift_id)?.shift().clone())
    }

    /// Every shift's status, sorted by id.
    pub fn list_statuses(&self) -> FanoutResult<Vec<ShiftStatusView>> {
        Ok(self
            .store
            .list_states()?
            .into_iter()
            .map(ShiftStatusView::from)
            .collect())
    }

    fn entry(&self, shift_id: &ShiftId) -> FanoutResult<Arc<ShiftEntry>> {
        self.store
            .get(shift_id)?
            .ok_or_else(|| FanoutError::UnknownShift {
                shift_id: shift_id.clone(),
            })
    }

    async fn run_round(&self, entry: &ShiftEntry) -> FanoutResult<RoundOutcome> {
        let shift_id = entry.id().clone();

        let Some(_round_guard) = entry.try_begin_round() else {
            debug!(shift_id = %shift_id, "Round already in flight, skipping");
            return Ok(RoundOutcome::Busy);
        };

        let now = self.clock.now();
        match entry.with_state(|state| self.decisions.check_due(state, now))? {
            DueCheck::Due => {}
            DueCheck::CoolingDown { next_due_at } => {
                return Ok(RoundOutcome::NotDue { next_due_at });
            }
            DueCheck::Terminal { status } => return Ok(RoundOutcome::Skipped { status }),
        }

        let role = &entry.shift().required_role;
        let eligible = match self.directory.find_eligible(role).await {
            Ok(eligible) => eligible,
            Err(e) => {
                warn!(shift_id = %shift_id, role = %role, error = %e, "Round deferred");
                self.bus.publish(FanoutEvent::RoundDeferred {
                    shift_id: shift_id.clone(),
                    reason: e.to_string(),
                    timestamp: now,
                });
                return Err(FanoutError::DirectoryUnavailable {
                    shift_id,
                    message: e.to_string(),
                });
            }
        };

        // Planned against fresh state: an accept may have landed during the lookup
        let decision = entry.with_state(|state| self.decisions.plan_round(state, &eligible))?;

        let (round, channel, candidates) = match decision {
            RoundDecision::Skip { status } => return Ok(RoundOutcome::Skipped { status }),
            RoundDecision::Exhaust { rounds } => {
                if entry.with_state(|state| self.decisions.exhaust(state))? {
                    self.announce_exhausted(&shift_id, rounds, now);
                }
                return Ok(RoundOutcome::Exhausted { rounds });
            }
            RoundDecision::Dispatch {
                round,
                channel,
                candidates,
            } => (round, channel, candidates),
        };

        let (sent, failed) = self.dispatch(entry.shift(), round, channel, candidates).await;

        let commit = RoundCommit {
            round,
            channel,
            sent: sent.clone(),
            failed: failed.clone(),
        };
        match entry.with_state(|state| self.decisions.commit_round(state, commit, now))? {
            CommitOutcome::Applied { status } => {
                info!(
                    shift_id = %shift_id,
                    round,
                    channel = %channel,
                    sent = sent.len(),
                    failed = failed.len(),
                    status = %status,
                    "Round dispatched"
                );
                self.bus.publish(FanoutEvent::RoundDispatched {
                    shift_id: shift_id.clone(),
                    round,
                    channel,
                    sent: sent.clone(),
                    failed: failed.clone(),
                    timestamp: now,
                });
                if status == FanoutStatus::Exhausted {
                    self.announce_exhausted(&shift_id, round, now);
                }
                Ok(RoundOutcome::Dispatched {
                    round,
                    channel,
                    sent,
                    failed,
                    status,
                })
            }
            CommitOutcome::Discarded { status } => {
                info!(shift_id = %shift_id, round, status = %status, "Round discarded, shift went final during dispatch");
                Ok(RoundOutcome::Discarded { status })
            }
            CommitOutcome::Stale { round_count } => {
                warn!(shift_id = %shift_id, round, round_count, "Stale round commit rejected");
                Ok(RoundOutcome::Superseded { round_count })
            }
        }
    }

    /// Notify every candidate concurrently. Returns (sent, failed), sorted.
    async fn dispatch(
        &self,
        shift: &Shift,
        round: u32,
        channel: ContactChannel,
        candidates: BTreeSet<CaregiverId>,
    ) -> (Vec<CaregiverId>, Vec<CaregiverId>) {
        let mut join_set: JoinSet<(CaregiverId, DeliveryOutcome)> = JoinSet::new();

        for caregiver_id in &candidates {
            let gateway = Arc::clone(&self.gateway);
            let notification = Notification::new(shift, caregiver_id.clone(), round, channel);
            join_set.spawn(async move {
                let outcome = gateway.notify(&notification).await;
                (notification.caregiver_id, outcome)
            });
        }

        let mut pending = candidates;
        let mut sent = BTreeSet::new();
        let mut failed = BTreeSet::new();

        while let Some(res) = join_set.join_next().await {
            match res {
                Ok((caregiver_id, DeliveryOutcome::Sent)) => {
                    pending.remove(&caregiver_id);
                    sent.insert(caregiver_id);
                }
                Ok((caregiver_id, DeliveryOutcome::Failed { reason })) => {
                    let err = FanoutError::DeliveryFailed {
                        shift_id: shift.id.clone(),
                        caregiver_id: caregiver_id.clone(),
                        message: reason,
                    };
                    warn!(error = %err, "Notification not delivered");
                    pending.remove(&caregiver_id);
                    failed.insert(caregiver_id);
                }
                Err(e) => {
                    warn!(shift_id = %shift.id, error = %e, "Notification task panicked");
                }
            }
        }

        // Tasks that panicked never reported back
        failed.extend(pending);

        (sent.into_iter().collect(), failed.into_iter().collect())
    }

    fn announce_exhausted(&self, shift_id: &ShiftId, rounds: u32, now: DateTime<Utc>) {
        info!(shift_id = %shift_id, rounds, "Shift exhausted");
        self.bus.publish(FanoutEvent::ShiftExhausted {
            shift_id: shift_id.clone(),
            rounds,
            timestamp: now,
        });
    }
}
