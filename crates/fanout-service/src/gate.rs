//! Ingestion Gate: the idempotency boundary for shift postings

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fanout_core::{
    Admission, FanoutError, FanoutEvent, FanoutResult, Role, SharedClock, SharedEventBus,
    SharedFanoutStore, Shift, ShiftId,
};

/// Result of a posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Admitted,
    DuplicateIgnored,
}

impl SubmitOutcome {
    pub fn is_admitted(self) -> bool {
        self == Self::Admitted
    }
}

/// Caller-facing acknowledgement for `submit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub admitted: bool,
}

impl From<SubmitOutcome> for SubmitReceipt {
    fn from(outcome: SubmitOutcome) -> Self {
        Self {
            admitted: outcome.is_admitted(),
        }
    }
}

/// Admits each shift id at most once for the lifetime of the store.
#[derive(Clone)]
pub struct IngestionGate {
    store: SharedFanoutStore,
    clock: SharedClock,
    bus: SharedEventBus,
    max_rounds: u32,
}

impl IngestionGate {
    pub fn new(
        store: SharedFanoutStore,
        clock: SharedClock,
        bus: SharedEventBus,
        max_rounds: u32,
    ) -> Self {
        Self {
            store,
            clock,
            bus,
            max_rounds,
        }
    }

    /// Admit `shift` unless its id was seen before.
    ///
    /// # Errors
    ///
    /// `InvalidShift` for a blank id; `Store` if the store lock is poisoned.
    /// A duplicate is not an error.
    pub fn submit(&self, shift: Shift) -> FanoutResult<SubmitOutcome> {
        if shift.id.is_blank() {
            return Err(FanoutError::InvalidShift {
                message: "shift id must be non-empty".to_string(),
            });
        }

        let shift_id = shift.id.clone();
        let now = self.clock.now();

        match self.store.admit(shift, self.max_rounds, now)? {
            Admission::Admitted(_) => {
                info!(shift_id = %shift_id, max_rounds = self.max_rounds, "Shift admitted");
                self.bus.publish(FanoutEvent::ShiftAdmitted {
                    shift_id,
                    timestamp: now,
                });
                Ok(SubmitOutcome::Admitted)
            }
            Admission::Duplicate => {
                debug!(shift_id = %shift_id, "Duplicate shift ignored");
                self.bus.publish(FanoutEvent::DuplicateIgnored {
                    shift_id,
                    timestamp: now,
                });
                Ok(SubmitOutcome::DuplicateIgnored)
            }
        }
    }

    /// Like [`submit`](Self::submit), for callers that treat a repeat as a
    /// failure.
    ///
    /// # Errors
    ///
    /// `DuplicateShift` if the id was already admitted, plus the errors of
    /// `submit`.
    pub fn submit_unique(&self, shift: Shift) -> FanoutResult<()> {
        let shift_id = shift.id.clone();
        match self.submit(shift)? {
            SubmitOutcome::Admitted => Ok(()),
            SubmitOutcome::DuplicateIgnored => Err(FanoutError::DuplicateShift { shift_id }),
        }
    }

    /// Field-wise form of [`submit`](Self::submit).
    pub fn submit_posting(
        &self,
        shift_id: impl Into<ShiftId>,
        required_role: impl Into<Role>,
        scheduled_at: DateTime<Utc>,
        metadata: BTreeMap<String, String>,
    ) -> FanoutResult<SubmitReceipt> {
        let mut shift = Shift::new(shift_id, required_role, scheduled_at);
        shift.metadata = metadata;
        self.submit(shift).map(SubmitReceipt::from)
    }
}
