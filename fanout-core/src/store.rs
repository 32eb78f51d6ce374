//! In-memory fanout store
//!
//! Holds the dedup set and one `ShiftEntry` per admitted shift behind a single
//! lock, so check-and-insert of a shift id is one atomic step.
//!
//! Each entry carries two locks of its own:
//! - `state`: a short-lived std mutex around `ShiftFanoutState`. Never held
//!   across an `.await`.
//! - `round_guard`: an async mutex held for the whole of an in-flight round so
//!   two overlapping ticks can never both run a round for the same shift.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use crate::escalation::ShiftFanoutState;
use crate::shift::{Shift, ShiftId};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Shared reference to FanoutStore
pub type SharedFanoutStore = Arc<FanoutStore>;

/// Outcome of an admission attempt
#[derive(Debug, Clone)]
pub enum Admission {
    Admitted(Arc<ShiftEntry>),
    Duplicate,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

/// One admitted shift and its fanout state
#[derive(Debug)]
pub struct ShiftEntry {
    shift: Shift,
    state: Mutex<ShiftFanoutState>,
    round_guard: tokio::sync::Mutex<()>,
}

impl ShiftEntry {
    fn new(shift: Shift, max_rounds: u32, admitted_at: DateTime<Utc>) -> Self {
        let state = ShiftFanoutState::new(shift.id.clone(), max_rounds, admitted_at);
        Self {
            shift,
            state: Mutex::new(state),
            round_guard: tokio::sync::Mutex::new(()),
        }
    }

    pub fn shift(&self) -> &Shift {
        &self.shift
    }

    pub fn id(&self) -> &ShiftId {
        &self.shift.id
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> StoreResult<ShiftFanoutState> {
        self.with_state(|state| state.clone())
    }

    /// Run `f` with exclusive access to the state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ShiftFanoutState) -> R) -> StoreResult<R> {
        let mut state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&mut state))
    }

    /// Claim the right to run a round. `None` if another round is in flight.
    pub fn try_begin_round(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        self.round_guard.try_lock().ok()
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    /// Every shift id ever admitted. Never shrinks.
    dedup: HashSet<ShiftId>,
    entries: HashMap<ShiftId, Arc<ShiftEntry>>,
}

/// Process-wide fanout store
#[derive(Debug, Default)]
pub struct FanoutStore {
    inner: RwLock<StoreInner>,
}

impl FanoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedFanoutStore {
        Arc::new(self)
    }

    /// Atomically check the dedup set and, if the id is new, record it and
    /// create a `Pending` state.
    pub fn admit(
        &self,
        shift: Shift,
        max_rounds: u32,
        now: DateTime<Utc>,
    ) -> StoreResult<Admission> {
        let mut inner = self.inner.write().map_err(|_| StoreError::LockPoisoned)?;

        if !inner.dedup.insert(shift.id.clone()) {
            return Ok(Admission::Duplicate);
        }

        let id = shift.id.clone();
        let entry = Arc::new(ShiftEntry::new(shift, max_rounds, now));
        inner.entries.insert(id, entry.clone());
        Ok(Admission::Admitted(entry))
    }

    pub fn get(&self, shift_id: &ShiftId) -> StoreResult<Option<Arc<ShiftEntry>>> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.entries.get(shift_id).cloned())
    }

    /// Whether the id has ever been admitted
    pub fn seen(&self, shift_id: &ShiftId) -> StoreResult<bool> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.dedup.contains(shift_id))
    }

    /// Entries whose status is not terminal
    pub fn active_entries(&self) -> StoreResult<Vec<Arc<ShiftEntry>>> {
        let entries: Vec<Arc<ShiftEntry>> = {
            let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
            inner.entries.values().cloned().collect()
        };

        let mut active = Vec::with_capacity(entries.len());
        for entry in entries {
            if !entry.with_state(|s| s.is_terminal())? {
                active.push(entry);
            }
        }
        Ok(active)
    }

    /// Snapshots of every state, sorted by shift id
    pub fn list_states(&self) -> StoreResult<Vec<ShiftFanoutState>> {
        let entries: Vec<Arc<ShiftEntry>> = {
            let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
            inner.entries.values().cloned().collect()
        };

        let mut states = entries
            .iter()
            .map(|e| e.snapshot())
            .collect::<StoreResult<Vec<_>>>()?;
        states.sort_by(|a, b| a.shift_id.cmp(&b.shift_id));
        Ok(states)
    }

    pub fn len(&self) -> StoreResult<usize> {
        let inner = self.inner.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(inner.entries.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
