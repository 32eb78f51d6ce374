//! Shift Fanout Core
//!
//! Deterministic building blocks for notifying caregivers about open shifts:
//! - Shift and caregiver identifiers, contact channels
//! - Per-shift fanout state with a forward-only status machine
//! - Escalation decisions (cooldown, round ceiling, candidate selection)
//! - The fanout store with an atomic dedup set
//! - Fanout events and a broadcast event bus
//! - Reply intent parsing for inbound caregiver messages
//!
//! Nothing in this crate talks to the network. The async runtime that queries
//! the caregiver directory and dispatches notifications lives in `fanout-service`.
//!
//! # Usage
//!
//! ```ignore
//! use fanout_core::{EscalationEngine, FanoutConfig, FanoutStore, Shift};
//!
//! let config = FanoutConfig::from_env();
//! let store = FanoutStore::new().shared();
//! let shift = Shift::new("s1", "RN", Utc::now());
//! store.admit(shift, config.max_rounds, Utc::now())?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod clock;
pub mod config;
pub mod error;
pub mod escalation;
pub mod events;
pub mod replies;
pub mod shift;
pub mod store;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{ConfigError, FanoutConfig};
pub use error::{FanoutError, FanoutResult};
pub use escalation::{
    AcceptOutcome, CommitOutcome, DueCheck, EscalationEngine, FanoutStatus, RoundCommit,
    RoundDecision, RoundRecord, ShiftFanoutState,
};
pub use events::{EventBusError, FanoutEvent, FanoutEventBus, SharedEventBus, ShiftReceiver};
pub use replies::{parse_reply_intent, ReplyIntent};
pub use shift::{CaregiverId, ContactChannel, Role, Shift, ShiftId};
pub use store::{Admission, FanoutStore, SharedFanoutStore, ShiftEntry, StoreError};
