//! Escalation: per-shift fanout state and the round decision engine
//!
//! - **State** (`state.rs`): `ShiftFanoutState`, the forward-only
//!   `FanoutStatus` machine, round history and resolution.
//! - **Engine** (`engine.rs`): cooldown checks, candidate selection,
//!   exhaustion detection and round commits.

pub mod engine;
pub mod state;

pub use engine::{CommitOutcome, DueCheck, EscalationEngine, RoundCommit, RoundDecision};
pub use state::{AcceptOutcome, FanoutStatus, RoundRecord, ShiftFanoutState};
