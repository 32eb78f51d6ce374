//! Fanout error taxonomy
//!
//! Every failure here is scoped to one shift or one caregiver. None of them
//! stop the process or block progress on unrelated shifts. Callers can ask
//! `is_retryable()` / `code()` without string matching.
//!
//! | Variant              | Retryable | Mutates state |
//! |----------------------|-----------|---------------|
//! | DuplicateShift       | no        | no            |
//! | DirectoryUnavailable | yes       | no            |
//! | DeliveryFailed       | yes       | no            |
//! | UnknownShift         | no        | no            |
//! | AlreadyFinalShift    | no        | no            |
//! | InvalidShift         | no        | no            |

use thiserror::Error;

use crate::escalation::FanoutStatus;
use crate::shift::{CaregiverId, ShiftId};
use crate::store::StoreError;

/// Result type alias for fanout operations
pub type FanoutResult<T> = Result<T, FanoutError>;

#[derive(Debug, Error)]
pub enum FanoutError {
    /// Shift was already admitted once. Only `IngestionGate::submit_unique`
    /// raises this; plain `submit` reports `DuplicateIgnored` instead.
    #[error("Shift {shift_id} was already admitted")]
    DuplicateShift { shift_id: ShiftId },

    /// The caregiver directory could not be reached; the round is deferred.
    #[error("Caregiver directory unavailable for shift {shift_id}: {message}")]
    DirectoryUnavailable { shift_id: ShiftId, message: String },

    /// A single delivery failed; the caregiver stays eligible.
    #[error("Delivery to {caregiver_id} for shift {shift_id} failed: {message}")]
    DeliveryFailed {
        shift_id: ShiftId,
        caregiver_id: CaregiverId,
        message: String,
    },

    #[error("Unknown shift: {shift_id}")]
    UnknownShift { shift_id: ShiftId },

    #[error("Shift {shift_id} is already {status}")]
    AlreadyFinalShift {
        shift_id: ShiftId,
        status: FanoutStatus,
    },

    /// Posting rejected before touching the dedup set
    #[error("Invalid shift: {message}")]
    InvalidShift { message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl FanoutError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateShift { .. } => "DUPLICATE_SHIFT",
            Self::DirectoryUnavailable { .. } => "DIRECTORY_UNAVAILABLE",
            Self::DeliveryFailed { .. } => "DELIVERY_FAILED",
            Self::UnknownShift { .. } => "UNKNOWN_SHIFT",
            Self::AlreadyFinalShift { .. } => "ALREADY_FINAL_SHIFT",
            Self::InvalidShift { .. } => "INVALID_SHIFT",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// Transient failures that the next tick will retry on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DirectoryUnavailable { .. } | Self::DeliveryFailed { .. }
        )
    }
}
