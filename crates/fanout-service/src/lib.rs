//! Shift fanout service
//!
//! Async runtime around `fanout-core`: the ingestion gate, the round runner
//! that talks to the caregiver directory and the notification gateway, the
//! periodic scheduler, and inbound reply handling.

pub mod collaborators;
pub mod engine;
pub mod gate;
pub mod inbound;
pub mod roster;
pub mod scheduler;

pub use collaborators::{
    CaregiverDirectory, DeliveryOutcome, DirectoryError, Notification, NotificationGateway,
};
pub use engine::{FanoutEngine, RoundOutcome, SharedFanoutEngine, ShiftStatusView, TickReport};
pub use gate::{IngestionGate, SubmitOutcome, SubmitReceipt};
pub use inbound::{InboundReply, ReplyError, ReplyHandler, ReplyOutcome, ReplyStatus};
pub use roster::{Caregiver, LoggingGateway, Roster, RosterData, RosterError};
pub use scheduler::Scheduler;
