//! In-memory roster and a logging notification gateway
//!
//! Backs the binary when no real directory or SMS provider is configured.
//! The roster is read from a JSON file shaped like:
//!
//! ```json
//! {
//!   "caregivers": [{"id": "c1", "name": "Ana", "role": "RN", "phone": "+15550001"}],
//!   "shifts": [{"id": "s1", "organization_id": "org1", "role_required": "RN",
//!               "start_time": "2025-01-01T08:00:00Z", "end_time": "2025-01-01T16:00:00Z"}]
//! }
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use fanout_core::{CaregiverId, ContactChannel, Role, Shift};

use crate::collaborators::{
    CaregiverDirectory, DeliveryOutcome, DirectoryError, Notification, NotificationGateway,
};

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to read roster file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse roster: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate caregiver id: {0}")]
    DuplicateCaregiver(CaregiverId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caregiver {
    pub id: CaregiverId,
    pub name: String,
    pub role: Role,
    pub phone: String,
}

/// A shift as it appears in the roster file
#[derive(Debug, Clone, Deserialize)]
struct ShiftRecord {
    id: String,
    organization_id: String,
    role_required: Role,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl From<ShiftRecord> for Shift {
    fn from(record: ShiftRecord) -> Self {
        Shift::new(record.id, record.role_required, record.start_time)
            .with_metadata("organization_id", record.organization_id)
            .with_metadata("end_time", record.end_time.to_rfc3339())
    }
}

#[derive(Debug, Deserialize)]
struct RosterFile {
    caregivers: Vec<Caregiver>,
    #[serde(default)]
    shifts: Vec<ShiftRecord>,
}

/// Caregivers plus the shifts that came with them.
#[derive(Debug)]
pub struct RosterData {
    pub roster: Roster,
    pub shifts: Vec<Shift>,
}

/// Fixed set of caregivers. Can be switched offline to simulate an outage.
#[derive(Debug)]
pub struct Roster {
    caregivers: Vec<Caregiver>,
    available: AtomicBool,
}

impl Roster {
    /// Phone numbers are stored trimmed, matching `find_by_phone`.
    pub fn new(mut caregivers: Vec<Caregiver>) -> Result<Self, RosterError> {
        for caregiver in &mut caregivers {
            let trimmed = caregiver.phone.trim();
            if trimmed.len() != caregiver.phone.len() {
                caregiver.phone = trimmed.to_string();
            }
        }

        let mut seen = BTreeSet::new();
        for caregiver in &caregivers {
            if !seen.insert(&caregiver.id) {
                return Err(RosterError::DuplicateCaregiver(caregiver.id.clone()));
            }
        }
        Ok(Self {
            caregivers,
            available: AtomicBool::new(true),
        })
    }

    pub fn from_json_str(raw: &str) -> Result<RosterData, RosterError> {
        let file: RosterFile = serde_json::from_str(raw)?;
        Ok(RosterData {
            roster: Self::new(file.caregivers)?,
            shifts: file.shifts.into_iter().map(Shift::from).collect(),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<RosterData, RosterError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn caregivers(&self) -> &[Caregiver] {
        &self.caregivers
    }

    pub fn get(&self, id: &CaregiverId) -> Option<&Caregiver> {
        self.caregivers.iter().find(|c| &c.id == id)
    }

    pub fn find_by_phone(&self, phone: &str) -> Option<&Caregiver> {
        let phone = phone.trim();
        self.caregivers.iter().find(|c| c.phone == phone)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaregiverDirectory for Roster {
    async fn find_eligible(&self, role: &Role) -> Result<BTreeSet<CaregiverId>, DirectoryError> {
        if !self.is_available() {
            return Err(DirectoryError::Unavailable("roster offline".to_string()));
        }
        Ok(self
            .caregivers
            .iter()
            .filter(|c| &c.role == role)
            .map(|c| c.id.clone())
            .collect())
    }
}

/// Gateway that writes each offer to the log instead of sending it.
#[derive(Debug)]
pub struct LoggingGateway {
    roster: Arc<Roster>,
    delivered: AtomicUsize,
}

impl LoggingGateway {
    pub fn new(roster: Arc<Roster>) -> Self {
        Self {
            roster,
            delivered: AtomicUsize::new(0),
        }
    }

    /// Offers "sent" so far
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    fn message(notification: &Notification) -> String {
        match notification.channel {
            ContactChannel::Sms => format!(
                "New {} shift available on {}. ID: {}. Reply YES to claim.",
                notification.role,
                notification.scheduled_at.format("%Y-%m-%d %H:%M UTC"),
                notification.shift_id
            ),
            ContactChannel::Call => format!(
                "Urgent: {} shift {} on {} still needs cover.",
                notification.role,
                notification.shift_id,
                notification.scheduled_at.format("%Y-%m-%d %H:%M UTC"),
            ),
        }
    }
}

#[async_trait]
impl NotificationGateway for LoggingGateway {
    async fn notify(&self, notification: &Notification) -> DeliveryOutcome {
        let Some(caregiver) = self.roster.get(&notification.caregiver_id) else {
            return DeliveryOutcome::failed("caregiver not on roster");
        };
        if caregiver.phone.is_empty() {
            return DeliveryOutcome::failed("no phone number on file");
        }

        info!(
            channel = %notification.channel,
            phone = %caregiver.phone,
            shift_id = %notification.shift_id,
            round = notification.round,
            message = %Self::message(notification),
            "Notification sent"
        );
        self.delivered.fetch_add(1, Ordering::SeqCst);
        DeliveryOutcome::Sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "caregivers": [
            {"id": "c1", "name": "Ana", "role": "RN", "phone": "+15550001"},
            {"id": "c2", "name": "Ben", "role": "RN", "phone": ""},
            {"id": "c3", "name": "Cho", "role": "LPN", "phone": "+15550003"}
        ],
        "shifts": [
            {"id": "s1", "organization_id": "org1", "role_required": "RN",
             "start_time": "2025-01-01T08:00:00Z", "end_time": "2025-01-01T16:00:00Z"}
        ]
    }"#;

    #[test]
    fn test_load_caregivers_and_shifts() {
        let data = Roster::from_json_str(SAMPLE).unwrap();
        assert_eq!(data.roster.caregivers().len(), 3);
        assert_eq!(data.shifts.len(), 1);

        let shift = &data.shifts[0];
        assert_eq!(shift.id.as_str(), "s1");
        assert_eq!(shift.required_role.as_str(), "RN");
        assert_eq!(shift.metadata.get("organization_id").map(String::as_str), Some("org1"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let data = Roster::load(&path).unwrap();
        assert!(data.roster.find_by_phone(" +15550003 ").is_some());
        assert!(data.roster.find_by_phone("+19999999").is_none());
    }

    #[test]
    fn test_duplicate_caregiver_rejected() {
        let raw = r#"{"caregivers": [
            {"id": "c1", "name": "Ana", "role": "RN", "phone": "1"},
            {"id": "c1", "name": "Ann", "role": "RN", "phone": "2"}
        ]}"#;
        assert!(matches!(
            Roster::from_json_str(raw),
            Err(RosterError::DuplicateCaregiver(_))
        ));
    }

    #[tokio::test]
    async fn test_find_eligible_filters_role() {
        let roster = Roster::from_json_str(SAMPLE).unwrap().roster;
        let eligible = roster.find_eligible(&Role::new("RN")).await.unwrap();
        let ids: Vec<&str> = eligible.iter().map(|c| c.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_offline_roster_errors() {
        let roster = Roster::from_json_str(SAMPLE).unwrap().roster;
        roster.set_available(false);
        assert!(roster.find_eligible(&Role::new("RN")).await.is_err());
    }

    #[tokio::test]
    async fn test_logging_gateway_fails_without_phone() {
        let data = Roster::from_json_str(SAMPLE).unwrap();
        let shift = data.shifts[0].clone();
        let gateway = LoggingGateway::new(data.roster.shared());

        let ok = gateway
            .notify(&Notification::new(&shift, CaregiverId::new("c1"), 1, ContactChannel::Sms))
            .await;
        let no_phone = gateway
            .notify(&Notification::new(&shift, CaregiverId::new("c2"), 1, ContactChannel::Sms))
            .await;

        assert!(ok.is_sent());
        assert!(!no_phone.is_sent());
        assert_eq!(gateway.delivered(), 1);
    }

    #[test]
    fn test_stored_phone_is_trimmed() {
        let raw = r#"{"caregivers": [
            {"id": "c1", "name": "Ana", "role": "RN", "phone": " +15550001\n"}
        ]}"#;
        let roster = Roster::from_json_str(raw).unwrap().roster;

        assert_eq!(roster.caregivers()[0].phone, "+15550001");
        assert!(roster.find_by_phone("+15550001").is_some());
        assert!(roster.find_by_phone(" +15550001 ").is_some());
    }
}
