//! Shift model and identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque shift identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShiftId(String);

impl ShiftId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank identifiers are rejected at ingestion.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ShiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShiftId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ShiftId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Caregiver identifier as reported by the directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaregiverId(String);

impl CaregiverId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaregiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaregiverId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CaregiverId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Role tag a caregiver must hold to be eligible (e.g. `RN`, `LPN`, `CNA`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An open shift as posted. Immutable once admitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub required_role: Role,
    pub scheduled_at: DateTime<Utc>,
    /// Display metadata (organization, end time, notes). Never read by the engine.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Shift {
    pub fn new(
        id: impl Into<ShiftId>,
        required_role: impl Into<Role>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            required_role: required_role.into(),
            scheduled_at,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Medium used for a dispatch. Early rounds text, later rounds call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactChannel {
    Sms,
    Call,
}

impl ContactChannel {
    /// Channel for a 1-indexed round given the last round that still uses SMS.
    pub fn for_round(round: u32, call_after_round: u32) -> Self {
        if round <= call_after_round {
            Self::Sms
        } else {
            Self::Call
        }
    }
}

impl fmt::Display for ContactChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sms => write!(f, "sms"),
            Self::Call => write!(f, "call"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_shift_id() {
        assert!(ShiftId::new("").is_blank());
        assert!(ShiftId::new("   ").is_blank());
        assert!(!ShiftId::new("s1").is_blank());
    }

    #[test]
    fn test_channel_escalates_after_first_round() {
        assert_eq!(ContactChannel::for_round(1, 1), ContactChannel::Sms);
        assert_eq!(ContactChannel::for_round(2, 1), ContactChannel::Call);
        assert_eq!(ContactChannel::for_round(2, 2), ContactChannel::Sms);
        assert_eq!(ContactChannel::for_round(1, 0), ContactChannel::Call);
    }

    #[test]
    fn test_shift_serializes_ids_transparently() {
        let shift = Shift::new("s1", "RN", Utc::now()).with_metadata("organization_id", "org1");
        let json = serde_json::to_value(&shift).unwrap();
        assert_eq!(json["id"], "s1");
        assert_eq!(json["required_role"], "RN");
        assert_eq!(json["metadata"]["organization_id"], "org1");
    }
}
