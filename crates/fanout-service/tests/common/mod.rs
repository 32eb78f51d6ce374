#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;

use fanout_core::{CaregiverId, FanoutConfig, ManualClock, Role, Shift};
use fanout_service::{
    CaregiverDirectory, DeliveryOutcome, DirectoryError, FanoutEngine, Notification,
    NotificationGateway, SharedFanoutEngine,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

pub fn ids(names: &[&str]) -> BTreeSet<CaregiverId> {
    names.iter().map(|n| CaregiverId::new(*n)).collect()
}

pub fn rn_shift(id: &str) -> Shift {
    Shift::new(id, "RN", t0() + chrono::Duration::days(1))
}

/// Directory answering from a mutable role map.
#[derive(Default)]
pub struct ScriptedDirectory {
    roles: Mutex<BTreeMap<Role, BTreeSet<CaregiverId>>>,
    down: AtomicBool,
    /// Roles whose lookups wait on `release` before answering
    held: Mutex<BTreeSet<Role>>,
    release: Notify,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_role(&self, role: &str, names: &[&str]) {
        self.roles.lock().unwrap().insert(Role::new(role), ids(names));
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn hold(&self, role: &str) {
        self.held.lock().unwrap().insert(Role::new(role));
    }

    pub fn release_all(&self) {
        self.held.lock().unwrap().clear();
        self.release.notify_waiters();
    }
}

#[async_trait]
impl CaregiverDirectory for ScriptedDirectory {
    async fn find_eligible(&self, role: &Role) -> Result<BTreeSet<CaregiverId>, DirectoryError> {
        loop {
            let released = self.release.notified();
            if !self.held.lock().unwrap().contains(role) {
                break;
            }
            released.await;
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("connection refused".to_string()));
        }
        Ok(self
            .roles
            .lock()
            .unwrap()
            .get(role)
            .cloned()
            .unwrap_or_default())
    }
}

/// Gateway that records every call and fails for chosen caregivers.
#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<Notification>>,
    failing: Mutex<BTreeSet<CaregiverId>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, names: &[&str]) {
        *self.failing.lock().unwrap() = ids(names);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<Notification> {
        self.calls.lock().unwrap().clone()
    }

    /// Caregivers notified for `round`, sorted
    pub fn recipients(&self, round: u32) -> BTreeSet<CaregiverId> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.round == round)
            .map(|n| n.caregiver_id.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn notify(&self, notification: &Notification) -> DeliveryOutcome {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(notification.clone());
        if self.failing.lock().unwrap().contains(&notification.caregiver_id) {
            DeliveryOutcome::failed("carrier rejected")
        } else {
            DeliveryOutcome::Sent
        }
    }
}

pub struct Harness {
    pub engine: SharedFanoutEngine,
    pub directory: Arc<ScriptedDirectory>,
    pub gateway: Arc<RecordingGateway>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(FanoutConfig::default())
    }

    pub fn with_config(config: FanoutConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let directory = Arc::new(ScriptedDirectory::new());
        let gateway = Arc::new(RecordingGateway::new());
        let clock = ManualClock::new(t0()).shared();
        let engine = FanoutEngine::new(config, directory.clone(), gateway.clone())
            .with_clock(clock.clone())
            .shared();
        Self {
            engine,
            directory,
            gateway,
            clock,
        }
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.clock.advance(chrono::Duration::minutes(minutes));
    }
}
