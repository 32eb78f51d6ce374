//! Periodic tick driver
//!
//! Fires `FanoutEngine::tick` every `tick_interval` until cancelled. Ticks are
//! spawned rather than awaited in line, so one slow shift never delays the
//! next tick for the others; the per-shift round guard keeps overlapping
//! ticks from running the same shift twice.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{SharedFanoutEngine, TickReport};

/// `tokio::time::interval` panics on a zero period
const MIN_INTERVAL: Duration = Duration::from_millis(1);

pub struct Scheduler {
    engine: SharedFanoutEngine,
    interval: Duration,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(engine: SharedFanoutEngine) -> Self {
        let interval = engine.config().tick_interval;
        Self::with_interval(engine, interval)
    }

    /// Periods below one millisecond are raised to one millisecond.
    pub fn with_interval(engine: SharedFanoutEngine, interval: Duration) -> Self {
        Self {
            engine,
            interval: interval.max(MIN_INTERVAL),
            cancel: CancellationToken::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled, then wait for in-flight ticks.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    let engine = Arc::clone(&self.engine);
                    ticks.spawn(async move { run_tick(&engine).await });
                }
            }

            // Reap finished ticks so the set does not grow
            while let Some(res) = ticks.try_join_next() {
                if let Err(e) = res {
                    warn!(error = %e, "Tick task panicked");
                }
            }
        }

        debug!(in_flight = ticks.len(), "Scheduler stopping");
        while let Some(res) = ticks.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "Tick task panicked");
            }
        }
        info!("Scheduler stopped");
    }
}

async fn run_tick(engine: &SharedFanoutEngine) {
    match engine.tick().await {
        Ok(TickReport { evaluated, .. }) => debug!(evaluated, "Tick finished"),
        Err(e) => warn!(error = %e, "Tick failed"),
    }
}
