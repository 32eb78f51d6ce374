//! Shift fanout daemon
//!
//! Loads a roster file, posts its shifts, and escalates them on a fixed tick
//! until interrupted. Offers are written to the log rather than sent.
//!
//! # Usage
//!
//! ```bash
//! shift-fanout --roster sample_data.json
//!
//! # Faster escalation for a demo
//! shift-fanout --roster sample_data.json --cooldown-secs 20 --tick-secs 5
//!
//! # Configuration file plus env overrides
//! FANOUT_MAX_ROUNDS=3 shift-fanout --config fanout.toml --roster sample_data.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use fanout_core::FanoutConfig;
use fanout_service::{FanoutEngine, LoggingGateway, Roster, Scheduler};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Roster JSON with caregivers and open shifts
    #[arg(long, default_value = "sample_data.json")]
    roster: PathBuf,

    /// TOML configuration file (FANOUT_* env vars still apply on top)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds between rounds for the same shift (overrides FANOUT_COOLDOWN_SECS)
    #[arg(long)]
    cooldown_secs: Option<u64>,

    /// Maximum rounds per shift (overrides FANOUT_MAX_ROUNDS)
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Seconds between scheduler ticks (overrides FANOUT_TICK_SECS)
    #[arg(long)]
    tick_secs: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    run_for_secs: Option<u64>,
}

fn load_config(args: &Args) -> Result<FanoutConfig> {
    let mut config = match &args.config {
        Some(path) => FanoutConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => FanoutConfig::from_env(),
    };

    if let Some(secs) = args.cooldown_secs {
        config.cooldown_window = Duration::from_secs(secs);
    }
    if let Some(n) = args.max_rounds {
        config.max_rounds = n;
    }
    if let Some(secs) = args.tick_secs {
        config.tick_interval = Duration::from_secs(secs);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let data = Roster::load(&args.roster)
        .with_context(|| format!("loading roster from {}", args.roster.display()))?;
    let roster = data.roster.shared();
    let gateway = Arc::new(LoggingGateway::new(roster.clone()));

    info!(
        caregivers = roster.caregivers().len(),
        shifts = data.shifts.len(),
        cooldown_secs = config.cooldown_window.as_secs(),
        max_rounds = config.max_rounds,
        tick_secs = config.tick_interval.as_secs(),
        "Shift fanout starting"
    );

    let engine = FanoutEngine::new(config, roster.clone(), gateway.clone()).shared();

    for shift in data.shifts {
        let shift_id = shift.id.clone();
        if let Err(e) = engine.submit_and_trigger(shift).await {
            warn!(shift_id = %shift_id, error = %e, "Failed to post shift");
        }
    }

    let scheduler = Scheduler::new(engine.clone());
    let cancel = scheduler.cancellation_token();
    let handle = tokio::spawn(scheduler.run());

    match args.run_for_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                res = tokio::signal::ctrl_c() => res.context("waiting for Ctrl-C")?,
            }
        }
        None => tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?,
    }

    info!("Shutting down");
    cancel.cancel();
    handle.await.context("scheduler task failed")?;

    let statuses = engine.list_statuses()?;
    info!(notifications = gateway.delivered(), "Shift fanout stopped");
    println!(
        "{}",
        serde_json::to_string_pretty(&statuses).context("serializing shift statuses")?
    );

    Ok(())
}
