//! Fanout configuration
//!
//! Defaults, then an optional TOML file, then `FANOUT_*` environment
//! variables. The binary layers CLI flags on top.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Recognized options for the escalation engine and scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct FanoutConfig {
    /// Minimum time between the start of one round and the next
    pub cooldown_window: Duration,
    /// Ceiling on rounds per shift
    pub max_rounds: u32,
    /// Scheduler period
    pub tick_interval: Duration,
    /// Re-offer the shift to caregivers whose delivery failed earlier
    pub retry_failed_deliveries: bool,
    /// Last round that still uses SMS; later rounds place calls
    pub call_after_round: u32,
    /// Broadcast channel capacity for fanout events
    pub event_capacity: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            cooldown_window: Duration::from_secs(10 * 60),
            max_rounds: 2,
            tick_interval: Duration::from_secs(60),
            retry_failed_deliveries: true,
            call_after_round: 1,
            event_capacity: 256,
        }
    }
}

/// On-disk shape; every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    cooldown_secs: Option<u64>,
    max_rounds: Option<u32>,
    tick_secs: Option<u64>,
    retry_failed_deliveries: Option<bool>,
    call_after_round: Option<u32>,
    event_capacity: Option<usize>,
}

impl FanoutConfig {
    /// Defaults overridden by `FANOUT_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Parse a TOML document over the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(raw)?;
        let mut config = Self::default();
        config.apply_file(file);
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then apply environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(secs) = file.cooldown_secs {
            self.cooldown_window = Duration::from_secs(secs);
        }
        if let Some(n) = file.max_rounds {
            self.max_rounds = n;
        }
        if let Some(secs) = file.tick_secs {
            self.tick_interval = Duration::from_secs(secs);
        }
        if let Some(val) = file.retry_failed_deliveries {
            self.retry_failed_deliveries = val;
        }
        if let Some(n) = file.call_after_round {
            self.call_after_round = n;
        }
        if let Some(n) = file.event_capacity {
            self.event_capacity = n;
        }
    }

    fn apply_env(&mut self) {
        if let Some(secs) = env_parse::<u64>("FANOUT_COOLDOWN_SECS") {
            self.cooldown_window = Duration::from_secs(secs);
        }
        if let Some(n) = env_parse::<u32>("FANOUT_MAX_ROUNDS") {
            self.max_rounds = n;
        }
        if let Some(secs) = env_parse::<u64>("FANOUT_TICK_SECS") {
            self.tick_interval = Duration::from_secs(secs);
        }
        if let Ok(val) = std::env::var("FANOUT_RETRY_FAILED") {
            self.retry_failed_deliveries = val.to_lowercase() == "true" || val == "1";
        }
        if let Some(n) = env_parse::<u32>("FANOUT_CALL_AFTER_ROUND") {
            self.call_after_round = n;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::Invalid {
                message: "max_rounds must be at least 1".to_string(),
            });
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid {
                message: "tick interval must be non-zero".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                message: "event_capacity must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Cooldown as a chrono duration for timestamp arithmetic
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.cooldown_window)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = FanoutConfig::default();
        assert_eq!(config.cooldown_window, Duration::from_secs(600));
        assert_eq!(config.max_rounds, 2);
        assert_eq!(config.tick_interval, Duration::from_secs(60));
        assert!(config.retry_failed_deliveries);
        assert_eq!(config.cooldown(), chrono::Duration::minutes(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_subset() {
        let config = FanoutConfig::from_toml_str("max_rounds = 4\ncooldown_secs = 30\n").unwrap();
        assert_eq!(config.max_rounds, 4);
        assert_eq!(config.cooldown_window, Duration::from_secs(30));
        assert_eq!(config.tick_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_toml_rejects_zero_rounds() {
        let err = FanoutConfig::from_toml_str("max_rounds = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        let err = FanoutConfig::from_toml_str("max_round = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tick_secs = 5").unwrap();
        writeln!(file, "retry_failed_deliveries = false").unwrap();

        let config = FanoutConfig::from_file(file.path()).unwrap();
        assert_eq!(config.tick_interval, Duration::from_secs(5));
        assert!(!config.retry_failed_deliveries);
    }
}
