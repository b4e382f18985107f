//! Engine timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Timing knobs for the scheduler, element wait and notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period before a burst of navigation hints is handled.
    pub debounce_ms: u64,
    /// Upper bound on waiting for the media element to appear.
    pub element_timeout_ms: u64,
    /// Polling interval while waiting for the media element.
    pub poll_interval_ms: u64,
    /// Window after a toast is shown during which further toasts are dropped.
    pub notify_cooldown_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            element_timeout_ms: 10_000,
            poll_interval_ms: 100,
            notify_cooldown_ms: 1_000,
        }
    }
}

impl EngineConfig {
    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::Invalid("debounce_ms must be > 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.poll_interval_ms > self.element_timeout_ms {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms ({}) exceeds element_timeout_ms ({})",
                self.poll_interval_ms, self.element_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn notify_cooldown(&self) -> Duration {
        Duration::from_millis(self.notify_cooldown_ms)
    }
}
