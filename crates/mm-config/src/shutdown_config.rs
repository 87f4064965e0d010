use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_GRACE_PERIOD_MS, DEFAULT_KILL_WAIT_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_SIGNAL_FALLBACK,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing of the graceful -> forceful stop escalation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long the server may take to exit after the shutdown command
    pub grace_period_ms: u64,
    /// Liveness poll interval during the grace period
    pub poll_interval_ms: u64,
    /// How long to wait for the exit after the forced kill
    pub kill_wait_ms: u64,
    /// Send SIGTERM when the shutdown client is not installed
    pub signal_fallback: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            kill_wait_ms: DEFAULT_KILL_WAIT_MS,
            signal_fallback: DEFAULT_SIGNAL_FALLBACK,
        }
    }
}

impl ShutdownConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.grace_period_ms == 0 {
            return Err(ConfigError::shutdown("shutdown.grace_period_ms must be > 0"));
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::shutdown("shutdown.poll_interval_ms must be > 0"));
        }

        if self.poll_interval_ms > self.grace_period_ms {
            return Err(ConfigError::shutdown(format!(
                "shutdown.poll_interval_ms ({}) cannot exceed shutdown.grace_period_ms ({})",
                self.poll_interval_ms, self.grace_period_ms
            )));
        }

        if self.kill_wait_ms == 0 {
            return Err(ConfigError::shutdown("shutdown.kill_wait_ms must be > 0"));
        }

        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn kill_wait(&self) -> Duration {
        Duration::from_millis(self.kill_wait_ms)
    }
}
