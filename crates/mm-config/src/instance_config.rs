use crate::{
    ACTIVATION_DIRNAME, ConfigError, ConfigErrorResult, DEFAULT_APP_ID,
    DEFAULT_HANDSHAKE_TIMEOUT_MS, LOCK_FILENAME,
};

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Single-instance arbitration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Application identifier; names the per-application support directory
    pub app_id: String,
    /// Overrides `<data_dir>/<app_id>` as the support directory
    pub app_dir: Option<PathBuf>,
    /// How long a launching instance waits for an "already running" reply
    pub handshake_timeout_ms: u64,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            app_id: String::from(DEFAULT_APP_ID),
            app_dir: None,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
        }
    }
}

impl InstanceConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        let app_id = self.app_id.trim();
        if app_id.is_empty() {
            return Err(ConfigError::instance("instance.app_id cannot be empty"));
        }

        if app_id.contains(['/', '\\']) || app_id.contains("..") {
            return Err(ConfigError::instance(format!(
                "instance.app_id must be a plain identifier, got '{}'",
                self.app_id
            )));
        }

        if self.handshake_timeout_ms == 0 {
            return Err(ConfigError::instance(
                "instance.handshake_timeout_ms must be > 0",
            ));
        }

        Ok(())
    }

    /// Per-application support directory (`<app-support-dir>/<app-id>`).
    pub fn app_dir(&self) -> ConfigErrorResult<PathBuf> {
        if let Some(ref dir) = self.app_dir {
            return Ok(dir.clone());
        }

        dirs::data_dir()
            .map(|dir| dir.join(&self.app_id))
            .ok_or(ConfigError::NoHomeDir)
    }

    pub fn lock_path(&self) -> ConfigErrorResult<PathBuf> {
        Ok(self.app_dir()?.join(LOCK_FILENAME))
    }

    /// Rendezvous directory for the activation handshake sockets.
    pub fn activation_dir(&self) -> ConfigErrorResult<PathBuf> {
        Ok(self.app_dir()?.join(ACTIVATION_DIRNAME))
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}
