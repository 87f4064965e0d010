use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_AUTO_START, DEFAULT_DATA_DIR, DEFAULT_LOG_PATH,
    DEFAULT_PORT,
};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings the supervisor consumes when launching `mongod`.
///
/// Changes take effect on the next start; a running server keeps the
/// values it was launched with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory passed as `--dbpath`
    pub data_dir: PathBuf,
    /// File passed as `--logpath` (opened in append mode)
    pub log_path: PathBuf,
    /// Port passed as `--port`
    pub port: u16,
    /// Start the server as soon as the application launches
    pub auto_start: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_default();

        Self {
            data_dir: home.join(DEFAULT_DATA_DIR),
            log_path: home.join(DEFAULT_LOG_PATH),
            port: DEFAULT_PORT,
            auto_start: DEFAULT_AUTO_START,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.port == 0 {
            return Err(ConfigError::server("server.port must be 1-65535, got 0"));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::server("server.data_dir cannot be empty"));
        }

        if self.log_path.as_os_str().is_empty() || self.log_path.file_name().is_none() {
            return Err(ConfigError::server("server.log_path must name a file"));
        }

        Ok(())
    }

    /// Directory holding the server log file.
    pub fn log_dir(&self) -> &Path {
        self.log_path.parent().unwrap_or_else(|| Path::new("."))
    }
}
