use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_LOG_DIRECTORY, DEFAULT_LOG_FILE_PREFIX,
    DEFAULT_LOG_LEVEL, DEFAULT_LOG_MAX_FILES, MAX_LOG_MAX_FILES,
};

use serde::{Deserialize, Serialize};

const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Logging of the supervisor itself (not of `mongod`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level, overridden by `RUST_LOG`
    pub level: String,
    /// Log directory, relative to the application support directory
    pub directory: String,
    pub file_prefix: String,
    /// Number of daily log files to keep
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from(DEFAULT_LOG_LEVEL),
            directory: String::from(DEFAULT_LOG_DIRECTORY),
            file_prefix: String::from(DEFAULT_LOG_FILE_PREFIX),
            max_files: DEFAULT_LOG_MAX_FILES,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> ConfigErrorResult<()> {
        if !LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::logging(format!(
                "logging.level must be one of {}, got '{}'",
                LEVELS.join(", "),
                self.level
            )));
        }

        let dir = std::path::Path::new(&self.directory);
        if dir.is_absolute() || self.directory.contains("..") {
            return Err(ConfigError::logging(
                "logging.directory must be relative and cannot contain '..'",
            ));
        }

        if self.file_prefix.trim().is_empty() {
            return Err(ConfigError::logging("logging.file_prefix cannot be empty"));
        }

        if self.max_files == 0 || self.max_files > MAX_LOG_MAX_FILES {
            return Err(ConfigError::logging(format!(
                "logging.max_files must be 1-{}, got {}",
                MAX_LOG_MAX_FILES, self.max_files
            )));
        }

        Ok(())
    }
}
