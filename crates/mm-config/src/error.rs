use std::panic::Location;
use std::path::PathBuf;
use std::result::Result as StdResult;

use error_location::ErrorLocation;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ConfigError {
    #[error("{category} error: {message} {location}")]
    Generic {
        category: &'static str,
        message: String,
        location: ErrorLocation,
    },

    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {source}")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },

    #[error("Home directory not found")]
    NoHomeDir,
}

impl ConfigError {
    /// Create a server settings error
    #[track_caller]
    pub fn server<S: Into<String>>(message: S) -> Self {
        ConfigError::Generic {
            category: "Server",
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create a shutdown settings error
    #[track_caller]
    pub fn shutdown<S: Into<String>>(message: S) -> Self {
        ConfigError::Generic {
            category: "Shutdown",
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create an instance settings error
    #[track_caller]
    pub fn instance<S: Into<String>>(message: S) -> Self {
        ConfigError::Generic {
            category: "Instance",
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create a logging error
    #[track_caller]
    pub fn logging<S: Into<String>>(message: S) -> Self {
        ConfigError::Generic {
            category: "Logging",
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Create a config error
    #[track_caller]
    pub fn config<S: Into<String>>(message: S) -> Self {
        ConfigError::Generic {
            category: "Config",
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::Toml { .. } => {
                "The preferences file could not be parsed. \
                   Fix the reported line or delete config.toml to restore defaults."
            }
            Self::Io { .. } => {
                "The preferences file could not be read or written. \
                   Check permissions on the configuration directory."
            }
            Self::NoHomeDir => "Set the HOME environment variable and try again.",
            _ => "Check the preferences for invalid values.",
        }
    }
}

pub type ConfigErrorResult<T> = StdResult<T, ConfigError>;
