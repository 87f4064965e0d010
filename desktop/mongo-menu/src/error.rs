use crate::instance::InstanceError;

use std::panic::Location;

use error_location::ErrorLocation;
use mm_config::ConfigError;
use thiserror::Error;

/// Failures that prevent the application from running at all.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error("Failed to initialize logging: {message} {location}")]
    Logging {
        message: String,
        location: ErrorLocation,
    },
}

impl AppError {
    #[track_caller]
    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::Config(ConfigError::Toml { .. }) => {
                "Fix the syntax error in config.toml or delete it to restore defaults."
            }
            Self::Config(_) => "Check config.toml and the MM_* environment variables.",
            Self::Instance(e) => e.recovery_hint(),
            Self::Logging { .. } => {
                "Check that the application support directory is writable."
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
