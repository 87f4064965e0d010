use std::panic::Location;
use std::path::PathBuf;

use error_location::ErrorLocation;
use mm_config::ConfigError;
use thiserror::Error;

/// Failures of the single-instance machinery itself.
///
/// Losing the arbitration is not an error; see `Arbitration::Duplicate`.
#[derive(Error, Debug)]
pub enum InstanceError {
    #[error("Instance configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to lock {path}: {source} {location}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Activation channel error at {path}: {source} {location}")]
    Activation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },
}

impl InstanceError {
    #[track_caller]
    pub fn lock(path: PathBuf, source: std::io::Error) -> Self {
        Self::Lock {
            path,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn activation(path: PathBuf, source: std::io::Error) -> Self {
        Self::Activation {
            path,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::Config { .. } => "Check the [instance] section of config.toml.",
            Self::Lock { .. } => {
                "The lock file could not be opened. \
                   Check permissions on the application support directory."
            }
            Self::Activation { .. } => {
                "Another copy may still be detected through the lock file. \
                   Remove stale files from the activation directory if this persists."
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, InstanceError>;
