use std::panic::Location;
use std::path::PathBuf;

use error_location::ErrorLocation;
use thiserror::Error;

/// Reasons a start attempt can fail.
///
/// Every variant leaves the supervisor in `Stopped`, ready for another
/// attempt.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("MongoDB binary not found at {path} {location}")]
    BinaryNotFound {
        path: PathBuf,
        location: ErrorLocation,
    },

    #[error("MongoDB binary at {path} is not executable (permissions fixed: {permissions_fixed}) {location}")]
    NotExecutable {
        path: PathBuf,
        permissions_fixed: bool,
        location: ErrorLocation,
    },

    #[error("Failed to create directory at {path}: {source} {location}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Port {port} is in use by another application {location}")]
    PortInUse { port: u16, location: ErrorLocation },

    #[error("Failed to spawn MongoDB process: {source} {location}")]
    SpawnFailed {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },
}

impl StartError {
    #[track_caller]
    pub fn binary_not_found(path: PathBuf) -> Self {
        Self::BinaryNotFound {
            path,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn not_executable(path: PathBuf, permissions_fixed: bool) -> Self {
        Self::NotExecutable {
            path,
            permissions_fixed,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn directory_creation(path: PathBuf, source: std::io::Error) -> Self {
        Self::DirectoryCreationFailed {
            path,
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn port_in_use(port: u16) -> Self {
        Self::PortInUse {
            port,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Short title suitable for an alert.
    pub fn title(&self) -> &'static str {
        match self {
            Self::BinaryNotFound { .. } => "MongoDB Binary Not Found",
            Self::NotExecutable { .. } => "MongoDB Binary Not Executable",
            Self::DirectoryCreationFailed { .. } => "MongoDB Directory Error",
            Self::PortInUse { .. } => "MongoDB Already Running",
            Self::SpawnFailed { .. } => "MongoDB Error",
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::BinaryNotFound { .. } => {
                "The application installation appears incomplete. \
                   Please reinstall the application."
            }
            Self::NotExecutable {
                permissions_fixed: true,
                ..
            } => "Executable permissions were restored. Start the server again.",
            Self::NotExecutable { .. } => {
                "The MongoDB binary cannot be made executable. \
                   Check file permissions in the installation directory."
            }
            Self::DirectoryCreationFailed { .. } => {
                "Unable to create the data or log directory. \
                   Check the configured paths, file permissions, or available disk space."
            }
            Self::PortInUse { .. } => {
                "Another MongoDB instance appears to be running. \
                   Please stop it or choose a different port before starting."
            }
            Self::SpawnFailed { .. } => {
                "MongoDB could not be launched. Please check the logs for details."
            }
        }
    }
}

impl From<std::io::Error> for StartError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::SpawnFailed {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StartError>;
