//! Location and sanity checks of the bundled MongoDB binaries.

use crate::server::{StartError, StartResult};

use std::path::{Path, PathBuf};

use mm_config::{ConfigErrorResult, InstallationConfig};
use tracing::{info, warn};

const BIN_DIR: [&str; 2] = ["mongodb", "bin"];
const SERVER_BINARY: &str = "mongod";
const SHELL_BINARY: &str = "mongosh";

#[cfg(unix)]
const EXECUTABLE_MODE: u32 = 0o755;

/// Bundled MongoDB installation rooted at a resource directory.
#[derive(Debug, Clone)]
pub struct Installation {
    resource_dir: PathBuf,
}

impl Installation {
    pub fn new(resource_dir: impl Into<PathBuf>) -> Self {
        Self {
            resource_dir: resource_dir.into(),
        }
    }

    pub fn from_config(config: &InstallationConfig) -> ConfigErrorResult<Self> {
        Ok(Self::new(config.resource_dir()?))
    }

    pub fn resource_dir(&self) -> &Path {
        &self.resource_dir
    }

    fn bin_dir(&self) -> PathBuf {
        BIN_DIR
            .iter()
            .fold(self.resource_dir.clone(), |dir, part| dir.join(part))
    }

    /// Expected path of the server executable.
    pub fn server_binary(&self) -> PathBuf {
        self.bin_dir().join(SERVER_BINARY)
    }

    /// Expected path of the administrative shell.
    pub fn shell_binary(&self) -> PathBuf {
        self.bin_dir().join(SHELL_BINARY)
    }

    /// The server executable, if it exists as a regular file.
    pub fn resolve_server_binary(&self) -> StartResult<PathBuf> {
        let path = self.server_binary();
        info!("Looking for MongoDB at: {}", path.display());

        if path.is_file() {
            Ok(path)
        } else {
            Err(StartError::binary_not_found(path))
        }
    }

    /// The shutdown client, when it is part of the installation.
    pub fn shell_client(&self) -> Option<PathBuf> {
        let path = self.shell_binary();
        path.is_file().then_some(path)
    }

    /// Verify the executable bit.
    ///
    /// A missing bit is repaired for the next attempt, but the current
    /// attempt still fails.
    #[cfg(unix)]
    pub fn ensure_executable(path: &Path) -> StartResult<()> {
        use std::os::unix::fs::PermissionsExt;

        let mode = std::fs::metadata(path)
            .map(|m| m.permissions().mode())
            .unwrap_or(0);

        if mode & 0o111 != 0 {
            return Ok(());
        }

        warn!("MongoDB binary is not executable: {}", path.display());
        let fixed =
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(EXECUTABLE_MODE));
        match fixed {
            Ok(()) => info!("Set executable permissions on {}", path.display()),
            Err(ref e) => warn!("Failed to set executable permissions: {e}"),
        }

        Err(StartError::not_executable(path.to_path_buf(), fixed.is_ok()))
    }

    #[cfg(not(unix))]
    pub fn ensure_executable(_path: &Path) -> StartResult<()> {
        Ok(())
    }
}
