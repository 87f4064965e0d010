use crate::{ConfigError, ConfigErrorResult, DEFAULT_RESOURCE_DIRNAME};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the bundled MongoDB binaries live.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallationConfig {
    /// Resource directory containing `mongodb/bin/`. Defaults to
    /// `resources/` next to the running executable.
    pub resource_dir: Option<PathBuf>,
}

impl InstallationConfig {
    pub fn resource_dir(&self) -> ConfigErrorResult<PathBuf> {
        if let Some(ref dir) = self.resource_dir {
            return Ok(dir.clone());
        }

        let exe = std::env::current_exe().map_err(|e| ConfigError::Io {
            path: PathBuf::from("<current executable>"),
            source: e,
        })?;

        exe.parent()
            .map(|dir| dir.join(DEFAULT_RESOURCE_DIRNAME))
            .ok_or_else(|| ConfigError::config("executable has no parent directory"))
    }
}
