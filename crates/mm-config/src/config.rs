use crate::{
    CONFIG_FILENAME, ConfigError, ConfigErrorResult, DEFAULT_APP_ID, InstallationConfig,
    InstanceConfig, LoggingConfig, ServerConfig, ShutdownConfig,
};

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub shutdown: ShutdownConfig,
    pub instance: InstanceConfig,
    pub logging: LoggingConfig,
    pub installation: InstallationConfig,
}

impl Config {
    /// Load config from the default config directory.
    ///
    /// Loading order:
    /// 1. Check for MM_CONFIG_DIR env var, else use `<config_dir>/<app_id>/`
    /// 2. Auto-create config directory if it doesn't exist
    /// 3. Load config.toml if it exists, else use defaults
    /// 4. Apply MM_* environment variable overrides
    ///
    /// Does NOT validate - call validate() after load().
    pub fn load() -> ConfigErrorResult<Self> {
        Self::load_from(&Self::config_dir()?)
    }

    /// Load config from an explicit directory.
    pub fn load_from(config_dir: &Path) -> ConfigErrorResult<Self> {
        if !config_dir.exists() {
            std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Io {
                path: config_dir.to_path_buf(),
                source: e,
            })?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            Self::load_toml(&config_path)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load and parse TOML file with detailed error context.
    fn load_toml(path: &Path) -> ConfigErrorResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Save config to `<config_dir>/config.toml` atomically.
    ///
    /// Uses write-to-temp-then-rename so an interrupted write never
    /// leaves a truncated preferences file behind.
    pub fn save(&self, config_dir: &Path) -> ConfigErrorResult<PathBuf> {
        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Io {
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize { source: e })?;

        let temp_path = config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &content).map_err(|e| ConfigError::Io {
            path: temp_path.clone(),
            source: e,
        })?;
        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        Ok(config_path)
    }

    /// Get the config directory.
    /// Priority: MM_CONFIG_DIR env var > `<platform config dir>/<app_id>/`
    pub fn config_dir() -> ConfigErrorResult<PathBuf> {
        if let Ok(dir) = std::env::var("MM_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }

        dirs::config_dir()
            .map(|dir| dir.join(DEFAULT_APP_ID))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Validate all configuration.
    /// Call after load() to catch all errors at startup.
    pub fn validate(&self) -> ConfigErrorResult<()> {
        self.server.validate()?;
        self.shutdown.validate()?;
        self.instance.validate()?;
        self.logging.validate()?;

        Ok(())
    }

    /// Log configuration summary.
    pub fn log_summary(&self) {
        info!("Configuration loaded:");
        info!(
            "  server: port={} data_dir={} log_path={} auto_start={}",
            self.server.port,
            self.server.data_dir.display(),
            self.server.log_path.display(),
            self.server.auto_start
        );
        info!(
            "  shutdown: grace={}ms poll={}ms kill_wait={}ms signal_fallback={}",
            self.shutdown.grace_period_ms,
            self.shutdown.poll_interval_ms,
            self.shutdown.kill_wait_ms,
            self.shutdown.signal_fallback
        );
        info!(
            "  instance: app_id={} handshake={}ms",
            self.instance.app_id, self.instance.handshake_timeout_ms
        );
        info!(
            "  logging: level={} dir={} keep={}",
            self.logging.level, self.logging.directory, self.logging.max_files
        );

        match self.installation.resource_dir {
            Some(ref dir) => info!("  installation: resources={}", dir.display()),
            None => info!("  installation: resources=<next to executable>"),
        }
    }

    fn apply_env_overrides(&mut self) {
        // Server
        Self::apply_env_parse("MM_PORT", &mut self.server.port);
        Self::apply_env_path("MM_DATA_DIR", &mut self.server.data_dir);
        Self::apply_env_path("MM_LOG_PATH", &mut self.server.log_path);
        Self::apply_env_bool("MM_AUTO_START", &mut self.server.auto_start);

        // Shutdown
        Self::apply_env_parse("MM_GRACE_PERIOD_MS", &mut self.shutdown.grace_period_ms);

        // Instance
        Self::apply_env_option_path("MM_APP_DIR", &mut self.instance.app_dir);

        // Logging
        Self::apply_env_string("MM_LOG_LEVEL", &mut self.logging.level);

        // Installation
        Self::apply_env_option_path("MM_RESOURCE_DIR", &mut self.installation.resource_dir);
    }

    /// Helper: Apply environment variable override for String values
    fn apply_env_string(var_name: &str, target: &mut String) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val;
        }
    }

    /// Helper: Apply environment variable override for bool values (accepts "true"/"1")
    fn apply_env_bool(var_name: &str, target: &mut bool) {
        if let Ok(val) = std::env::var(var_name) {
            *target = val == "true" || val == "1";
        }
    }

    /// Helper: Apply environment variable override for parseable values
    fn apply_env_parse<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(val) = std::env::var(var_name)
            && let Ok(parsed) = val.parse()
        {
            *target = parsed;
        }
    }

    fn apply_env_path(var_name: &str, target: &mut PathBuf) {
        if let Some(val) = std::env::var_os(var_name) {
            *target = PathBuf::from(val);
        }
    }

    fn apply_env_option_path(var_name: &str, target: &mut Option<PathBuf>) {
        if let Some(val) = std::env::var_os(var_name) {
            *target = Some(PathBuf::from(val));
        }
    }
}
