mod config;
mod error;
mod installation_config;
mod instance_config;
mod logging_config;
mod server_config;
mod shutdown_config;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use error::{ConfigError, ConfigErrorResult};
pub use installation_config::InstallationConfig;
pub use instance_config::InstanceConfig;
pub use logging_config::LoggingConfig;
pub use server_config::ServerConfig;
pub use shutdown_config::ShutdownConfig;

pub const DEFAULT_APP_ID: &str = "com.maquina-app.MongoMenu";
const CONFIG_FILENAME: &str = "config.toml";

const DEFAULT_PORT: u16 = 27017;
const DEFAULT_DATA_DIR: &str = ".local/share/mongodb/data";
const DEFAULT_LOG_PATH: &str = ".local/state/mongodb/logs/mongodb.log";
const DEFAULT_AUTO_START: bool = false;

const DEFAULT_GRACE_PERIOD_MS: u64 = 10_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_KILL_WAIT_MS: u64 = 5_000;
const DEFAULT_SIGNAL_FALLBACK: bool = true;

const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 1_000;
const LOCK_FILENAME: &str = "app.lock";
const ACTIVATION_DIRNAME: &str = "activation";

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_DIRECTORY: &str = "logs";
const DEFAULT_LOG_FILE_PREFIX: &str = "mongo-menu";
const DEFAULT_LOG_MAX_FILES: usize = 7;
const MAX_LOG_MAX_FILES: usize = 365;

const DEFAULT_RESOURCE_DIRNAME: &str = "resources";
