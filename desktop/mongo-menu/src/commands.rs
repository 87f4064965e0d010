//! Menu commands: the operations the status menu exposes.

use crate::instance::InstanceCoordinator;
use crate::server::{ServerManager, ServerStatus, StartError, StopOutcome};

use std::path::{Path, PathBuf};

use mm_config::{Config, ConfigError, ServerConfig};
use serde::Serialize;
use tracing::{error, info};

const DEFAULT_LOG_LINES: usize = 100;

/// Folders the menu can open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folders {
    pub data: PathBuf,
    pub logs: PathBuf,
}

/// A preference edited from the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preference {
    Port(u16),
    DataDir(PathBuf),
    LogPath(PathBuf),
}

impl Preference {
    fn apply(&self, server: &mut ServerConfig) {
        match self {
            Self::Port(port) => server.port = *port,
            Self::DataDir(dir) => server.data_dir = dir.clone(),
            Self::LogPath(path) => server.log_path = path.clone(),
        }
    }
}

/// A line typed on the command console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    Start,
    Stop,
    Toggle,
    Restart,
    Status,
    Logs(Option<usize>),
    Folders,
    Set(Preference),
    Quit,
    Help,
}

impl MenuCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = match words.next()?.to_lowercase().as_str() {
            "start" => Self::Start,
            "stop" => Self::Stop,
            "toggle" => Self::Toggle,
            "restart" => Self::Restart,
            "status" => Self::Status,
            "logs" => Self::Logs(words.next().and_then(|n| n.parse().ok())),
            "folders" => Self::Folders,
            "port" => Self::Set(Preference::Port(words.next()?.parse().ok()?)),
            "data-dir" => Self::Set(Preference::DataDir(path_argument(line, "data-dir")?)),
            "log-path" => Self::Set(Preference::LogPath(path_argument(line, "log-path")?)),
            "quit" | "exit" => Self::Quit,
            "help" | "?" => Self::Help,
            _ => return None,
        };

        Some(command)
    }
}

/// Everything after the keyword, so paths may contain spaces.
fn path_argument(line: &str, keyword: &str) -> Option<PathBuf> {
    let rest = line.trim_start().get(keyword.len()..)?.trim();
    (!rest.is_empty()).then(|| PathBuf::from(rest))
}

pub const HELP: &str = "commands: start | stop | toggle | restart | status | logs [n] | folders \
     | port <n> | data-dir <path> | log-path <path> | quit";

fn user_message(e: &StartError) -> String {
    format!("{}: {e}\n\nHint: {}", e.title(), e.recovery_hint())
}

/// Get current server status.
pub fn get_server_status(manager: &ServerManager) -> ServerStatus {
    manager.status()
}

pub async fn start_server(manager: &ServerManager) -> Result<ServerStatus, String> {
    manager.start().await.map_err(|e| {
        error!("Failed to start server: {e}");
        user_message(&e)
    })?;

    Ok(manager.status())
}

pub async fn stop_server(manager: &ServerManager) -> ServerStatus {
    manager.stop().await;
    manager.status()
}

/// Start when stopped, stop otherwise.
pub async fn toggle_server(manager: &ServerManager) -> Result<ServerStatus, String> {
    if manager.status().running {
        Ok(stop_server(manager).await)
    } else {
        start_server(manager).await
    }
}

/// Manually restart the server.
pub async fn restart_server(manager: &ServerManager) -> Result<ServerStatus, String> {
    manager.restart().await.map_err(|e| {
        error!("Failed to restart server: {e}");
        user_message(&e)
    })?;

    Ok(manager.status())
}

/// Get recent lines of the MongoDB log.
pub fn get_recent_logs(
    manager: &ServerManager,
    lines: Option<usize>,
) -> Result<Vec<String>, String> {
    let log_path = manager.config().log_path;
    if !log_path.exists() {
        return Ok(vec!["No logs available yet.".into()]);
    }

    manager
        .recent_log_lines(lines.unwrap_or(DEFAULT_LOG_LINES))
        .map_err(|e| format!("Failed to read {}: {e}", log_path.display()))
}

pub fn get_folders(manager: &ServerManager) -> Folders {
    Folders {
        data: manager.data_folder(),
        logs: manager.log_folder(),
    }
}

/// Preferences as stored on disk, separate from command-line overrides.
pub struct Preferences {
    config: Config,
    config_dir: PathBuf,
}

impl Preferences {
    pub fn new(config: Config, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            config_dir: config_dir.into(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

/// Change a server preference and persist it.
///
/// The running server keeps its current settings; the new value is used
/// from the next start.
pub fn update_preference(
    manager: &ServerManager,
    preferences: &mut Preferences,
    preference: &Preference,
) -> Result<ServerConfig, String> {
    let config_message =
        |e: ConfigError| format!("Preferences not saved: {e}\n\nHint: {}", e.recovery_hint());

    let mut next = manager.config();
    preference.apply(&mut next);
    next.validate().map_err(config_message)?;

    let mut stored = preferences.config.clone();
    preference.apply(&mut stored.server);
    let path = stored.save(&preferences.config_dir).map_err(|e| {
        error!("Failed to save preferences: {e}");
        config_message(e)
    })?;
    info!("Saved preferences to {}", path.display());

    preferences.config = stored;
    manager.configure(next.clone());
    Ok(next)
}

/// Stop the server and give up the instance lock.
///
/// Returns once it is safe to exit the process.
pub async fn quit(manager: &ServerManager, coordinator: &InstanceCoordinator) -> StopOutcome {
    info!("Quitting");
    let outcome = manager.stop().await;
    coordinator.release_lock();
    outcome
}
