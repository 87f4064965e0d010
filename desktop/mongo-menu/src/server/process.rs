//! Handle to a spawned `mongod`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use mm_config::ServerConfig;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::warn;

/// Exit code `mongod` reports when it shuts down on SIGTERM.
const SIGTERM_EXIT_CODE: i32 = 15;
#[cfg(unix)]
const SIGTERM: i32 = 15;

/// Command-line arguments binding the server to its configuration.
pub fn server_args(config: &ServerConfig) -> Vec<String> {
    vec![
        "--dbpath".into(),
        config.data_dir.display().to_string(),
        "--logpath".into(),
        config.log_path.display().to_string(),
        "--logappend".into(),
        "--port".into(),
        config.port.to_string(),
    ]
}

/// Arguments for the shell client to request an administrative shutdown.
pub fn shutdown_args(port: u16) -> Vec<String> {
    vec![
        "--port".into(),
        port.to_string(),
        "--eval".into(),
        "db.adminCommand({shutdown: 1})".into(),
    ]
}

/// How the server process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitReport {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    /// Exit status could not be collected.
    pub fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }

    /// Exit code 0 or termination by SIGTERM.
    pub fn is_clean(&self) -> bool {
        #[cfg(unix)]
        if self.signal == Some(SIGTERM) {
            return true;
        }

        matches!(self.code, Some(0) | Some(SIGTERM_EXIT_CODE))
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// Exclusively owned by the supervisor while the server is not `Stopped`.
///
/// The `Child` itself lives in the exit watcher task; this handle talks
/// to it through channels.
pub(crate) struct ManagedProcess {
    pub(crate) generation: u64,
    pub(crate) pid: Option<u32>,
    pub(crate) port: u16,
    log_path: PathBuf,
    exit_rx: watch::Receiver<Option<ExitReport>>,
    kill_tx: Option<oneshot::Sender<()>>,
    output_tasks: Vec<JoinHandle<()>>,
}

impl ManagedProcess {
    pub(crate) fn new(
        generation: u64,
        pid: Option<u32>,
        config: &ServerConfig,
        exit_rx: watch::Receiver<Option<ExitReport>>,
        kill_tx: oneshot::Sender<()>,
        output_tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            generation,
            pid,
            port: config.port,
            log_path: config.log_path.clone(),
            exit_rx,
            kill_tx: Some(kill_tx),
            output_tasks,
        }
    }

    pub(crate) fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub(crate) fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }

    pub(crate) fn exit_report(&self) -> Option<ExitReport> {
        *self.exit_rx.borrow()
    }

    /// Wait until the exit watcher reports termination.
    pub(crate) async fn exited(&mut self) -> Option<ExitReport> {
        match self.exit_rx.wait_for(Option::is_some).await {
            Ok(report) => *report,
            Err(_) => None,
        }
    }

    /// Ask the process to terminate with SIGTERM.
    pub(crate) fn terminate(&self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            tracing::info!("Sending SIGTERM to pid {pid}");
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!("Failed to send SIGTERM to pid {pid}: {e}");
            }
        }
    }

    /// Request a forced kill. Only the first call has any effect.
    pub(crate) fn kill(&mut self) -> bool {
        match self.kill_tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Stop draining output; the streams belong to a dead process.
    pub(crate) fn release(self) {
        for task in self.output_tasks {
            task.abort();
        }
    }
}
