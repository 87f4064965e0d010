//! MongoDB process lifecycle: launch checks, monitoring and escalating shutdown.

use crate::server::output::{drain_stderr, drain_stdout};
use crate::server::process::{ExitReport, ManagedProcess, server_args, shutdown_args};
use crate::server::{
    Installation, Notification, PortManager, ServerState, ServerStatus, StartError, StartResult,
    StatusPublisher, diagnose_log, tail_lines,
};

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use mm_config::{ServerConfig, ShutdownConfig};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running
    AlreadyStopped,
    /// The process exited within the grace window
    Graceful,
    /// The grace window expired and the process was killed
    Forced,
}

/// Manages the `mongod` process lifecycle.
///
/// Responsibilities:
/// - Pre-launch checks (binary, permissions, directories, port)
/// - Spawning the server and draining its output
/// - Observing unexpected exits and diagnosing them from the log
/// - Graceful shutdown with forced-kill escalation
///
/// Every state change happens while holding the `process` mutex, so Start
/// and Stop never interleave.
#[derive(Clone)]
pub struct ServerManager {
    installation: Arc<Installation>,
    shutdown: ShutdownConfig,
    config: Arc<RwLock<ServerConfig>>,
    process: Arc<Mutex<Option<ManagedProcess>>>,
    publisher: StatusPublisher,
    generation: Arc<AtomicU64>,
}

impl ServerManager {
    /// Create a new server manager.
    ///
    /// The configured data and log directories are created up front; a
    /// failure here is logged and reported again by the next `start`.
    pub fn new(installation: Installation, config: ServerConfig, shutdown: ShutdownConfig) -> Self {
        for dir in [config.data_dir.as_path(), config.log_dir()] {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("Failed to create directory {}: {e}", dir.display());
            }
        }

        Self {
            installation: Arc::new(installation),
            shutdown,
            config: Arc::new(RwLock::new(config)),
            process: Arc::new(Mutex::new(None)),
            publisher: StatusPublisher::new(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start the server.
    ///
    /// Returns `Ok(())` without doing anything when the server is already
    /// starting, running or stopping.
    pub async fn start(&self) -> StartResult<()> {
        let mut slot = self.process.lock().await;

        let state = self.publisher.state();
        if state != ServerState::Stopped {
            info!("Start ignored, server is {}", state.as_str());
            return Ok(());
        }

        let config = self.config();
        self.publisher.transition(ServerState::Starting, config.port);

        match self.launch(&config).await {
            Ok(process) => {
                info!(
                    "MongoDB started on port {} (pid {:?})",
                    config.port, process.pid
                );
                *slot = Some(process);
                self.publisher.transition(ServerState::Running, config.port);
                Ok(())
            }
            Err(e) => {
                error!("Failed to start MongoDB: {e}");
                self.publisher.transition(ServerState::Stopped, config.port);
                Err(e)
            }
        }
    }

    async fn launch(&self, config: &ServerConfig) -> StartResult<ManagedProcess> {
        let binary = self.installation.resolve_server_binary()?;
        Installation::ensure_executable(&binary)?;

        for dir in [config.data_dir.as_path(), config.log_dir()] {
            std::fs::create_dir_all(dir)
                .map_err(|e| StartError::directory_creation(dir.to_path_buf(), e))?;
        }

        let port = config.port;
        let in_use = match tokio::task::spawn_blocking(move || PortManager::is_in_use(port)).await
        {
            Ok(in_use) => in_use,
            Err(e) => {
                warn!("Port probe for {port} did not complete, assuming free: {e}");
                false
            }
        };
        if in_use {
            return Err(StartError::port_in_use(port));
        }

        let mut cmd = Command::new(&binary);
        cmd.args(server_args(config))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Keep terminal signals away from mongod; shutdown is ours to drive
        #[cfg(unix)]
        cmd.process_group(0);

        info!("Launching {}", binary.display());
        let mut child = cmd.spawn()?;
        let pid = child.id();

        let mut output_tasks = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            output_tasks.push(drain_stdout(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            output_tasks.push(drain_stderr(stderr, self.publisher.clone()));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel();
        self.watch_exit(child, generation, exit_tx, kill_rx);

        Ok(ManagedProcess::new(
            generation,
            pid,
            config,
            exit_rx,
            kill_tx,
            output_tasks,
        ))
    }

    /// Own the child until it exits, killing it on request.
    fn watch_exit(
        &self,
        mut child: Child,
        generation: u64,
        exit_tx: watch::Sender<Option<ExitReport>>,
        mut kill_rx: oneshot::Receiver<()>,
    ) {
        let manager = self.clone();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                Ok(()) = &mut kill_rx => {
                    warn!("Force killing MongoDB process (pid {:?})", child.id());
                    if let Err(e) = child.start_kill() {
                        error!("Failed to kill MongoDB process: {e}");
                    }
                    child.wait().await
                }
            };

            let report = match status {
                Ok(status) => ExitReport::from_status(status),
                Err(e) => {
                    error!("Failed to collect MongoDB exit status: {e}");
                    ExitReport::unknown()
                }
            };

            info!("MongoDB process exited with {report}");
            exit_tx.send_replace(Some(report));
            manager.handle_exit(generation, report).await;
        });
    }

    /// Exit not initiated by `stop`.
    async fn handle_exit(&self, generation: u64, report: ExitReport) {
        let mut slot = self.process.lock().await;

        let current = slot.as_ref().is_some_and(|p| p.generation == generation);
        if !current || self.publisher.state() != ServerState::Running {
            return;
        }
        let Some(process) = slot.take() else {
            return;
        };

        warn!("MongoDB exited unexpectedly with {report}");
        let port = process.port;
        let log_path = process.log_path().to_path_buf();

        self.publisher.transition(ServerState::Stopping, port);
        process.release();
        self.publisher.transition(ServerState::Stopped, port);

        if !report.is_clean() {
            let diagnosis = diagnose_log(&log_path);
            error!("{}: {}", diagnosis.title(), diagnosis.message());
            self.publisher.report(diagnosis);
        }
    }

    /// Stop the server, escalating to a forced kill after the grace window.
    ///
    /// Idempotent; returns once the process is confirmed gone.
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.process.lock().await;

        let Some(mut process) = slot.take() else {
            debug!("Stop ignored, server is not running");
            return StopOutcome::AlreadyStopped;
        };

        let port = process.port;
        self.publisher.transition(ServerState::Stopping, port);
        info!("Stopping MongoDB on port {port}");

        if !process.has_exited() {
            self.request_shutdown(&process);
        }

        let outcome = if self.wait_for_exit(&process).await {
            info!("MongoDB shut down gracefully");
            StopOutcome::Graceful
        } else {
            warn!(
                "MongoDB did not exit within {}ms, forcing termination",
                self.shutdown.grace_period_ms
            );
            process.kill();
            if timeout(self.shutdown.kill_wait(), process.exited())
                .await
                .is_err()
            {
                error!(
                    "MongoDB still running {}ms after kill",
                    self.shutdown.kill_wait_ms
                );
            }
            StopOutcome::Forced
        };

        // A crash that lands before `handle_exit` gets the slot still needs a diagnosis.
        let crashed = match process.exit_report() {
            Some(report) if outcome == StopOutcome::Graceful && !report.is_clean() => {
                warn!("MongoDB had already exited with {report}");
                true
            }
            _ => false,
        };
        let log_path = process.log_path().to_path_buf();

        process.release();
        self.publisher.transition(ServerState::Stopped, port);
        info!("MongoDB stopped");

        if crashed {
            let diagnosis = diagnose_log(&log_path);
            error!("{}: {}", diagnosis.title(), diagnosis.message());
            self.publisher.report(diagnosis);
        }

        outcome
    }

    /// Stop in the background and run `on_stopped` once the process is gone.
    pub fn stop_then<F>(&self, on_stopped: F) -> JoinHandle<StopOutcome>
    where
        F: FnOnce(StopOutcome) + Send + 'static,
    {
        let manager = self.clone();

        tokio::spawn(async move {
            let outcome = manager.stop().await;
            on_stopped(outcome);
            outcome
        })
    }

    /// Stop (if needed) and start again with the current configuration.
    pub async fn restart(&self) -> StartResult<()> {
        self.stop().await;
        self.start().await
    }

    /// Ask mongod to shut down via the shell client, or SIGTERM without one.
    fn request_shutdown(&self, process: &ManagedProcess) {
        let Some(shell) = self.installation.shell_client() else {
            if self.shutdown.signal_fallback {
                warn!("Shutdown client not found, falling back to SIGTERM");
                process.terminate();
            } else {
                warn!("Shutdown client not found, waiting for the grace window");
            }
            return;
        };

        info!("Requesting shutdown via {}", shell.display());
        let spawned = Command::new(&shell)
            .args(shutdown_args(process.port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut client) => {
                tokio::spawn(async move {
                    match client.wait().await {
                        Ok(status) => debug!("Shutdown client exited with {status}"),
                        Err(e) => warn!("Failed to wait for shutdown client: {e}"),
                    }
                });
            }
            Err(e) => {
                warn!("Failed to launch shutdown client: {e}");
                if self.shutdown.signal_fallback {
                    process.terminate();
                }
            }
        }
    }

    /// Poll liveness until exit or the grace window expires.
    async fn wait_for_exit(&self, process: &ManagedProcess) -> bool {
        let deadline = Instant::now() + self.shutdown.grace_period();
        let mut ticker = tokio::time::interval(self.shutdown.poll_interval());

        loop {
            ticker.tick().await;
            if process.has_exited() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> ServerState {
        self.publisher.state()
    }

    /// Running flag plus the port of the active process, or the
    /// configured port when stopped.
    pub fn status(&self) -> ServerStatus {
        let state = self.publisher.state();
        let port = match state {
            ServerState::Stopped => self.config().port,
            _ => self.publisher.active_port(),
        };

        ServerStatus {
            running: state.is_running(),
            port,
        }
    }

    /// Subscribe to state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ServerState> {
        self.publisher.subscribe_state()
    }

    /// Subscribe to status and failure notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.publisher.subscribe()
    }

    /// Snapshot of the configuration used by the next start.
    pub fn config(&self) -> ServerConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the configuration. A running process keeps its settings
    /// until restarted.
    pub fn configure(&self, config: ServerConfig) {
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn set_port(&self, port: u16) {
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .port = port;
    }

    pub fn data_folder(&self) -> PathBuf {
        self.config().data_dir
    }

    pub fn log_folder(&self) -> PathBuf {
        self.config().log_dir().to_path_buf()
    }

    /// Last `count` lines of the server log.
    pub fn recent_log_lines(&self, count: usize) -> std::io::Result<Vec<String>> {
        tail_lines(&self.config().log_path, count)
    }

    pub fn installation(&self) -> &Installation {
        &self.installation
    }
}
