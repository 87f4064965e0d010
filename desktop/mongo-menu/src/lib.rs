mod commands;
mod error;
pub mod instance;
mod logging;
pub mod server;

pub use commands::{Folders, HELP, MenuCommand, Preference, Preferences};
pub use error::{AppError, Result as AppResult};

#[cfg(test)]
mod tests;

use instance::{Arbitration, InstanceCoordinator};
use server::{Installation, Notification, ServerManager, ServerStatus};

use std::path::PathBuf;
use std::sync::Arc;

use mm_config::Config;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_dir: Option<PathBuf>,
    pub no_autostart: bool,
    pub port: Option<u16>,
}

/// Run the supervisor until the user quits or a signal arrives.
///
/// Returns `Ok(())` without doing anything when another instance is
/// already running.
pub async fn run(options: RunOptions) -> AppResult<()> {
    let config_dir = match options.config_dir {
        Some(dir) => dir,
        None => Config::config_dir()?,
    };

    let mut config = Config::load_from(&config_dir)?;
    let mut preferences = Preferences::new(config.clone(), config_dir.clone());
    if let Some(port) = options.port {
        config.server.port = port;
    }
    if options.no_autostart {
        config.server.auto_start = false;
    }
    config.validate()?;

    let app_dir = config.instance.app_dir()?;
    logging::setup_logging(&app_dir, &config.logging)
        .map_err(|e| AppError::logging(e.to_string()))?;

    info!("Starting MongoMenu v{}", env!("CARGO_PKG_VERSION"));
    info!("Config directory: {}", config_dir.display());
    info!(
        "Supervisor log: {}",
        logging::current_log_path(&app_dir, &config.logging).display()
    );
    config.log_summary();

    let coordinator = Arc::new(InstanceCoordinator::from_config(&config.instance)?);
    let primary = match coordinator.arbitrate().await {
        Arbitration::Proceed(primary) => primary,
        Arbitration::Duplicate => {
            info!("MongoMenu is already running, exiting");
            return Ok(());
        }
    };

    let installation = Installation::from_config(&config.installation)?;
    info!("MongoDB resources: {}", installation.resource_dir().display());
    let manager = ServerManager::new(installation, config.server.clone(), config.shutdown);

    spawn_status_logger(&manager);

    let foreground = manager.clone();
    primary.listen(move || {
        info!("Another launch requested activation, bringing menu to front");
        print_status(foreground.status());
    });

    if config.server.auto_start {
        info!("Auto-starting MongoDB");
        if let Err(e) = commands::start_server(&manager).await {
            println!("{e}");
        }
    }

    #[cfg(unix)]
    spawn_signal_handler(manager.clone(), coordinator.clone());

    command_loop(&manager, &coordinator, &mut preferences).await;

    Ok(())
}

/// Log status changes and surface diagnosed failures.
fn spawn_status_logger(manager: &ServerManager) -> JoinHandle<()> {
    let mut events = manager.subscribe();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Notification::StatusChanged(status)) => {
                    info!(
                        "Server status changed: running={} port={}",
                        status.running, status.port
                    );
                }
                Ok(Notification::Failure(diagnosis)) => {
                    error!("{}: {}", diagnosis.title(), diagnosis.message());
                    println!("{}: {}", diagnosis.title(), diagnosis.message());
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!("Missed {missed} status notifications");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Stop the server and exit on SIGINT/SIGTERM.
#[cfg(unix)]
fn spawn_signal_handler(manager: ServerManager, coordinator: Arc<InstanceCoordinator>) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let runtime = tokio::runtime::Handle::current();

    std::thread::spawn(move || {
        let mut signals = match Signals::new([SIGINT, SIGTERM]) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to register signal handlers: {e}");
                return;
            }
        };

        if let Some(sig) = signals.forever().next() {
            info!("Received signal {sig}, shutting down...");
            let outcome = runtime.block_on(commands::quit(&manager, &coordinator));
            info!("Server stopped due to signal {sig} ({outcome:?})");
            std::process::exit(0);
        }
    });
}

/// Read menu commands from stdin until `quit`.
async fn command_loop(
    manager: &ServerManager,
    coordinator: &InstanceCoordinator,
    preferences: &mut Preferences,
) {
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Console closed, running until signalled");
                std::future::pending::<()>().await;
                return;
            }
            Err(e) => {
                error!("Failed to read console input: {e}");
                break;
            }
        };

        let Some(command) = MenuCommand::parse(&line) else {
            if !line.trim().is_empty() {
                println!("unknown command '{}'\n{HELP}", line.trim());
            }
            continue;
        };

        if command == MenuCommand::Quit {
            break;
        }
        execute(command, manager, preferences).await;
    }

    let outcome = commands::quit(manager, coordinator).await;
    info!("MongoMenu exiting ({outcome:?})");
}

async fn execute(command: MenuCommand, manager: &ServerManager, preferences: &mut Preferences) {
    match command {
        MenuCommand::Start => report(commands::start_server(manager).await),
        MenuCommand::Stop => print_status(commands::stop_server(manager).await),
        MenuCommand::Toggle => report(commands::toggle_server(manager).await),
        MenuCommand::Restart => report(commands::restart_server(manager).await),
        MenuCommand::Status => print_status(commands::get_server_status(manager)),
        MenuCommand::Logs(count) => match commands::get_recent_logs(manager, count) {
            Ok(lines) => lines.iter().for_each(|line| println!("{line}")),
            Err(e) => println!("{e}"),
        },
        MenuCommand::Folders => print_json(&commands::get_folders(manager)),
        MenuCommand::Set(preference) => {
            match commands::update_preference(manager, preferences, &preference) {
                Ok(server) => {
                    print_json(&server);
                    if manager.status().running {
                        println!("Saved; restart the server to apply.");
                    }
                }
                Err(message) => println!("{message}"),
            }
        }
        MenuCommand::Help => println!("{HELP}"),
        MenuCommand::Quit => {}
    }
}

fn report(result: Result<ServerStatus, String>) {
    match result {
        Ok(status) => print_status(status),
        Err(message) => println!("{message}"),
    }
}

fn print_status(status: ServerStatus) {
    print_json(&status);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("Failed to encode output: {e}"),
    }
}
