//! Logging setup with file rotation.

use std::path::{Path, PathBuf};

use mm_config::LoggingConfig;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::__tracing_subscriber_SubscriberExt};

/// Setup logging with console and rotating file output.
///
/// # Log Layers
/// - Console: Human-readable, colored output
/// - File: plain text, daily rotation, `max_files` retention
///
/// `RUST_LOG` takes precedence over the configured level. Records emitted
/// through the `log` facade (e.g. by `mm-config`) are bridged in.
pub fn setup_logging(
    app_dir: &Path,
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let logs_dir = app_dir.join(&config.directory);
    std::fs::create_dir_all(&logs_dir)?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(true);

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(config.max_files)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(&logs_dir)?;

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    // Bridge log to tracing
    tracing_log::LogTracer::init()?;

    Ok(())
}

/// Get path to today's supervisor log file.
pub fn current_log_path(app_dir: &Path, config: &LoggingConfig) -> PathBuf {
    let today = chrono::Local::now().format("%Y-%m-%d");
    app_dir
        .join(&config.directory)
        .join(format!("{}.{today}.log", config.file_prefix))
}
