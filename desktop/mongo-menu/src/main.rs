use mongo_menu::RunOptions;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

#[derive(Parser)]
#[command(name = "mongo-menu")]
#[command(about = "Supervisor for a bundled local MongoDB server")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to MM_CONFIG_DIR or the platform config dir)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Do not start MongoDB at launch, even if auto_start is configured
    #[arg(long)]
    no_autostart: bool,

    /// Port for this run, overriding the configuration
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,
}

impl From<Cli> for RunOptions {
    fn from(cli: Cli) -> Self {
        Self {
            config_dir: cli.config_dir,
            no_autostart: cli.no_autostart,
            port: cli.port,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match mongo_menu::run(cli.into()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}\n\nHint: {}", e.recovery_hint());
            ExitCode::FAILURE
        }
    }
}
