// ABOUTME: CLI entry point for the Looker dashboard delivery connector
// ABOUTME: Loads configuration, sets up logging and maps fatal errors to exit codes

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use looker_dashboard_sender::config::{default_config_path, Config};
use looker_dashboard_sender::error::exit_code_for;
use looker_dashboard_sender::Orchestrator;

#[derive(Parser)]
#[command(name = "looker-dashboard-sender")]
#[command(about = "Trigger one-off Looker dashboard deliveries from input tables", long_about = None)]
#[command(version)]
struct Cli {
    /// Platform data directory holding config.json, in/tables and out/tables
    #[arg(long, env = "KBC_DATADIR", default_value = "/data")]
    data_dir: PathBuf,
    /// Configuration file (JSON, or TOML with a .toml extension)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default_level = if debug {
        "looker_dashboard_sender=debug,info"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(&cli.data_dir));

    // Logging depends on the config's debug flag, so it is set up before
    // reporting a config that failed to load.
    let config = Config::from_path(&config_path);
    let debug = cli.debug
        || config
            .as_ref()
            .map(|c| c.parameters.debug)
            .unwrap_or(false);
    init_tracing(debug);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Looker dashboard sender");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    match Orchestrator::new(config, cli.data_dir).run().await {
        Ok(log) => {
            tracing::info!(processed = log.len(), "Run completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(exit_code_for(&e) as u8)
        }
    }
}
