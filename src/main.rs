//! Storagie API server.
//!
//! ```text
//! .env + environment → config (validate, fail fast)
//!                    → observability (logging, metrics)
//!                    → lifecycle::startup (bind, serve, drain on signal)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use storagie_api::config::{self, ConfigError};
use storagie_api::lifecycle;
use storagie_api::observability::logging;

#[derive(Parser)]
#[command(name = "storagie-api")]
#[command(about = "Backend API for the Storagie", long_about = None)]
#[command(version)]
struct Cli {
    /// Environment file loaded before validation (defaults to ./.env if present)
    #[arg(short, long)]
    env_file: Option<PathBuf>,

    /// Validate the environment and exit without starting the server
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    lifecycle::mark_process_start();
    let cli = Cli::parse();

    let loaded = config::load_env_file(cli.env_file.as_deref()).and_then(|_| config::load_config());
    let config = match loaded {
        Ok(config) => config,
        Err(ConfigError::Validation(errors)) => {
            eprintln!("Invalid environment variables:");
            for error in &errors {
                eprintln!("  {error}");
            }
            return ExitCode::FAILURE;
        }
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        println!(
            "Environment is valid ({}, {})",
            config.environment,
            config.server.bind_address()
        );
        return ExitCode::SUCCESS;
    }

    if let Err(error) = logging::init_logging(&config.observability, config.environment) {
        eprintln!("failed to initialize logging: {error}");
        return ExitCode::FAILURE;
    }

    match lifecycle::start(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}
