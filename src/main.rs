// ABOUTME: Main entry point for podbridge
// Resolves a session from the command line, then bridges the local terminal to the pod

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::terminal::disable_raw_mode;
use podbridge::cli::Cli;
use podbridge::config::Config;
use podbridge::terminal::{keys, LocalTerminal, SessionOutcome, WebSocketBridge};
use podbridge::BridgeError;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};

const EXIT_TRANSPORT: u8 = 1;
const EXIT_REJECTED: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    setup_logging(&config.log_dir(), config.log_filter())?;
    setup_panic_handler();

    run(&cli, &config).await
}

async fn run(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let (identity, endpoint) = match cli.resolve(config) {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("Session not created: {}", e);
            eprintln!("podbridge: {e}");
            return Ok(ExitCode::from(EXIT_REJECTED));
        }
    };

    let bridge = WebSocketBridge::new(endpoint);
    let url = match bridge.preflight(&identity) {
        Ok(url) => url,
        Err(e) => {
            error!("Session not created: {}", e);
            eprintln!("podbridge: {e}");
            return Ok(ExitCode::from(EXIT_REJECTED));
        }
    };
    info!(
        "Starting {} session for {}/{}/{} at {}",
        identity.mode, identity.namespace, identity.pod, identity.container, url
    );

    let mode = identity.mode;
    let terminal = LocalTerminal::open().context("failed to put terminal in raw mode")?;
    let events = keys::terminal_events(mode);

    let code = match bridge.run(identity, terminal, events).await {
        Ok(SessionOutcome::Closed) => {
            info!("Session closed");
            ExitCode::SUCCESS
        }
        Ok(SessionOutcome::Detached) => {
            info!("Session detached");
            ExitCode::SUCCESS
        }
        Ok(SessionOutcome::Failed(reason)) => {
            error!("Session failed: {}", reason);
            ExitCode::from(EXIT_TRANSPORT)
        }
        Err(e @ BridgeError::TransportUnsupported(_)) => {
            error!("Session not created: {}", e);
            eprintln!("podbridge: {e}");
            ExitCode::from(EXIT_REJECTED)
        }
        Err(e) => {
            error!("Session aborted: {}", e);
            eprintln!("podbridge: {e}");
            ExitCode::from(EXIT_TRANSPORT)
        }
    };
    Ok(code)
}

fn setup_logging(log_dir: &Path, default_filter: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    // Create log file with timestamp
    let log_file = log_dir.join(format!(
        "podbridge-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("failed to create log file {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false), // No ANSI colors in log file
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
    Ok(())
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        // Terminal must be usable before anything is printed
        let _ = disable_raw_mode();

        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Please check the logs for more details.");
    }));
}
