// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tkv daemon (tkvd)
//!
//! Single-node key-value service that recovers its state from the
//! transaction log at startup.
//!
//! Usage: `tkvd [--verify] [CONFIG]`

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use tkv_daemon::{lifecycle, Config, LifecycleError};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tkvd: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let mut verify = false;
    let mut config_path: Option<PathBuf> = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--verify" => verify = true,
            flag if flag.starts_with("--") => {
                return Err(format!("unknown flag: {flag}\nusage: tkvd [--verify] [CONFIG]").into())
            }
            path => config_path = Some(PathBuf::from(path)),
        }
    }

    // Load configuration
    let config = Config::load(config_path.as_deref())?;

    if verify {
        let report = lifecycle::verify(&config).await?;
        println!(
            "Replayed {} events (last sequence {})",
            report.events_applied, report.last_sequence
        );
        println!("Keys: {}", report.keys);
        return Ok(());
    }

    // Write startup marker to log (before tracing setup)
    write_startup_marker(&config)?;

    // Set up logging
    let log_guard = setup_logging(&config)?;

    info!("Starting tkvd with {} log at {}", config.backend.kind(), config.backend);

    // Start daemon
    let mut daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            // Write error synchronously (tracing is non-blocking and may not flush in time)
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Set up signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let stop = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
        }
    };

    info!("Daemon ready, listening on {}", daemon.local_addr()?);

    // Signal ready for parent process (e.g., systemd, scripts waiting for startup)
    println!("READY");

    if let Err(e) = daemon.run(stop).await {
        error!("Daemon stopped with error: {}", e);
        drop(log_guard);
        return Err(e.into());
    }

    info!("Daemon stopped");
    Ok(())
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- tkvd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- tkvd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    // Create log directory if needed
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = config
        .log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("log path has no parent directory"))?;
    let log_file = config
        .log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Set up subscriber with env filter
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
