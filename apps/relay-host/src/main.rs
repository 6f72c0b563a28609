use relay_host::error::HostError;
use relay_host::host::serve;
use relay_host::logger::initialize as LoggerInitialize;

use relay_core::config::RelaySettings;

use common::ErrorLocation;

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info, warn};

const APP_DIR_NAME: &str = "relay-host";

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), HostError> {
    let config_dir = app_dir(dirs::config_dir(), "config")?;
    let log_dir = app_dir(dirs::data_local_dir(), "data")?.join("logs");

    create_dir_all(&log_dir).map_err(|e| HostError::Host {
        message: format!("Failed to create log directory: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    // Initialize logger FIRST
    LoggerInitialize(&log_dir)?;

    info!("Relay host starting");
    info!("Config directory: {}", config_dir.display());
    info!("Log directory: {}", log_dir.display());

    let settings = RelaySettings::load(&config_dir)?;

    serve(&settings, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C, stopping: {e}");
        }
    })
    .await
}

#[track_caller]
fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf, HostError> {
    base.map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| HostError::Host {
            message: format!("No {kind} directory on this platform"),
            location: ErrorLocation::from(Location::caller()),
        })
}
