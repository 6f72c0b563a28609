//! Runs one shared background context until told to stop.

use crate::error::HostError;

use relay_core::background::{BackgroundContext, SharedHostHandle, start_shared_host};
use relay_core::config::RelaySettings;

use std::future::Future;

use log::info;

/// Validates `settings`, builds a background context and starts serving it.
pub async fn start(settings: &RelaySettings) -> Result<SharedHostHandle, HostError> {
    settings.validate()?;
    let address = settings.socket_addr()?;

    let context = BackgroundContext::from_settings(&settings.http)?;
    let handle = start_shared_host(address, context).await?;

    info!("Relay host ready at {}", handle.url());
    Ok(handle)
}

/// [`start`], then wait for `shutdown` and stop accepting connections.
pub async fn serve<F>(settings: &RelaySettings, shutdown: F) -> Result<(), HostError>
where
    F: Future<Output = ()>,
{
    let handle = start(settings).await?;

    shutdown.await;

    handle.shutdown();
    info!("Relay host stopped");
    Ok(())
}
