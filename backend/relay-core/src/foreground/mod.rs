//! Foreground client.
//!
//! Opens a background context, hands it this client's static configuration,
//! and republishes every `APP_EVENT` it receives on a local [`EventBus`] for
//! the application to consume.
//!
//! # States
//!
//! ```text
//! select transport ──(none available)──► TransportUnavailable (alert + error)
//!        │
//!        ▼
//!     running ──(channel error)──► Channel (fatal, no reconnect)
//! ```

mod transport;

pub use transport::{HostCapabilities, TransportKind};

use crate::background::{BackgroundContext, WorkerSignal};
use crate::config::StaticConfig;
use crate::error::client::ClientError;
use crate::event::{BusEvent, EventBus};
use crate::protocol::ClientMessage;

use common::ErrorLocation;

use std::panic::Location;

use log::{debug, error};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const COMPATIBILITY_ALERT: &str = "Host compatibility error!";

pub struct ForegroundClient {
    kind: TransportKind,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    pump: JoinHandle<Result<(), ClientError>>,
    tasks: Vec<JoinHandle<()>>,
    background: Option<BackgroundContext>,
}

impl ForegroundClient {
    /// Selects and opens a transport, then sends `init` with `static_config`.
    ///
    /// # Errors
    ///
    /// - [`ClientError::TransportUnavailable`] if `capabilities` offers nothing
    ///   (the alert sink is notified first)
    /// - [`ClientError::Channel`] if the selected transport cannot be opened
    pub async fn run(
        capabilities: &HostCapabilities,
        static_config: StaticConfig,
        bus: EventBus,
    ) -> Result<Self, ClientError> {
        let Some(kind) = capabilities.select() else {
            capabilities.alert(COMPATIBILITY_ALERT);
            return Err(ClientError::TransportUnavailable {
                message: "Neither a shared nor a dedicated background is supported".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let opened = match kind {
            TransportKind::Shared => {
                let url = capabilities.shared_url().unwrap_or_default();
                transport::open_shared(url).await?
            }
            TransportKind::Dedicated => {
                let settings = capabilities.dedicated_settings().cloned().unwrap_or_default();
                transport::open_dedicated(&settings)?
            }
        };

        let pump = tokio::spawn(pump(opened.inbound, bus));
        let client = Self {
            kind,
            outbound: opened.outbound,
            pump,
            tasks: opened.tasks,
            background: opened.background,
        };

        client.post_message(ClientMessage::init(static_config))?;
        Ok(client)
    }

    pub fn transport(&self) -> TransportKind {
        self.kind
    }

    /// The private background context, when running on a dedicated transport.
    pub fn background(&self) -> Option<&BackgroundContext> {
        self.background.as_ref()
    }

    /// Sends an arbitrary message to the background context.
    pub fn post_message(&self, data: ClientMessage) -> Result<(), ClientError> {
        debug!("ForegroundClient.post_message {:?}", data);
        self.outbound.send(data).map_err(|e| ClientError::Send {
            message: format!("Background channel is closed: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Closes the outbound side and waits for the inbound side to finish.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that ended the client, if any.
    pub async fn join(self) -> Result<(), ClientError> {
        let Self {
            outbound,
            pump,
            tasks,
            background,
            ..
        } = self;
        drop(outbound);
        drop(background);

        let result = match pump.await {
            Ok(result) => result,
            Err(e) => Err(ClientError::Channel {
                message: format!("Inbound task failed: {e}"),
                location: ErrorLocation::from(Location::caller()),
            }),
        };
        for task in tasks {
            task.abort();
        }
        result
    }
}

/// Relays inbound signals onto the local bus until the channel closes or fails.
async fn pump(
    mut inbound: mpsc::UnboundedReceiver<WorkerSignal>,
    bus: EventBus,
) -> Result<(), ClientError> {
    while let Some(signal) = inbound.recv().await {
        match signal {
            WorkerSignal::Message(message) => {
                debug!("ForegroundClient.handle_message {:?}", message);
                if let Some(event) = message.into_app_event() {
                    bus.dispatch(&BusEvent::App(event))?;
                }
            }
            WorkerSignal::Error(message) => {
                error!("Background channel error: {}", message);
                return Err(ClientError::Channel {
                    message,
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        }
    }
    Ok(())
}
