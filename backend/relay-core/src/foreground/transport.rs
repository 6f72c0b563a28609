//! Transport selection and the two transports a foreground client can open.

use crate::background::{BackgroundContext, WorkerSignal, spawn_dedicated};
use crate::config::HttpSettings;
use crate::error::client::ClientError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::{RELAY_DEFAULT_PORT, RELAY_WS_BASE_URL};

use common::ErrorLocation;

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Which background-hosting primitive a client ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// A shared host, one background context for every client.
    Shared,
    /// A private background context owned by this client.
    Dedicated,
}

type AlertFn = Arc<dyn Fn(&str) + Send + Sync>;

/// What the host environment can offer, probed in priority order:
/// shared first, then dedicated.
#[derive(Clone, Default)]
pub struct HostCapabilities {
    shared: Option<String>,
    dedicated: Option<HttpSettings>,
    alert: Option<AlertFn>,
}

impl HostCapabilities {
    /// An environment that supports nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// A shared host is reachable at `url` (`ws://...`).
    pub fn with_shared(mut self, url: impl Into<String>) -> Self {
        self.shared = Some(url.into());
        self
    }

    /// A shared host is expected at the default relay address.
    pub fn with_default_shared(self) -> Self {
        self.with_shared(format!("{RELAY_WS_BASE_URL}:{RELAY_DEFAULT_PORT}"))
    }

    /// Private background contexts can be spawned, fetching with `settings`.
    pub fn with_dedicated(mut self, settings: HttpSettings) -> Self {
        self.dedicated = Some(settings);
        self
    }

    /// Where user-visible fatal errors go. Without one they are only logged.
    pub fn with_alert<F>(mut self, alert: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.alert = Some(Arc::new(alert));
        self
    }

    pub fn select(&self) -> Option<TransportKind> {
        if self.shared.is_some() {
            Some(TransportKind::Shared)
        } else if self.dedicated.is_some() {
            Some(TransportKind::Dedicated)
        } else {
            None
        }
    }

    pub(crate) fn alert(&self, message: &str) {
        error!("{}", message);
        if let Some(alert) = &self.alert {
            alert(message);
        }
    }

    pub(crate) fn shared_url(&self) -> Option<&str> {
        self.shared.as_deref()
    }

    pub(crate) fn dedicated_settings(&self) -> Option<&HttpSettings> {
        self.dedicated.as_ref()
    }
}

impl fmt::Debug for HostCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCapabilities")
            .field("shared", &self.shared)
            .field("dedicated", &self.dedicated)
            .field("alert", &self.alert.is_some())
            .finish()
    }
}

/// An open transport: where to post, what comes back, what keeps it alive.
pub(crate) struct OpenTransport {
    pub(crate) outbound: mpsc::UnboundedSender<ClientMessage>,
    pub(crate) inbound: mpsc::UnboundedReceiver<WorkerSignal>,
    pub(crate) tasks: Vec<JoinHandle<()>>,
    pub(crate) background: Option<BackgroundContext>,
}

pub(crate) async fn open_shared(url: &str) -> Result<OpenTransport, ClientError> {
    let (ws, _) = connect_async(url).await?;
    info!("Connected to shared background at {}", url);

    let (mut write, mut read) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientMessage>();
    let (signal_tx, signal_rx) = mpsc::unbounded_channel::<WorkerSignal>();

    let writer_signal = signal_tx.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let text = match message.to_json() {
                Ok(text) => text,
                Err(e) => {
                    warn!("Dropping unserializable message '{}': {}", message.name, e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(text.into())).await {
                let signal = WorkerSignal::Error(format!("Send failed: {e}"));
                if writer_signal.send(signal).is_err() {
                    debug!("Client gone before the send failure could be reported");
                }
                return;
            }
        }
        debug!("Client side closed, closing shared channel");
        if let Err(e) = write.close().await {
            debug!("Shared channel close failed: {}", e);
        }
    });

    let reader = tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match ServerMessage::from_json(text.as_str()) {
                    Ok(message) => {
                        if signal_tx.send(WorkerSignal::Message(message)).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Ignoring malformed message from background: {}", e),
                },
                Ok(Message::Close(Some(frame))) if frame.code != CloseCode::Normal => {
                    let signal = WorkerSignal::Error(format!(
                        "Background closed the channel ({}): {}",
                        u16::from(frame.code),
                        frame.reason.as_str()
                    ));
                    if signal_tx.send(signal).is_err() {
                        debug!("Client gone before the close could be reported");
                    }
                    return;
                }
                Ok(Message::Close(_)) => return,
                Ok(_) => {}
                Err(e) => {
                    if signal_tx.send(WorkerSignal::Error(e.to_string())).is_err() {
                        debug!("Client gone before the read failure could be reported");
                    }
                    return;
                }
            }
        }
    });

    Ok(OpenTransport {
        outbound: outbound_tx,
        inbound: signal_rx,
        tasks: vec![writer, reader],
        background: None,
    })
}

pub(crate) fn open_dedicated(settings: &HttpSettings) -> Result<OpenTransport, ClientError> {
    let context =
        BackgroundContext::from_settings(settings).map_err(|e| ClientError::Channel {
            message: format!("Cannot create dedicated background: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
    let worker = spawn_dedicated(context);

    Ok(OpenTransport {
        outbound: worker.outbound,
        inbound: worker.inbound,
        tasks: vec![worker.task],
        background: Some(worker.context),
    })
}
