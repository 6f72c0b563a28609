//! Dedicated (private) background context, one per foreground client.

use crate::background::BackgroundContext;
use crate::error::port::PortError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{InboundMessage, Port};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What a dedicated background sends back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerSignal {
    Message(ServerMessage),
    /// Handling a message failed inside the background context.
    Error(String),
}

/// The owner's end of a dedicated background.
pub struct DedicatedWorker {
    pub outbound: mpsc::UnboundedSender<ClientMessage>,
    pub inbound: mpsc::UnboundedReceiver<WorkerSignal>,
    pub context: BackgroundContext,
    pub task: JoinHandle<()>,
}

struct SignalPort {
    tx: mpsc::UnboundedSender<WorkerSignal>,
}

impl Port for SignalPort {
    fn send(&self, message: ServerMessage) -> Result<(), PortError> {
        self.tx
            .send(WorkerSignal::Message(message))
            .map_err(|_| PortError::Closed {
                message: "Dedicated worker owner is gone".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

/// Runs `context` privately on a tokio task with a single port.
///
/// The task ends once the owner drops `outbound`.
pub fn spawn_dedicated(context: BackgroundContext) -> DedicatedWorker {
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<ClientMessage>();
    let (signal_tx, signal_rx) = mpsc::unbounded_channel::<WorkerSignal>();

    let port: Arc<dyn Port> = Arc::new(SignalPort {
        tx: signal_tx.clone(),
    });
    let registry = context.registry().clone();
    registry.add_port(Arc::clone(&port));

    let task = tokio::spawn(async move {
        info!("Dedicated background started");
        while let Some(data) = client_rx.recv().await {
            let inbound = InboundMessage::new(data, Arc::clone(&port));
            if let Err(e) = registry.handle_message(inbound) {
                error!("Dedicated background failed handling a message: {}", e);
                if signal_tx.send(WorkerSignal::Error(e.to_string())).is_err() {
                    debug!("Owner gone before the error could be reported");
                }
            }
        }
        info!("Dedicated background stopped");
    });

    DedicatedWorker {
        outbound: client_tx,
        inbound: signal_rx,
        context,
        task,
    }
}
