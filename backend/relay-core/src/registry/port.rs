//! Ports: one bidirectional channel to one foreground client.

use crate::error::port::PortError;
use crate::protocol::ServerMessage;

use common::ErrorLocation;

use std::fmt;
use std::panic::Location;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound half of a connection to a foreground client.
///
/// Implementations must not block; a dead peer is reported as
/// [`PortError::Closed`] rather than by panicking.
pub trait Port: Send + Sync {
    fn send(&self, message: ServerMessage) -> Result<(), PortError>;
}

/// Registry-assigned identity of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(Uuid);

impl PortId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Port backed by an unbounded tokio channel.
///
/// The receiving half is drained by whatever owns the real connection
/// (a WebSocket writer task, a dedicated client). Once it is dropped every
/// send fails with [`PortError::Closed`].
#[derive(Clone, Debug)]
pub struct ChannelPort {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ChannelPort {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Port for ChannelPort {
    fn send(&self, message: ServerMessage) -> Result<(), PortError> {
        self.tx.send(message).map_err(|_| PortError::Closed {
            message: "Receiving side of the port is gone".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
