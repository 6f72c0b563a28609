//! Shared background host.
//!
//! Serves one [`BackgroundContext`] to any number of foreground clients over
//! WebSocket on localhost. Each connection:
//!
//! - is rejected silently unless it comes from a loopback address
//! - becomes one port in the context's registry for as long as it is open
//! - carries the JSON wire protocol in text frames; other frames are ignored
//!
//! If handling a message fails (a bus subscriber returned an error), the
//! connection is closed with code 1011 so the client sees a channel error.

use crate::background::BackgroundContext;
use crate::error::ipc::IpcError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{ChannelPort, InboundMessage, Port, PortId, PortRegistry};

use common::ErrorLocation;

use std::net::SocketAddr;
use std::panic::Location;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async};

/// Handle to a running shared host.
///
/// Dropping the handle leaves the host running; call [`SharedHostHandle::shutdown`]
/// to stop accepting new connections.
pub struct SharedHostHandle {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl SharedHostHandle {
    /// Address actually bound (useful with port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://` URL foreground clients connect to.
    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Stops accepting connections. Open connections keep running.
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }
}

/// Binds `address` and serves `context` to every connecting client.
///
/// # Errors
///
/// Returns [`IpcError::Bind`] if the address cannot be bound.
pub async fn start_shared_host(
    address: SocketAddr,
    context: BackgroundContext,
) -> Result<SharedHostHandle, IpcError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|e| IpcError::Bind {
            message: format!("Cannot bind {address}: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
    let local_addr = listener.local_addr()?;

    info!("Shared background host listening on {}", local_addr);

    let accept_task = tokio::spawn(async move {
        while let Ok((stream, addr)) = listener.accept().await {
            info!("Client connecting from {}", addr);
            let registry = context.registry().clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, registry).await {
                    error!("Connection {} ended with error: {}", addr, e);
                }
            });
        }
    });

    Ok(SharedHostHandle {
        local_addr,
        accept_task,
    })
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: PortRegistry,
) -> Result<(), IpcError> {
    if !addr.ip().is_loopback() {
        warn!("Rejected non-loopback connection from {}", addr);
        return Ok(());
    }

    let ws_stream = accept_async(stream).await.map_err(|e| IpcError::Handshake {
        message: format!("WebSocket handshake failed: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    let (port, outbound) = ChannelPort::new();
    let port: Arc<dyn Port> = Arc::new(port);
    let port_id = registry.add_port(Arc::clone(&port));

    let result = serve(ws_stream, addr, &registry, port, outbound).await;

    registry.remove_port(port_id);
    info!("Client {} disconnected (port {})", addr, port_id);
    result
}

async fn serve(
    mut ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    registry: &PortRegistry,
    port: Arc<dyn Port>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
) -> Result<(), IpcError> {
    loop {
        tokio::select! {
            outgoing = outbound.recv() => {
                let Some(message) = outgoing else {
                    return Ok(());
                };
                send_message(&mut ws, &message).await?;
            }
            incoming = ws.next() => {
                let message = match incoming {
                    None => return Ok(()),
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        return Err(IpcError::Read {
                            message: format!("Error reading message: {e}"),
                            location: ErrorLocation::from(Location::caller()),
                        });
                    }
                };

                match message {
                    Message::Text(text) => {
                        let data = match ClientMessage::from_json(text.as_str()) {
                            Ok(data) => data,
                            Err(e) => {
                                warn!("Client {} sent invalid JSON: {}", addr, e);
                                continue;
                            }
                        };
                        let inbound = InboundMessage::new(data, Arc::clone(&port));
                        if let Err(e) = registry.handle_message(inbound) {
                            error!("Error handling message from {}: {}", addr, e);
                            close_with_error(&mut ws, &e.to_string()).await?;
                            return Ok(());
                        }
                    }
                    Message::Close(_) => return Ok(()),
                    _ => debug!("Client {} sent a non-text frame, ignoring", addr),
                }
            }
        }
    }
}

async fn send_message(
    ws: &mut WebSocketStream<TcpStream>,
    message: &ServerMessage,
) -> Result<(), IpcError> {
    let text = message.to_json()?;
    ws.send(Message::Text(text.into()))
        .await
        .map_err(|e| IpcError::Send {
            message: format!("Failed to send message: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}

async fn close_with_error(
    ws: &mut WebSocketStream<TcpStream>,
    reason: &str,
) -> Result<(), IpcError> {
    let frame = CloseFrame {
        code: CloseCode::Error,
        reason: reason.to_string().into(),
    };
    ws.send(Message::Close(Some(frame)))
        .await
        .map_err(|e| IpcError::Send {
            message: format!("Failed to send close frame: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}
