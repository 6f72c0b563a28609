//! Test helpers for relay integration tests.
//!
//! - Mock config API (wiremock)
//! - Event recorders on a bus or a channel
//! - WebSocket client helpers for the shared host

use relay_core::background::BackgroundContext;
use relay_core::config::{HttpSettings, StaticConfig};
use relay_core::event::{AppEvent, BusEvent, EventBus};
use relay_core::protocol::{ClientMessage, ServerMessage};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const WAIT: Duration = Duration::from_secs(5);
pub const QUIET: Duration = Duration::from_millis(300);

/// Test helper: Serve `body` as JSON on `GET /config`.
pub async fn mount_config(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Test helper: Replace whatever `GET /config` served with `body`.
pub async fn remount_config(server: &MockServer, body: Value) {
    server.reset().await;
    mount_config(server, body).await;
}

pub fn static_config_for(server: &MockServer) -> StaticConfig {
    StaticConfig::default().with_api_server(server.uri())
}

pub fn new_context() -> BackgroundContext {
    BackgroundContext::from_settings(&HttpSettings::default())
        .expect("Failed to build background context")
}

pub fn init_for(server: &MockServer) -> ClientMessage {
    ClientMessage::init(static_config_for(server))
}

/// Test helper: Record every `APP_EVENT` dispatched on `bus`.
pub fn record_app_events(bus: &EventBus) -> Arc<Mutex<Vec<AppEvent>>> {
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&recorded);
    bus.register(move |event| {
        if let BusEvent::App(app_event) = event {
            sink.lock().unwrap().push(app_event.clone());
        }
        Ok(())
    });
    recorded
}

/// Test helper: Wait until at least `count` events were recorded.
pub async fn wait_for_events(recorded: &Arc<Mutex<Vec<AppEvent>>>, count: usize) -> Vec<AppEvent> {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let events = recorded.lock().unwrap().clone();
        if events.len() >= count {
            return events;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for {count} events, got {events:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn names(events: &[AppEvent]) -> Vec<&str> {
    events.iter().map(|event| event.name.as_str()).collect()
}

/// Test helper: Receive the next message from a port channel.
pub async fn next_message(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> ServerMessage {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("Timed out waiting for a message")
        .expect("Port channel closed")
}

/// Test helper: Assert nothing arrives on a port channel for a short while.
pub async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) {
    if let Ok(Some(message)) = tokio::time::timeout(QUIET, rx.recv()).await {
        panic!("Expected no message, got {message:?}");
    }
}

/// Test helper: Connect a raw WebSocket client to a shared host.
pub async fn connect(url: &str) -> TestSocket {
    let (ws, _) = connect_async(url)
        .await
        .expect("Failed to connect to shared host");
    ws
}

pub async fn send_client_message(ws: &mut TestSocket, message: &ClientMessage) {
    let text = message.to_json().expect("Failed to encode message");
    ws.send(Message::Text(text.into()))
        .await
        .expect("Failed to send message");
}

/// Test helper: Receive the next text frame and decode it.
pub async fn receive_server_message(ws: &mut TestSocket) -> ServerMessage {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Connection closed")
            .expect("Error receiving frame");
        match frame {
            Message::Text(text) => {
                return ServerMessage::from_json(text.as_str()).expect("Failed to decode message");
            }
            Message::Close(frame) => panic!("Connection closed: {frame:?}"),
            _ => continue,
        }
    }
}

/// Test helper: Check that no text frame arrives for a short while.
pub async fn assert_no_frame(ws: &mut TestSocket) {
    if let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(QUIET, ws.next()).await {
        panic!("Expected no frame, got {text}");
    }
}
