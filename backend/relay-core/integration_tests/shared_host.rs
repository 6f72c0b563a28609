use crate::helpers::{
    WAIT, assert_no_frame, connect, init_for, mount_config, new_context, receive_server_message,
    send_client_message,
};

use relay_core::background::{SharedHostHandle, start_shared_host};
use relay_core::config::StaticConfig;
use relay_core::event::AppEvent;
use relay_core::protocol::{ClientMessage, ServerMessage};
use relay_core::registry::PortRegistry;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use wiremock::MockServer;

async fn start_host() -> (SharedHostHandle, PortRegistry) {
    let context = new_context();
    let registry = context.registry().clone();
    let address: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let handle = start_shared_host(address, context)
        .await
        .expect("Failed to start shared host");
    (handle, registry)
}

async fn wait_for_port_count(registry: &PortRegistry, expected: usize) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while registry.port_count() != expected {
        if tokio::time::Instant::now() > deadline {
            panic!(
                "Expected {expected} ports, still have {}",
                registry.port_count()
            );
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// **VALUE**: An unrecognized message gets the handshake reply.
///
/// **WHY THIS MATTERS**: Clients use any non-init message as a liveness probe.
#[tokio::test]
async fn given_connected_client_when_ping_sent_then_hello_received() {
    // GIVEN
    let (host, _registry) = start_host().await;
    let mut ws = connect(&host.url()).await;

    // WHEN
    send_client_message(&mut ws, &ClientMessage::named("ping")).await;

    // THEN
    assert_eq!(receive_server_message(&mut ws).await, ServerMessage::hello());
}

/// **VALUE**: Two clients of one host share a single background context.
///
/// **BUG THIS CATCHES**: Would catch a context being created per connection,
/// which re-fetches per tab and breaks replay.
#[tokio::test]
async fn given_two_clients_when_both_init_then_first_gets_broadcast_second_gets_replay() {
    // GIVEN: A host and a config API
    let server = MockServer::start().await;
    mount_config(&server, json!({})).await;
    let (host, registry) = start_host().await;
    let mut first = connect(&host.url()).await;
    let mut second = connect(&host.url()).await;
    wait_for_port_count(&registry, 2).await;

    // WHEN: The first client bootstraps
    send_client_message(&mut first, &init_for(&server)).await;

    // THEN: Both see the broadcast
    let ready = ServerMessage::app_event(AppEvent::config_ready());
    assert_eq!(receive_server_message(&mut first).await, ready);
    assert_eq!(receive_server_message(&mut second).await, ready);

    // WHEN: The second client sends init after the fetch settled
    send_client_message(&mut second, &init_for(&server)).await;

    // THEN: Only it gets the replay
    assert_eq!(receive_server_message(&mut second).await, ready);
    assert_no_frame(&mut first).await;
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(1));
}

#[tokio::test]
async fn given_invalid_json_when_sent_then_ignored_and_connection_kept() {
    let (host, _registry) = start_host().await;
    let mut ws = connect(&host.url()).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    send_client_message(&mut ws, &ClientMessage::named("ping")).await;

    assert_eq!(receive_server_message(&mut ws).await, ServerMessage::hello());
}

/// **VALUE**: A bootstrap failure closes the connection with an error code.
///
/// **WHY THIS MATTERS**: The client treats a channel error as fatal; a silent
/// failure would leave it waiting for `CONFIG_READY` forever.
#[tokio::test]
async fn given_init_without_api_server_when_sent_then_closed_with_error_code() {
    // GIVEN
    let (host, registry) = start_host().await;
    let mut ws = connect(&host.url()).await;

    // WHEN
    send_client_message(&mut ws, &ClientMessage::init(StaticConfig::default())).await;

    // THEN
    let frame = tokio::time::timeout(WAIT, ws.next())
        .await
        .expect("Timed out waiting for close")
        .expect("Stream ended without a close frame")
        .expect("Error receiving frame");
    match frame {
        Message::Close(Some(close)) => assert_eq!(close.code, CloseCode::Error),
        other => panic!("Expected a close frame, got {other:?}"),
    }
    wait_for_port_count(&registry, 0).await;
}

#[tokio::test]
async fn given_client_disconnects_when_connection_ends_then_port_removed() {
    let (host, registry) = start_host().await;
    let mut ws = connect(&host.url()).await;
    wait_for_port_count(&registry, 1).await;

    ws.close(None).await.unwrap();

    wait_for_port_count(&registry, 0).await;
}

#[tokio::test]
async fn given_shutdown_host_when_connecting_then_refused() {
    let (host, _registry) = start_host().await;
    let url = host.url();

    host.shutdown();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(tokio_tungstenite::connect_async(&url).await.is_err());
}

/// **VALUE**: An application message whose `config` is not a bootstrap
/// configuration still gets the handshake reply.
///
/// **BUG THIS CATCHES**: Would catch such frames failing to parse and being
/// dropped with only a warning.
#[tokio::test]
async fn given_custom_message_with_string_config_when_sent_then_hello_received() {
    // GIVEN
    let (host, _registry) = start_host().await;
    let mut ws = connect(&host.url()).await;

    // WHEN
    ws.send(Message::Text(r#"{"name":"ping","config":"dark"}"#.into()))
        .await
        .unwrap();

    // THEN
    assert_eq!(receive_server_message(&mut ws).await, ServerMessage::hello());
}
