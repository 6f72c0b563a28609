use crate::helpers::{
    WAIT, mount_config, names, new_context, record_app_events, static_config_for,
    wait_for_events,
};

use relay_core::background::start_shared_host;
use relay_core::config::{HttpSettings, StaticConfig};
use relay_core::error::client::ClientError;
use relay_core::event::{AUTH_CHANGE, CONFIG_READY, EventBus};
use relay_core::foreground::{
    COMPATIBILITY_ALERT, ForegroundClient, HostCapabilities, TransportKind,
};
use relay_core::protocol::ClientMessage;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use serde_json::json;
use wiremock::MockServer;

/// **VALUE**: With no usable transport the client alerts and fails.
///
/// **WHY THIS MATTERS**: This is the only user-visible failure of the
/// foreground layer; it must never degrade into a client that waits forever.
#[tokio::test]
async fn given_no_transport_when_run_then_alert_and_transport_unavailable() {
    // GIVEN: An environment with nothing but an alert sink
    let alerts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&alerts);
    let capabilities =
        HostCapabilities::none().with_alert(move |message| sink.lock().unwrap().push(message.to_string()));

    // WHEN
    let result =
        ForegroundClient::run(&capabilities, StaticConfig::default(), EventBus::new()).await;

    // THEN
    assert!(matches!(
        result,
        Err(ClientError::TransportUnavailable { .. })
    ));
    assert_eq!(*alerts.lock().unwrap(), vec![COMPATIBILITY_ALERT.to_string()]);
}

#[test]
fn given_both_transports_when_select_then_shared_preferred() {
    let both = HostCapabilities::none()
        .with_dedicated(HttpSettings::default())
        .with_shared("ws://127.0.0.1:1");
    let dedicated_only = HostCapabilities::none().with_dedicated(HttpSettings::default());

    assert_eq!(both.select(), Some(TransportKind::Shared));
    assert_eq!(dedicated_only.select(), Some(TransportKind::Dedicated));
    assert_eq!(HostCapabilities::none().select(), None);
}

/// **VALUE**: On a dedicated transport the client bootstraps its own context and
/// republishes the events locally.
#[tokio::test]
async fn given_dedicated_transport_when_run_then_events_on_local_bus() {
    // GIVEN
    let server = MockServer::start().await;
    mount_config(&server, json!({ "user": { "id": 1 } })).await;
    let bus = EventBus::new();
    let recorded = record_app_events(&bus);
    let capabilities = HostCapabilities::none().with_dedicated(HttpSettings::default());

    // WHEN
    let client = ForegroundClient::run(&capabilities, static_config_for(&server), bus)
        .await
        .unwrap();

    // THEN
    let events = wait_for_events(&recorded, 2).await;
    assert_eq!(names(&events), vec![CONFIG_READY, AUTH_CHANGE]);
    assert_eq!(client.transport(), TransportKind::Dedicated);
    let background = client.background().expect("Dedicated context expected");
    assert!(background.store().is_authenticated());
}

#[tokio::test]
async fn given_shared_transport_when_run_then_events_on_local_bus() {
    // GIVEN: A running shared host
    let server = MockServer::start().await;
    mount_config(&server, json!({})).await;
    let address: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let host = start_shared_host(address, new_context()).await.unwrap();
    let bus = EventBus::new();
    let recorded = record_app_events(&bus);
    let capabilities = HostCapabilities::none()
        .with_shared(host.url())
        .with_dedicated(HttpSettings::default());

    // WHEN
    let client = ForegroundClient::run(&capabilities, static_config_for(&server), bus)
        .await
        .unwrap();

    // THEN
    let events = wait_for_events(&recorded, 1).await;
    assert_eq!(names(&events), vec![CONFIG_READY]);
    assert_eq!(client.transport(), TransportKind::Shared);
    assert!(client.background().is_none());
}

/// **VALUE**: A client joining a bootstrapped shared host still learns the
/// configuration is ready, through replay.
#[tokio::test]
async fn given_bootstrapped_shared_host_when_second_client_runs_then_replayed() {
    let server = MockServer::start().await;
    mount_config(&server, json!({})).await;
    let address: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let host = start_shared_host(address, new_context()).await.unwrap();
    let capabilities = HostCapabilities::none().with_shared(host.url());

    let first_bus = EventBus::new();
    let first_events = record_app_events(&first_bus);
    let _first = ForegroundClient::run(&capabilities, static_config_for(&server), first_bus)
        .await
        .unwrap();
    wait_for_events(&first_events, 1).await;

    let second_bus = EventBus::new();
    let second_events = record_app_events(&second_bus);
    let _second = ForegroundClient::run(&capabilities, static_config_for(&server), second_bus)
        .await
        .unwrap();

    let events = wait_for_events(&second_events, 1).await;
    assert_eq!(names(&events), vec![CONFIG_READY]);
}

/// **VALUE**: A channel error ends the client with a fatal error.
///
/// **BUG THIS CATCHES**: Would catch a close with code 1011 being treated like
/// a normal shutdown.
#[tokio::test]
async fn given_shared_host_failing_bootstrap_when_join_then_channel_error() {
    // GIVEN: A host and a client with no API_SERVER to bootstrap with
    let address: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let host = start_shared_host(address, new_context()).await.unwrap();
    let capabilities = HostCapabilities::none().with_shared(host.url());

    // WHEN
    let client = ForegroundClient::run(&capabilities, StaticConfig::default(), EventBus::new())
        .await
        .unwrap();
    let result = tokio::time::timeout(WAIT, client.join())
        .await
        .expect("Timed out waiting for the client to end");

    // THEN
    assert!(matches!(result, Err(ClientError::Channel { .. })));
}

#[tokio::test]
async fn given_dedicated_bootstrap_failure_when_join_then_channel_error() {
    let capabilities = HostCapabilities::none().with_dedicated(HttpSettings::default());

    let client = ForegroundClient::run(&capabilities, StaticConfig::default(), EventBus::new())
        .await
        .unwrap();
    let result = tokio::time::timeout(WAIT, client.join()).await.unwrap();

    assert!(matches!(result, Err(ClientError::Channel { .. })));
}

#[tokio::test]
async fn given_unreachable_shared_host_when_run_then_channel_error() {
    // Nothing listens on the discard port
    let capabilities = HostCapabilities::none().with_shared("ws://127.0.0.1:9");

    let result =
        ForegroundClient::run(&capabilities, StaticConfig::default(), EventBus::new()).await;

    assert!(matches!(result, Err(ClientError::Channel { .. })));
}

#[tokio::test]
async fn given_running_client_when_posting_custom_message_then_ok_and_clean_join() {
    let capabilities = HostCapabilities::none().with_dedicated(HttpSettings::default());
    let server = MockServer::start().await;
    mount_config(&server, json!({})).await;
    let client = ForegroundClient::run(&capabilities, static_config_for(&server), EventBus::new())
        .await
        .unwrap();

    client.post_message(ClientMessage::named("ping")).unwrap();

    let result = tokio::time::timeout(WAIT, client.join()).await.unwrap();
    assert!(result.is_ok());
}
