use crate::helpers::{
    assert_silent, init_for, mount_config, new_context, next_message, record_app_events,
};

use relay_core::background::{WorkerSignal, spawn_dedicated};
use relay_core::config::StaticConfig;
use relay_core::event::{AUTH_CHANGE, AppEvent, CONFIG_READY};
use relay_core::protocol::{ClientMessage, ServerMessage};
use relay_core::registry::{ChannelPort, InboundMessage, Port};

use std::sync::Arc;

use serde_json::json;
use wiremock::MockServer;

/// **VALUE**: The first `init` bootstraps the store, fetches, and broadcasts the
/// result to every registered port.
///
/// **WHY THIS MATTERS**: This is the whole startup path of a background context.
///
/// **BUG THIS CATCHES**: Would catch the bootstrap subscription not being
/// installed, or the fetch outcome not reaching the registry.
#[tokio::test]
async fn given_first_init_when_handled_then_fetch_result_broadcast_to_all_ports() {
    // GIVEN: A context with two ports
    let server = MockServer::start().await;
    mount_config(&server, json!({ "user": { "id": 1 } })).await;
    let context = new_context();
    let (first, mut first_rx) = ChannelPort::new();
    let (second, mut second_rx) = ChannelPort::new();
    let first: Arc<dyn Port> = Arc::new(first);
    context.registry().add_port(Arc::clone(&first));
    context.registry().add_port(Arc::new(second));

    // WHEN: The first port sends init
    context
        .registry()
        .handle_message(InboundMessage::new(init_for(&server), first))
        .unwrap();

    // THEN: Both ports receive CONFIG_READY then AUTH_CHANGE
    for rx in [&mut first_rx, &mut second_rx] {
        assert_eq!(
            next_message(rx).await,
            ServerMessage::app_event(AppEvent::config_ready())
        );
        assert_eq!(
            next_message(rx).await,
            ServerMessage::app_event(AppEvent::auth_change(true))
        );
    }
}

/// **VALUE**: A late joiner gets the last pending events replayed to it alone.
///
/// **WHY THIS MATTERS**: A tab opened after startup would otherwise never learn
/// that configuration is ready.
///
/// **BUG THIS CATCHES**: Would catch the replay being broadcast (every other tab
/// sees a duplicate `CONFIG_READY`) or skipped.
#[tokio::test]
async fn given_settled_fetch_when_second_port_inits_then_replay_to_that_port_only() {
    // GIVEN: A bootstrapped context whose fetch has settled
    let server = MockServer::start().await;
    mount_config(&server, json!({})).await;
    let context = new_context();
    let (first, mut first_rx) = ChannelPort::new();
    let first: Arc<dyn Port> = Arc::new(first);
    context.registry().add_port(Arc::clone(&first));
    context
        .registry()
        .handle_message(InboundMessage::new(init_for(&server), first))
        .unwrap();
    assert_eq!(
        next_message(&mut first_rx).await,
        ServerMessage::app_event(AppEvent::config_ready())
    );
    assert!(!context.store().is_fetch_in_progress());

    // WHEN: A second port joins and sends init
    let (second, mut second_rx) = ChannelPort::new();
    let second: Arc<dyn Port> = Arc::new(second);
    context.registry().add_port(Arc::clone(&second));
    context
        .registry()
        .handle_message(InboundMessage::new(init_for(&server), second))
        .unwrap();

    // THEN: Only the second port gets [CONFIG_READY]
    assert_eq!(
        next_message(&mut second_rx).await,
        ServerMessage::app_event(AppEvent::config_ready())
    );
    assert_silent(&mut second_rx).await;
    assert_silent(&mut first_rx).await;
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(1));
}

#[tokio::test]
async fn given_init_without_api_server_when_handled_then_bootstrap_error_returned() {
    // GIVEN: Nothing to fetch from
    let context = new_context();
    let (port, _rx) = ChannelPort::new();

    // WHEN
    let result = context.registry().handle_message(InboundMessage::new(
        ClientMessage::init(StaticConfig::default()),
        Arc::new(port),
    ));

    // THEN: The subscriber failure surfaces to the sender's handler
    let error = result.unwrap_err();
    assert!(error.to_string().contains("API_SERVER"));
    assert!(context.registry().is_config_initialized());
}

#[tokio::test]
async fn given_two_contexts_when_one_bootstraps_then_other_untouched() {
    let server = MockServer::start().await;
    mount_config(&server, json!({ "user": {} })).await;
    let bootstrapped = new_context();
    let isolated = new_context();
    let recorded = record_app_events(isolated.bus());
    let (port, mut rx) = ChannelPort::new();
    let port: Arc<dyn Port> = Arc::new(port);
    bootstrapped.registry().add_port(Arc::clone(&port));

    bootstrapped
        .registry()
        .handle_message(InboundMessage::new(init_for(&server), port))
        .unwrap();
    next_message(&mut rx).await;

    assert!(bootstrapped.store().is_authenticated());
    assert!(!isolated.store().is_authenticated());
    assert!(!isolated.registry().is_config_initialized());
    assert!(recorded.lock().unwrap().is_empty());
}

/// **VALUE**: A dedicated worker runs the same startup path over channels.
#[tokio::test]
async fn given_dedicated_worker_when_init_sent_then_events_signalled() {
    // GIVEN
    let server = MockServer::start().await;
    mount_config(&server, json!({ "user": { "id": 1 } })).await;
    let mut worker = spawn_dedicated(new_context());

    // WHEN
    worker.outbound.send(init_for(&server)).unwrap();

    // THEN
    let mut names = Vec::new();
    while names.len() < 2 {
        let signal = tokio::time::timeout(crate::helpers::WAIT, worker.inbound.recv())
            .await
            .expect("Timed out waiting for a signal")
            .expect("Worker gone");
        match signal {
            WorkerSignal::Message(message) => {
                names.push(message.into_app_event().expect("Expected APP_EVENT").name)
            }
            WorkerSignal::Error(e) => panic!("Unexpected worker error: {e}"),
        }
    }
    assert_eq!(names, vec![CONFIG_READY, AUTH_CHANGE]);
}

#[tokio::test]
async fn given_dedicated_worker_when_ping_sent_then_hello_signalled() {
    let mut worker = spawn_dedicated(new_context());

    worker.outbound.send(ClientMessage::named("ping")).unwrap();

    let signal = tokio::time::timeout(crate::helpers::WAIT, worker.inbound.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(signal, WorkerSignal::Message(ServerMessage::hello()));
}

#[tokio::test]
async fn given_dedicated_worker_when_bootstrap_fails_then_error_signalled() {
    let mut worker = spawn_dedicated(new_context());

    worker
        .outbound
        .send(ClientMessage::init(StaticConfig::default()))
        .unwrap();

    let signal = tokio::time::timeout(crate::helpers::WAIT, worker.inbound.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(signal, WorkerSignal::Error(_)));
}
