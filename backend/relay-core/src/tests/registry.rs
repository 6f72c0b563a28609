// Unit tests for the port registry
// Bootstrap latch, handshake reply, and broadcast isolation

use crate::config::{HttpSettings, StaticConfig};
use crate::error::port::PortError;
use crate::event::{AppEvent, BusEvent, EventBus};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{ChannelPort, InboundMessage, Port, PortRegistry};
use crate::store::{ConfigHttpClient, ConfigStore};

use common::ErrorLocation;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingPort {
    sent: Mutex<Vec<ServerMessage>>,
}

impl RecordingPort {
    fn sent(&self) -> Vec<ServerMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Port for RecordingPort {
    fn send(&self, message: ServerMessage) -> Result<(), PortError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

struct BrokenPort;

impl Port for BrokenPort {
    fn send(&self, _message: ServerMessage) -> Result<(), PortError> {
        Err(PortError::Closed {
            message: "gone".to_string(),
            location: ErrorLocation::caller(),
        })
    }
}

fn registry() -> (EventBus, PortRegistry) {
    let bus = EventBus::new();
    let client = ConfigHttpClient::new(&HttpSettings::default()).unwrap();
    let store = ConfigStore::new(bus.clone(), client);
    let registry = PortRegistry::new(bus.clone(), store);
    (bus, registry)
}

fn record_static_configs(bus: &EventBus) -> Arc<Mutex<Vec<StaticConfig>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.register(move |event| {
        if let BusEvent::StaticConfig(config) = event {
            sink.lock().unwrap().push(config.clone());
        }
        Ok(())
    });
    seen
}

/// **VALUE**: Only the first `init` ever publishes `STATIC_CONFIG`.
///
/// **WHY THIS MATTERS**: Every tab sends `init`. Re-publishing would re-bootstrap
/// the store and trigger a fetch per tab.
///
/// **BUG THIS CATCHES**: Would catch the latch being per-port instead of
/// per-registry, or a later config overwriting the first one.
#[test]
fn given_two_inits_from_different_ports_when_handled_then_static_config_published_once() {
    // GIVEN: Two ports and a STATIC_CONFIG observer
    let (bus, registry) = registry();
    let seen = record_static_configs(&bus);
    let first: Arc<dyn Port> = Arc::new(RecordingPort::default());
    let second: Arc<dyn Port> = Arc::new(RecordingPort::default());
    let first_config = StaticConfig::default().with_api_server("https://first.example.com");
    let second_config = StaticConfig::default().with_api_server("https://second.example.com");

    // WHEN: Both send init
    registry
        .handle_message(InboundMessage::new(ClientMessage::init(first_config.clone()), first))
        .unwrap();
    registry
        .handle_message(InboundMessage::new(ClientMessage::init(second_config), second))
        .unwrap();

    // THEN: One publication, carrying the first config
    assert_eq!(*seen.lock().unwrap(), vec![first_config]);
    assert!(registry.is_config_initialized());
}

#[test]
fn given_init_without_config_when_handled_then_empty_static_config_published() {
    let (bus, registry) = registry();
    let seen = record_static_configs(&bus);
    let port: Arc<dyn Port> = Arc::new(RecordingPort::default());

    registry
        .handle_message(InboundMessage::new(ClientMessage::named("init"), port))
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![StaticConfig::default()]);
}

#[test]
fn given_unknown_message_when_handled_then_sender_gets_hello_only() {
    // GIVEN: A sender and a bystander
    let (_bus, registry) = registry();
    let sender = Arc::new(RecordingPort::default());
    let bystander = Arc::new(RecordingPort::default());
    registry.add_port(bystander.clone());

    // WHEN
    registry
        .handle_message(InboundMessage::new(
            ClientMessage::named("ping"),
            sender.clone(),
        ))
        .unwrap();

    // THEN
    assert_eq!(sender.sent(), vec![ServerMessage::hello()]);
    assert!(bystander.sent().is_empty());
    assert!(!registry.is_config_initialized());
}

/// **VALUE**: One dead port does not starve the others.
///
/// **WHY THIS MATTERS**: Tabs close without notice; their ports stay registered
/// until the connection teardown is noticed.
///
/// **BUG THIS CATCHES**: Would catch a `?` inside the broadcast loop aborting
/// delivery at the first failure.
#[test]
fn given_broken_port_between_healthy_ones_when_broadcast_then_healthy_ports_receive() {
    // GIVEN: healthy, broken, healthy
    let (_bus, registry) = registry();
    let before = Arc::new(RecordingPort::default());
    let after = Arc::new(RecordingPort::default());
    registry.add_port(before.clone());
    registry.add_port(Arc::new(BrokenPort));
    registry.add_port(after.clone());

    // WHEN
    let message = ServerMessage::app_event(AppEvent::config_ready());
    let delivered = registry.broadcast(&message);

    // THEN
    assert_eq!(delivered, 2);
    assert_eq!(before.sent(), vec![message.clone()]);
    assert_eq!(after.sent(), vec![message]);
}

#[test]
fn given_app_event_on_bus_when_dispatched_then_every_port_receives_envelope() {
    let (bus, registry) = registry();
    let port = Arc::new(RecordingPort::default());
    registry.add_port(port.clone());

    bus.dispatch(&BusEvent::App(AppEvent::auth_change(true)))
        .unwrap();
    bus.dispatch(&BusEvent::StaticConfig(StaticConfig::default()))
        .unwrap();

    assert_eq!(
        port.sent(),
        vec![ServerMessage::app_event(AppEvent::auth_change(true))]
    );
}

#[test]
fn given_removed_port_when_broadcast_then_not_delivered() {
    let (_bus, registry) = registry();
    let (port, mut outbound) = ChannelPort::new();
    let id = registry.add_port(Arc::new(port));

    assert!(registry.remove_port(id));
    assert!(!registry.remove_port(id));
    registry.broadcast(&ServerMessage::hello());

    assert_eq!(registry.port_count(), 0);
    assert!(outbound.try_recv().is_err());
}

#[test]
fn given_same_port_added_twice_when_broadcast_then_delivered_twice() {
    let (_bus, registry) = registry();
    let port = Arc::new(RecordingPort::default());
    registry.add_port(port.clone());
    registry.add_port(port.clone());

    registry.broadcast(&ServerMessage::hello());

    assert_eq!(port.sent().len(), 2);
}

#[test]
fn given_custom_message_with_string_config_when_handled_then_hello_reply() {
    let (_bus, registry) = registry();
    let port = Arc::new(RecordingPort::default());
    let message = ClientMessage::from_json(r#"{"name":"ping","config":"dark"}"#).unwrap();

    registry
        .handle_message(InboundMessage::new(message, port.clone()))
        .unwrap();

    assert_eq!(port.sent(), vec![ServerMessage::hello()]);
}

#[test]
fn given_init_with_mistyped_config_when_handled_then_default_published() {
    let (bus, registry) = registry();
    let seen = record_static_configs(&bus);
    let port: Arc<dyn Port> = Arc::new(RecordingPort::default());
    let message = ClientMessage::from_json(r#"{"name":"init","config":{"API_SERVER":5}}"#).unwrap();

    registry
        .handle_message(InboundMessage::new(message, port))
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![StaticConfig::default()]);
}

/// **VALUE**: A port that joins while a fetch outcome is being published gets
/// that outcome exactly once.
///
/// **WHY THIS MATTERS**: Fetch completion runs on a runtime worker, in parallel
/// with connection handling. A port registered mid-broadcast that then sends
/// `init` must not get the same events from both the replay and the broadcast.
///
/// **BUG THIS CATCHES**: Would catch the in-flight mark being cleared, and the
/// port being added and replayed to, while the broadcast is still running.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn given_outcome_being_published_when_port_joins_and_inits_then_events_delivered_once() {
    // GIVEN: A slow subscriber ahead of the registry, and a config API
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    let bus = EventBus::new();
    bus.register(|event| {
        if let BusEvent::App(_) = event {
            std::thread::sleep(Duration::from_millis(300));
        }
        Ok(())
    });
    let client = ConfigHttpClient::new(&HttpSettings::default()).unwrap();
    let store = ConfigStore::new(bus.clone(), client);
    store.extend(StaticConfig::default().with_api_server(server.uri()));
    let registry = PortRegistry::new(bus, store.clone());

    // WHEN: The port joins and inits as soon as the in-flight mark clears
    let fetch = store.fetch().unwrap();
    while store.is_fetch_in_progress() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let port = Arc::new(RecordingPort::default());
    registry.add_port(port.clone());
    registry
        .handle_message(InboundMessage::new(
            ClientMessage::init(StaticConfig::default()),
            port.clone(),
        ))
        .unwrap();
    fetch.settled().await.unwrap();

    // THEN: CONFIG_READY arrived once
    assert_eq!(
        port.sent(),
        vec![ServerMessage::app_event(AppEvent::config_ready())]
    );
}
