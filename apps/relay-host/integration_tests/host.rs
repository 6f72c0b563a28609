use relay_host::error::HostError;
use relay_host::host::{serve, start};

use relay_core::config::{RelaySettings, StaticConfig};
use relay_core::event::{BusEvent, CONFIG_READY, EventBus};
use relay_core::foreground::{ForegroundClient, HostCapabilities};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ephemeral_settings() -> RelaySettings {
    let mut settings = RelaySettings::default();
    settings.host.port = 0;
    settings
}

/// **VALUE**: A started host serves foreground clients end to end.
///
/// **WHY THIS MATTERS**: This is what the binary does after loading settings.
#[tokio::test]
async fn given_started_host_when_client_runs_then_config_ready_received() {
    // GIVEN: A config API and a host on an ephemeral port
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    let handle = start(&ephemeral_settings()).await.unwrap();

    let bus = EventBus::new();
    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&names);
    bus.register(move |event| {
        if let BusEvent::App(app_event) = event {
            sink.lock().unwrap().push(app_event.name.clone());
        }
        Ok(())
    });

    // WHEN
    let capabilities = HostCapabilities::none().with_shared(handle.url());
    let config = StaticConfig::default().with_api_server(server.uri());
    let _client = ForegroundClient::run(&capabilities, config, bus).await.unwrap();

    // THEN
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while names.lock().unwrap().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "No event received");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(*names.lock().unwrap(), vec![CONFIG_READY.to_string()]);
}

#[tokio::test]
async fn given_non_loopback_settings_when_start_then_settings_error() {
    let mut settings = ephemeral_settings();
    settings.host.bind_address = "0.0.0.0".to_string();

    let result = start(&settings).await;

    assert!(matches!(result, Err(HostError::Settings { .. })));
}

#[tokio::test]
async fn given_port_in_use_when_start_then_core_error() {
    let first = start(&ephemeral_settings()).await.unwrap();
    let mut settings = ephemeral_settings();
    settings.host.port = first.local_addr().port();

    let result = start(&settings).await;

    assert!(matches!(result, Err(HostError::Core { .. })));
}

#[tokio::test]
async fn given_shutdown_signal_when_serving_then_returns_ok() {
    let result = serve(&ephemeral_settings(), async {}).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn given_saved_settings_when_loaded_and_started_then_uses_them() {
    let dir = tempfile::tempdir().unwrap();
    ephemeral_settings().save(dir.path()).unwrap();

    let settings = RelaySettings::load(dir.path()).unwrap();
    let handle = start(&settings).await.unwrap();

    assert!(handle.local_addr().ip().is_loopback());
    assert_ne!(handle.local_addr().port(), 0);
}
