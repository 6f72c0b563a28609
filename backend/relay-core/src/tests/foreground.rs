// Unit tests for transport selection

use crate::config::HttpSettings;
use crate::foreground::{HostCapabilities, TransportKind};

use std::sync::{Arc, Mutex};

#[test]
fn given_default_shared_when_inspected_then_points_at_default_relay_port() {
    let capabilities = HostCapabilities::none().with_default_shared();

    assert_eq!(capabilities.select(), Some(TransportKind::Shared));
    assert_eq!(capabilities.shared_url(), Some("ws://127.0.0.1:19880"));
}

#[test]
fn given_dedicated_only_when_inspected_then_settings_kept() {
    let settings = HttpSettings {
        request_timeout_secs: None,
    };

    let capabilities = HostCapabilities::none().with_dedicated(settings.clone());

    assert_eq!(capabilities.dedicated_settings(), Some(&settings));
    assert!(capabilities.shared_url().is_none());
}

#[test]
fn given_alert_sink_when_alerting_then_sink_receives_message() {
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let capabilities = HostCapabilities::none()
        .with_alert(move |message| *sink.lock().unwrap() = Some(message.to_string()));

    capabilities.alert("Host compatibility error!");

    assert_eq!(
        seen.lock().unwrap().as_deref(),
        Some("Host compatibility error!")
    );
}
