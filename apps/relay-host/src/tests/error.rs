// Unit tests for host error conversions

use crate::error::HostError;

use relay_core::config::RelaySettings;

#[test]
fn given_invalid_settings_when_converted_then_settings_error_with_reason() {
    // GIVEN: A non-loopback bind address
    let mut settings = RelaySettings::default();
    settings.host.bind_address = "0.0.0.0".to_string();

    // WHEN
    let error: HostError = settings.validate().unwrap_err().into();

    // THEN
    let text = error.to_string();
    assert!(text.starts_with("Settings Error:"), "{text}");
    assert!(text.contains("loopback"), "{text}");
}
