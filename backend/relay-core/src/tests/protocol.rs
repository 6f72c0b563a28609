// Unit tests for the wire protocol

use crate::config::StaticConfig;
use crate::event::AppEvent;
use crate::protocol::{ClientMessage, HELLO_REPLY, ServerMessage};

use common::HttpStatusCode;

use serde_json::{Value, json};

/// **VALUE**: Event envelopes match the documented wire shape exactly.
///
/// **WHY THIS MATTERS**: Foreground clients in other runtimes parse these frames;
/// a renamed field silently breaks every one of them.
///
/// **BUG THIS CATCHES**: Would catch the payload being nested instead of
/// flattened, or the envelope name drifting from `APP_EVENT`.
#[test]
fn given_service_unavailable_when_serialized_then_matches_wire_shape() {
    // GIVEN
    let message = ServerMessage::app_event(AppEvent::service_unavailable(HttpStatusCode(503)));

    // WHEN
    let value: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

    // THEN
    assert_eq!(
        value,
        json!({ "name": "APP_EVENT", "data": { "name": "SERVICE_UNAVAILABLE", "status": 503 } })
    );
}

#[test]
fn given_hello_frame_when_parsed_then_is_not_an_app_event() {
    let message = ServerMessage::from_json(r#"{"hello":"from worker"}"#).unwrap();

    assert_eq!(message, ServerMessage::hello());
    assert!(message.as_app_event().is_none());
    assert_eq!(
        message,
        ServerMessage::Hello {
            hello: HELLO_REPLY.to_string()
        }
    );
}

#[test]
fn given_init_frame_when_parsed_then_static_config_is_typed() {
    // GIVEN: An init frame carrying a config and an unknown key
    let text = r#"{"name":"init","config":{"API_SERVER":"https://api.example.com","HTTPS":true,"OTHER":1}}"#;

    // WHEN
    let message = ClientMessage::from_json(text).unwrap();

    // THEN: Known fields are typed, unknown config keys are dropped
    assert!(message.is_init());
    assert_eq!(
        Some(message.static_config()),
        Some(
            StaticConfig::default()
                .with_api_server("https://api.example.com")
                .with_https(true)
        )
    );
}

#[test]
fn given_frame_without_name_when_parsed_then_name_is_empty() {
    let message = ClientMessage::from_json(r#"{"ping":1}"#).unwrap();

    assert_eq!(message.name, "");
    assert!(!message.is_init());
    assert_eq!(message.extra.get("ping"), Some(&json!(1)));
}

#[test]
fn given_custom_message_when_serialized_then_extra_keys_are_top_level() {
    let message = ClientMessage::named("refresh").with("force", json!(true));

    let value: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

    assert_eq!(value, json!({ "name": "refresh", "force": true }));
}

/// **VALUE**: A non-init message may carry a `config` of any shape.
///
/// **WHY THIS MATTERS**: `post_message` forwards arbitrary application payloads;
/// rejecting them at parse time drops them without a reply.
///
/// **BUG THIS CATCHES**: Would catch `config` being typed as the bootstrap
/// configuration on every message.
#[test]
fn given_custom_message_with_string_config_when_parsed_then_accepted() {
    // GIVEN/WHEN
    let message = ClientMessage::from_json(r#"{"name":"ping","config":"dark"}"#).unwrap();

    // THEN
    assert_eq!(message.name, "ping");
    assert_eq!(message.config, Some(json!("dark")));
}

#[test]
fn given_init_with_mistyped_config_when_static_config_then_default() {
    let message =
        ClientMessage::from_json(r#"{"name":"init","config":{"API_SERVER":5}}"#).unwrap();

    assert!(message.is_init());
    assert_eq!(message.static_config(), StaticConfig::default());
}

#[test]
fn given_init_constructor_when_round_tripped_then_config_preserved() {
    let config = StaticConfig::default().with_api_server("https://api.example.com");

    let parsed = ClientMessage::from_json(&ClientMessage::init(config.clone()).to_json().unwrap())
        .unwrap();

    assert_eq!(parsed.static_config(), config);
}
