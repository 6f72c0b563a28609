// Unit tests for RedactedToken

use crate::RedactedToken;

/// **VALUE**: Tokens must never show up in log lines.
///
/// **BUG THIS CATCHES**: Would catch a derived `Debug` replacing the manual impl,
/// which would print the raw token whenever a struct holding it is logged with `{:?}`.
#[test]
fn given_token_when_formatted_then_value_is_hidden() {
    // GIVEN: A token with a recognizable value
    let token = RedactedToken::new("gho_secret_value");

    // WHEN: Formatting it both ways
    let debug = format!("{token:?}");
    let display = format!("{token}");

    // THEN: Neither output contains the secret
    assert!(!debug.contains("gho_secret_value"));
    assert!(!display.contains("gho_secret_value"));
    assert_eq!(token.expose(), "gho_secret_value");
    assert_eq!(token.len(), 16);
}

#[test]
fn given_token_when_serialized_then_fails() {
    // GIVEN: A token
    let token = RedactedToken::new("gho_secret_value");

    // WHEN: Serializing it by accident
    let result = serde_json::to_string(&token);

    // THEN: Serialization is refused
    assert!(result.is_err(), "RedactedToken must refuse serialization");
}
