// Unit tests for the configuration snapshot

use crate::config::StaticConfig;
use crate::error::store::StoreError;
use crate::store::{AuthFlags, ConfigSnapshot};

use common::RedactedToken;

use serde_json::{Map, Value, json};

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn with_api_server(api_server: &str) -> ConfigSnapshot {
    let mut snapshot = ConfigSnapshot::default();
    snapshot.extend(StaticConfig::default().with_api_server(api_server));
    snapshot
}

/// **VALUE**: Path-only endpoints are prefixed with `API_SERVER`; absolute ones
/// are left alone.
///
/// **WHY THIS MATTERS**: Clients call endpoints directly. A relative path would
/// resolve against the client's own origin, not the API.
///
/// **BUG THIS CATCHES**: Would catch prefixing every string (double host on
/// absolute URLs) or not prefixing at all.
#[test]
fn given_relative_and_absolute_endpoints_when_replace_fetched_then_only_relative_prefixed() {
    // GIVEN: A known API server
    let mut snapshot = with_api_server("https://api.example.com");

    // WHEN: A response with one relative and one absolute endpoint lands
    snapshot.replace_fetched(object(json!({
        "endpoints": { "foo": "/v1/foo", "bar": "https://other/bar" }
    })));

    // THEN
    assert_eq!(
        snapshot.endpoint("foo"),
        Some("https://api.example.com/v1/foo")
    );
    assert_eq!(snapshot.endpoint("bar"), Some("https://other/bar"));
}

#[test]
fn given_fetched_api_server_when_replace_fetched_then_endpoints_use_fetched_value() {
    let mut snapshot = with_api_server("https://bootstrap.example.com");

    snapshot.replace_fetched(object(json!({
        "API_SERVER": "https://api.example.com",
        "endpoints": { "foo": "/v1/foo" }
    })));

    assert_eq!(snapshot.api_server(), Some("https://api.example.com"));
    assert_eq!(
        snapshot.endpoint("foo"),
        Some("https://api.example.com/v1/foo")
    );
}

/// **VALUE**: A refresh replaces fetched keys wholesale but never touches
/// bootstrap configuration.
///
/// **BUG THIS CATCHES**: Would catch a merge-style refresh that keeps keys the
/// server stopped sending (e.g. a `user` after logout).
#[test]
fn given_two_refreshes_when_second_omits_key_then_key_is_gone() {
    // GIVEN: A first refresh with a user
    let mut snapshot = with_api_server("https://api.example.com");
    snapshot.replace_fetched(object(json!({ "user": { "id": 1 }, "theme": "dark" })));
    assert!(snapshot.is_authenticated());

    // WHEN: The second refresh has no user
    snapshot.replace_fetched(object(json!({ "theme": "light" })));

    // THEN: The user is gone, the bootstrap API server is kept
    assert!(!snapshot.contains_key("user"));
    assert!(!snapshot.is_authenticated());
    assert_eq!(snapshot.get("theme"), Some(&json!("light")));
    assert_eq!(snapshot.api_server(), Some("https://api.example.com"));
}

#[test]
fn given_user_with_github_auth_when_checked_then_both_flags_set() {
    let mut snapshot = ConfigSnapshot::default();
    snapshot.replace_fetched(object(json!({
        "user": { "auths": { "github": { "access_token": "gho_abc" } } }
    })));

    assert_eq!(
        AuthFlags::of(&snapshot),
        AuthFlags {
            authenticated: true,
            github_authenticated: true
        }
    );
    assert_eq!(
        snapshot.github_token().map(RedactedToken::expose),
        Some("gho_abc")
    );
}

/// **VALUE**: A GitHub access token never appears in the snapshot's `Debug`
/// output or its JSON view.
///
/// **WHY THIS MATTERS**: Snapshots are logged and handed to callers as JSON.
/// The token must stay reachable only through an explicit `expose()`.
///
/// **BUG THIS CATCHES**: Would catch the token being left in the fetched JSON
/// or copied back into it by `set_github_token`.
#[test]
fn given_github_token_when_snapshot_formatted_or_converted_then_token_hidden() {
    // GIVEN: One token from a fetch, one set out of band
    let mut fetched = ConfigSnapshot::default();
    fetched.replace_fetched(object(json!({
        "user": { "auths": { "github": { "access_token": "gho_fetched", "scope": "repo" } } }
    })));
    let mut set = ConfigSnapshot::default();
    set.replace_fetched(object(json!({ "user": { "id": 7 } })));
    set.set_github_token(RedactedToken::new("gho_set")).unwrap();

    for (snapshot, token) in [(&fetched, "gho_fetched"), (&set, "gho_set")] {
        // WHEN
        let debug = format!("{snapshot:?}");
        let json = snapshot.to_json().to_string();

        // THEN: Hidden in both, still flagged and reachable
        assert!(!debug.contains(token), "Debug leaked {token}: {debug}");
        assert!(!json.contains(token), "JSON leaked {token}: {json}");
        assert!(snapshot.is_github_authenticated());
        assert_eq!(snapshot.github_token().map(RedactedToken::expose), Some(token));
    }
    assert_eq!(
        fetched.user().and_then(|u| u.pointer("/auths/github/scope")),
        Some(&json!("repo"))
    );
}

#[test]
fn given_null_user_when_checked_then_counts_as_authenticated() {
    // Presence of the key is what matters, not its value
    let mut snapshot = ConfigSnapshot::default();
    snapshot.replace_fetched(object(json!({ "user": null })));

    assert!(snapshot.is_authenticated());
    assert!(!snapshot.is_github_authenticated());
}

#[test]
fn given_user_without_auths_when_set_github_token_then_auths_created() {
    // GIVEN: A user record with no auths map
    let mut snapshot = ConfigSnapshot::default();
    snapshot.replace_fetched(object(json!({ "user": { "id": 7 } })));

    // WHEN
    snapshot
        .set_github_token(RedactedToken::new("gho_new"))
        .unwrap();

    // THEN
    assert_eq!(
        snapshot.github_token().map(RedactedToken::expose),
        Some("gho_new")
    );
    assert!(snapshot.is_github_authenticated());
    assert_eq!(snapshot.user().and_then(|u| u.get("id")), Some(&json!(7)));
}

#[test]
fn given_no_user_when_set_github_token_then_not_authenticated_error() {
    let mut snapshot = ConfigSnapshot::default();

    let result = snapshot.set_github_token(RedactedToken::new("gho_new"));

    assert!(matches!(result, Err(StoreError::NotAuthenticated { .. })));
    assert!(snapshot.fetched().is_empty());
}

#[test]
fn given_static_and_fetched_keys_when_to_json_then_fetched_wins() {
    let mut snapshot = with_api_server("https://bootstrap.example.com");
    snapshot.replace_fetched(object(json!({ "API_SERVER": "https://api.example.com" })));

    let merged = snapshot.to_json();

    assert_eq!(merged["API_SERVER"], json!("https://api.example.com"));
}
