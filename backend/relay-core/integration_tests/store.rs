use crate::helpers::{mount_config, names, record_app_events, remount_config, static_config_for};

use relay_core::config::{HttpSettings, StaticConfig};
use relay_core::error::store::StoreError;
use relay_core::event::{
    AUTH_CHANGE, CONFIG_READY, EventBus, GITHUB_AUTH_CHANGE, SERVICE_UNAVAILABLE,
};
use relay_core::store::{ConfigHttpClient, ConfigStore};

use common::{HttpStatusCode, RedactedToken};

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_with(settings: &HttpSettings) -> (EventBus, ConfigStore) {
    let bus = EventBus::new();
    let client = ConfigHttpClient::new(settings).expect("Failed to build HTTP client");
    (bus.clone(), ConfigStore::new(bus, client))
}

fn new_store() -> (EventBus, ConfigStore) {
    store_with(&HttpSettings::default())
}

/// **VALUE**: A refresh that still has no `user` publishes `CONFIG_READY` alone.
///
/// **WHY THIS MATTERS**: Anonymous sessions refresh too; each spurious
/// `AUTH_CHANGE` makes clients redo their logged-out flow.
///
/// **BUG THIS CATCHES**: Would catch the initial auth flag being anything but
/// `false`.
#[tokio::test]
async fn given_anonymous_response_when_fetch_then_only_config_ready() {
    // GIVEN: An API answering without a user
    let server = MockServer::start().await;
    mount_config(&server, json!({ "theme": "dark" })).await;
    let (bus, store) = new_store();
    let recorded = record_app_events(&bus);
    store.extend(static_config_for(&server));

    // WHEN
    store.fetch().unwrap().settled().await.unwrap();

    // THEN
    assert_eq!(names(&recorded.lock().unwrap()), vec![CONFIG_READY]);
    assert!(!store.is_authenticated());
    assert_eq!(store.snapshot().get("theme"), Some(&json!("dark")));
}

#[tokio::test]
async fn given_user_in_response_when_fetch_then_config_ready_then_auth_change() {
    // GIVEN
    let server = MockServer::start().await;
    mount_config(&server, json!({ "user": { "id": 1 } })).await;
    let (bus, store) = new_store();
    let recorded = record_app_events(&bus);
    store.extend(static_config_for(&server));

    // WHEN
    store.fetch().unwrap().settled().await.unwrap();

    // THEN
    let events = recorded.lock().unwrap().clone();
    assert_eq!(names(&events), vec![CONFIG_READY, AUTH_CHANGE]);
    assert_eq!(events[1].authenticated(), Some(true));
    assert!(store.is_authenticated());
}

/// **VALUE**: A newly present `user.auths.github` appends `GITHUB_AUTH_CHANGE`
/// after `AUTH_CHANGE`.
#[tokio::test]
async fn given_github_auth_appears_when_fetch_then_github_change_appended() {
    let server = MockServer::start().await;
    mount_config(
        &server,
        json!({ "user": { "auths": { "github": { "access_token": "gho_x" } } } }),
    )
    .await;
    let (bus, store) = new_store();
    let recorded = record_app_events(&bus);
    store.extend(static_config_for(&server));

    store.fetch().unwrap().settled().await.unwrap();

    let events = recorded.lock().unwrap().clone();
    assert_eq!(
        names(&events),
        vec![CONFIG_READY, AUTH_CHANGE, GITHUB_AUTH_CHANGE]
    );
    assert_eq!(events[2].authenticated(), Some(true));
    assert!(store.is_github_authenticated());
}

#[tokio::test]
async fn given_relative_endpoints_when_fetch_then_prefixed_with_api_server() {
    // GIVEN
    let server = MockServer::start().await;
    mount_config(
        &server,
        json!({ "endpoints": { "foo": "/v1/foo", "bar": "https://other/bar" } }),
    )
    .await;
    let (_bus, store) = new_store();
    store.extend(static_config_for(&server));

    // WHEN
    store.fetch().unwrap().settled().await.unwrap();

    // THEN
    let snapshot = store.snapshot();
    let expected = format!("{}/v1/foo", server.uri());
    assert_eq!(snapshot.endpoint("foo"), Some(expected.as_str()));
    assert_eq!(snapshot.endpoint("bar"), Some("https://other/bar"));
}

/// **VALUE**: Keys the server stops sending disappear from the store.
///
/// **WHY THIS MATTERS**: Logout is expressed by the server omitting `user`.
///
/// **BUG THIS CATCHES**: Would catch a merge instead of a replace, which keeps
/// a logged-out user looking logged in forever.
#[tokio::test]
async fn given_key_dropped_by_second_response_when_fetch_then_key_removed() {
    // GIVEN: First response with a user
    let server = MockServer::start().await;
    mount_config(&server, json!({ "user": { "id": 1 }, "flag": true })).await;
    let (bus, store) = new_store();
    let recorded = record_app_events(&bus);
    store.extend(static_config_for(&server));
    store.fetch().unwrap().settled().await.unwrap();

    // WHEN: Second response without one
    remount_config(&server, json!({ "flag": false })).await;
    store.fetch().unwrap().settled().await.unwrap();

    // THEN
    let snapshot = store.snapshot();
    assert!(!snapshot.contains_key("user"));
    assert_eq!(snapshot.get("flag"), Some(&json!(false)));
    let events = recorded.lock().unwrap().clone();
    assert_eq!(
        names(&events),
        vec![CONFIG_READY, AUTH_CHANGE, CONFIG_READY, AUTH_CHANGE]
    );
    assert_eq!(events[3].authenticated(), Some(false));
}

/// **VALUE**: A 503 with a non-JSON body fails the fetch, publishes exactly one
/// `SERVICE_UNAVAILABLE{503}`, and leaves the previous snapshot intact.
///
/// **BUG THIS CATCHES**: Would catch the snapshot being cleared on failure, or
/// `CONFIG_READY` leaking out of a failed refresh.
#[tokio::test]
async fn given_503_text_response_when_fetch_then_service_unavailable_only() {
    // GIVEN: A good first fetch
    let server = MockServer::start().await;
    mount_config(&server, json!({ "user": { "id": 1 } })).await;
    let (bus, store) = new_store();
    store.extend(static_config_for(&server));
    store.fetch().unwrap().settled().await.unwrap();
    let before = store.snapshot();
    let recorded = record_app_events(&bus);

    // WHEN: The API goes down
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    let result = store.fetch().unwrap().settled().await;

    // THEN
    match result {
        Err(StoreError::ServiceUnavailable { status, .. }) => {
            assert_eq!(status, HttpStatusCode(503))
        }
        other => panic!("Expected ServiceUnavailable, got {other:?}"),
    }
    let events = recorded.lock().unwrap().clone();
    assert_eq!(names(&events), vec![SERVICE_UNAVAILABLE]);
    assert_eq!(events[0].status(), Some(HttpStatusCode(503)));
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.app_events(), events);
    assert!(store.fetch_state().last_error.is_some());
}

#[tokio::test]
async fn given_200_with_html_when_fetch_then_service_unavailable_with_200() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"),
        )
        .mount(&server)
        .await;
    let (_bus, store) = new_store();
    store.extend(static_config_for(&server));

    let result = store.fetch().unwrap().settled().await;

    assert_eq!(
        result.unwrap_err().status(),
        Some(HttpStatusCode(200))
    );
}

#[tokio::test]
async fn given_json_array_body_when_fetch_then_service_unavailable() {
    let server = MockServer::start().await;
    mount_config(&server, json!([1, 2, 3])).await;
    let (_bus, store) = new_store();
    store.extend(static_config_for(&server));

    let result = store.fetch().unwrap().settled().await;

    assert!(matches!(
        result,
        Err(StoreError::ServiceUnavailable { .. })
    ));
    assert_eq!(
        store.app_events()[0].status(),
        Some(HttpStatusCode(200))
    );
}

/// **VALUE**: A request that never completes is reported as status 0.
///
/// **BUG THIS CATCHES**: Would catch a hung API keeping the in-flight flag set
/// forever, which blocks replay for every new port.
#[tokio::test]
async fn given_slow_api_when_timeout_elapses_then_status_zero() {
    // GIVEN: A one second timeout and a three second response
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let (_bus, store) = store_with(&HttpSettings {
        request_timeout_secs: Some(1),
    });
    store.extend(static_config_for(&server));

    // WHEN
    let result = store.fetch().unwrap().settled().await;

    // THEN
    assert_eq!(
        result.unwrap_err().status(),
        Some(HttpStatusCode::NO_RESPONSE)
    );
    assert!(!store.is_fetch_in_progress());
}

#[tokio::test]
async fn given_unreachable_api_when_fetch_then_status_zero() {
    let (bus, store) = new_store();
    let recorded = record_app_events(&bus);
    // Port 9 (discard) on loopback: nothing listens there in CI
    store.extend(StaticConfig::default().with_api_server("http://127.0.0.1:9"));

    let result = store.fetch().unwrap().settled().await;

    assert!(result.is_err());
    let events = recorded.lock().unwrap().clone();
    assert_eq!(events[0].status(), Some(HttpStatusCode::NO_RESPONSE));
}

#[tokio::test]
async fn given_no_api_server_when_fetch_then_fails_without_starting() {
    let (_bus, store) = new_store();

    let result = store.fetch();

    assert!(matches!(result, Err(StoreError::MissingApiServer { .. })));
    assert!(!store.is_fetch_in_progress());
}

/// **VALUE**: The in-flight mark is visible as soon as `fetch` returns.
///
/// **WHY THIS MATTERS**: The registry decides whether to replay based on it,
/// synchronously, right after bootstrap triggers the fetch.
#[tokio::test]
async fn given_slow_api_when_fetch_started_then_in_progress_until_settled() {
    // GIVEN
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    let (_bus, store) = new_store();
    store.extend(static_config_for(&server));

    // WHEN
    let handle = store.fetch().unwrap();

    // THEN
    assert!(store.is_fetch_in_progress());
    assert!(store.fetch_state().in_progress);
    handle.settled().await.unwrap();
    assert!(!store.is_fetch_in_progress());
}

#[tokio::test]
async fn given_two_overlapping_fetches_when_settled_then_both_publish_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/config"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "user": {} }))
                .set_delay(Duration::from_millis(100)),
        )
        .mount(&server)
        .await;
    let (bus, store) = new_store();
    let recorded = record_app_events(&bus);
    store.extend(static_config_for(&server));

    let first = store.fetch().unwrap();
    let second = store.fetch().unwrap();
    first.settled().await.unwrap();
    second.settled().await.unwrap();

    // The second refresh sees the flag already flipped by the first
    assert_eq!(
        names(&recorded.lock().unwrap()),
        vec![CONFIG_READY, AUTH_CHANGE, CONFIG_READY]
    );
    assert!(!store.is_fetch_in_progress());
}

#[tokio::test]
async fn given_logged_in_user_when_set_github_token_then_event_and_snapshot_updated() {
    // GIVEN
    let server = MockServer::start().await;
    mount_config(&server, json!({ "user": { "id": 1 } })).await;
    let (bus, store) = new_store();
    store.extend(static_config_for(&server));
    store.fetch().unwrap().settled().await.unwrap();
    let recorded = record_app_events(&bus);

    // WHEN
    store
        .set_github_token(RedactedToken::new("gho_secret"))
        .unwrap();

    // THEN
    let events = recorded.lock().unwrap().clone();
    assert_eq!(names(&events), vec![GITHUB_AUTH_CHANGE]);
    assert_eq!(events[0].authenticated(), Some(true));
    assert_eq!(
        store.snapshot().github_token().map(RedactedToken::expose),
        Some("gho_secret")
    );
    assert!(store.is_github_authenticated());
}

#[tokio::test]
async fn given_no_user_when_set_github_token_then_error_and_no_event() {
    let (bus, store) = new_store();
    let recorded = record_app_events(&bus);

    let result = store.set_github_token(RedactedToken::new("gho_secret"));

    assert!(matches!(result, Err(StoreError::NotAuthenticated { .. })));
    assert!(recorded.lock().unwrap().is_empty());
}

#[tokio::test]
async fn given_https_forced_off_when_fetch_then_plain_http_used() {
    // GIVEN: The mock speaks plain HTTP; the bootstrap URL claims https
    let server = MockServer::start().await;
    mount_config(&server, json!({})).await;
    let (_bus, store) = new_store();
    let api_server = server.uri().replacen("http://", "https://", 1);
    store.extend(
        StaticConfig::default()
            .with_api_server(api_server)
            .with_https(false),
    );

    // WHEN/THEN: The forced scheme reaches the mock
    store.fetch().unwrap().settled().await.unwrap();
}
