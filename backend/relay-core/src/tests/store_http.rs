// Unit tests for config URL construction and content type matching

use crate::error::store::StoreError;
use crate::store::config_url;
use crate::store::json_content_type_regex;

#[test]
fn given_trailing_slash_when_config_url_then_single_separator() {
    let url = config_url("https://api.example.com/", None).unwrap();

    assert_eq!(url.as_str(), "https://api.example.com/config");
}

#[test]
fn given_base_path_when_config_url_then_config_appended_to_path() {
    let url = config_url("https://example.com/api", None).unwrap();

    assert_eq!(url.as_str(), "https://example.com/api/config");
}

/// **VALUE**: `HTTPS` forces the scheme either way; absent leaves it alone.
///
/// **BUG THIS CATCHES**: Would catch `HTTPS: false` being treated as "unset",
/// leaving a TLS URL in place behind a TLS-terminating proxy.
#[test]
fn given_https_flag_when_config_url_then_scheme_forced() {
    // GIVEN/WHEN
    let forced_on = config_url("http://api.example.com", Some(true)).unwrap();
    let forced_off = config_url("https://api.example.com", Some(false)).unwrap();
    let untouched = config_url("https://api.example.com", None).unwrap();

    // THEN
    assert_eq!(forced_on.scheme(), "https");
    assert_eq!(forced_off.scheme(), "http");
    assert_eq!(untouched.scheme(), "https");
}

#[test]
fn given_garbage_api_server_when_config_url_then_url_parse_error() {
    let result = config_url("not a url", None);

    assert!(matches!(result, Err(StoreError::UrlParse { .. })));
}

#[test]
fn given_content_types_when_matched_then_only_json_passes() {
    let regex = json_content_type_regex();

    assert!(regex.is_match("application/json"));
    assert!(regex.is_match("application/json; charset=utf-8"));
    assert!(!regex.is_match("text/html"));
    assert!(!regex.is_match(""));
}
