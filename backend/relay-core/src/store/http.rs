//! HTTP side of the configuration fetch.

use crate::config::HttpSettings;
use crate::error::http::HttpError;
use crate::error::store::StoreError;

use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Map, Value};
use url::Url;

const CONFIG_ENDPOINT: &str = "config";
const JSON_MEDIA_TYPE: &str = "application/json";

const JSON_CONTENT_TYPE_PATTERN: &str = r"application/json";

static JSON_CONTENT_TYPE: OnceLock<Regex> = OnceLock::new();

pub(crate) fn json_content_type_regex() -> &'static Regex {
    JSON_CONTENT_TYPE
        .get_or_init(|| Regex::new(JSON_CONTENT_TYPE_PATTERN).expect("valid regex pattern"))
}

/// Builds `{api_server}/config`, forcing the scheme when `https` is set.
pub fn config_url(api_server: &str, https: Option<bool>) -> Result<Url, StoreError> {
    let mut url = Url::parse(&format!(
        "{}/{CONFIG_ENDPOINT}",
        api_server.trim_end_matches('/')
    ))?;

    if let Some(https) = https {
        let scheme = if https { "https" } else { "http" };
        url.set_scheme(scheme).map_err(|_| StoreError::UrlParse {
            message: format!("Cannot switch {} to {scheme}", url),
            location: ErrorLocation::from(Location::caller()),
        })?;
    }

    Ok(url)
}

/// Client for `GET {API_SERVER}/config`.
///
/// Cookies are kept between requests so session credentials set by the API
/// travel with every refresh.
#[derive(Clone, Debug)]
pub struct ConfigHttpClient {
    client: Client,
}

impl ConfigHttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, HttpError> {
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Fetches the remote configuration object.
    ///
    /// # Errors
    ///
    /// Every failure is a [`StoreError::ServiceUnavailable`]:
    /// - no response at all (status `0`)
    /// - a status other than 200
    /// - a `Content-Type` that is not JSON
    /// - a body that is not a JSON object
    pub async fn get_config(&self, url: &Url) -> Result<Map<String, Value>, StoreError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| service_unavailable(HttpStatusCode::NO_RESPONSE, e.to_string()))?;

        let status = HttpStatusCode(response.status().as_u16());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !status.is_ok() || !json_content_type_regex().is_match(&content_type) {
            return Err(service_unavailable(
                status,
                format!("Unexpected response (Content-Type: '{content_type}')"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| service_unavailable(status, e.to_string()))?;

        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(config)) => Ok(config),
            Ok(other) => Err(service_unavailable(
                status,
                format!("Expected a JSON object, got {}", json_kind(&other)),
            )),
            Err(e) => Err(service_unavailable(status, e.to_string())),
        }
    }
}

#[track_caller]
fn service_unavailable(status: HttpStatusCode, message: String) -> StoreError {
    StoreError::ServiceUnavailable {
        status,
        message,
        location: ErrorLocation::from(Location::caller()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
