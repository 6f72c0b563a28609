//! The background context's view of configuration.

use crate::config::StaticConfig;
use crate::error::store::StoreError;

use common::{ErrorLocation, RedactedToken};

use std::panic::Location;

use serde_json::{Map, Value};

pub const API_SERVER_KEY: &str = "API_SERVER";
pub const ENDPOINTS_KEY: &str = "endpoints";
pub const USER_KEY: &str = "user";
const AUTHS_KEY: &str = "auths";
const GITHUB_KEY: &str = "github";
const ACCESS_TOKEN_KEY: &str = "access_token";

/// Static (bootstrap) configuration plus the body of the last successful fetch.
///
/// The two halves are kept apart: a fetch replaces only the fetched half,
/// wholesale, so a key the server stopped sending disappears on the next
/// refresh while bootstrap values are left alone.
///
/// `user.auths.github.access_token` never stays in the fetched JSON: it is
/// lifted into a [`RedactedToken`], leaving the `github` object as the marker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    static_config: StaticConfig,
    fetched: Map<String, Value>,
    github_token: Option<RedactedToken>,
}

impl ConfigSnapshot {
    pub fn static_config(&self) -> &StaticConfig {
        &self.static_config
    }

    /// Keys of the last successful fetch.
    pub fn fetched(&self) -> &Map<String, Value> {
        &self.fetched
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fetched.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fetched.contains_key(key)
    }

    /// Fetched `API_SERVER` if the server sent one, otherwise the bootstrap value.
    pub fn api_server(&self) -> Option<&str> {
        self.fetched
            .get(API_SERVER_KEY)
            .and_then(Value::as_str)
            .or(self.static_config.api_server.as_deref())
    }

    pub fn endpoints(&self) -> Option<&Map<String, Value>> {
        self.fetched.get(ENDPOINTS_KEY).and_then(Value::as_object)
    }

    pub fn endpoint(&self, name: &str) -> Option<&str> {
        self.endpoints()
            .and_then(|endpoints| endpoints.get(name))
            .and_then(Value::as_str)
    }

    pub fn user(&self) -> Option<&Value> {
        self.fetched.get(USER_KEY)
    }

    /// The `user` key is present, whatever its value.
    pub fn is_authenticated(&self) -> bool {
        self.fetched.contains_key(USER_KEY)
    }

    /// `user.auths.github` is present.
    pub fn is_github_authenticated(&self) -> bool {
        self.user()
            .and_then(|user| user.get(AUTHS_KEY))
            .and_then(Value::as_object)
            .is_some_and(|auths| auths.contains_key(GITHUB_KEY))
    }

    pub fn github_token(&self) -> Option<&RedactedToken> {
        self.github_token.as_ref()
    }

    /// Merged JSON view: bootstrap keys first, fetched keys on top. Carries no
    /// access token.
    pub fn to_json(&self) -> Value {
        let mut merged = match serde_json::to_value(&self.static_config) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (key, value) in &self.fetched {
            merged.insert(key.clone(), value.clone());
        }
        Value::Object(merged)
    }

    pub(crate) fn extend(&mut self, partial: StaticConfig) {
        self.static_config.merge(partial);
    }

    /// Drops every previously fetched key and installs `response` in its place,
    /// then absolutizes path-only endpoints.
    pub(crate) fn replace_fetched(&mut self, response: Map<String, Value>) {
        self.fetched = response;
        self.github_token = self.take_github_token();
        self.absolutize_endpoints();
    }

    fn take_github_token(&mut self) -> Option<RedactedToken> {
        let github = self
            .fetched
            .get_mut(USER_KEY)
            .and_then(|user| user.get_mut(AUTHS_KEY))
            .and_then(|auths| auths.get_mut(GITHUB_KEY))
            .and_then(Value::as_object_mut)?;
        match github.remove(ACCESS_TOKEN_KEY)? {
            Value::String(token) => Some(RedactedToken::new(token)),
            _ => None,
        }
    }

    fn absolutize_endpoints(&mut self) {
        let Some(api_server) = self.api_server().map(str::to_owned) else {
            return;
        };
        let Some(Value::Object(endpoints)) = self.fetched.get_mut(ENDPOINTS_KEY) else {
            return;
        };
        for endpoint in endpoints.values_mut() {
            if let Value::String(path) = endpoint {
                if path.starts_with('/') {
                    *path = format!("{api_server}{path}");
                }
            }
        }
    }

    /// Stores the token and marks `user.auths.github`, creating `auths` if needed.
    pub(crate) fn set_github_token(&mut self, token: RedactedToken) -> Result<(), StoreError> {
        let Some(Value::Object(user)) = self.fetched.get_mut(USER_KEY) else {
            return Err(StoreError::NotAuthenticated {
                message: "Cannot set a GitHub token without a user record".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        };

        let auths = user
            .entry(AUTHS_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        if !auths.is_object() {
            *auths = Value::Object(Map::new());
        }
        if let Value::Object(auths) = auths {
            auths.insert(GITHUB_KEY.to_string(), Value::Object(Map::new()));
        }
        self.github_token = Some(token);
        Ok(())
    }
}
