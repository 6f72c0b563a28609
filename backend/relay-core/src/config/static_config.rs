//! Bootstrap configuration handed over by the first foreground client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use std::collections::BTreeMap;

/// Environment-provided configuration merged into the store before the first fetch.
///
/// Only these fields are mergeable; anything else in an `init` payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticConfig {
    /// Base URL of the API, e.g. `https://api.example.com`.
    #[serde(rename = "API_SERVER", default, skip_serializing_if = "Option::is_none")]
    pub api_server: Option<String>,

    /// Forces the scheme of the config request when set.
    #[serde(rename = "HTTPS", default, skip_serializing_if = "Option::is_none")]
    pub https: Option<bool>,

    #[serde(rename = "ASSET_PATHS", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub asset_paths: BTreeMap<String, String>,

    #[serde(rename = "FEATURES", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, Value>,
}

impl StaticConfig {
    pub fn with_api_server(mut self, api_server: impl Into<String>) -> Self {
        self.api_server = Some(api_server.into());
        self
    }

    pub fn with_https(mut self, https: bool) -> Self {
        self.https = Some(https);
        self
    }

    pub fn with_feature(mut self, name: impl Into<String>, value: Value) -> Self {
        self.features.insert(name.into(), value);
        self
    }

    /// Shallow merge: scalars set in `partial` win, maps are merged key by key.
    /// Fields `partial` leaves unset are kept.
    pub fn merge(&mut self, partial: StaticConfig) {
        if let Some(api_server) = partial.api_server {
            self.api_server = Some(api_server);
        }
        if let Some(https) = partial.https {
            self.https = Some(https);
        }
        self.asset_paths.extend(partial.asset_paths);
        self.features.extend(partial.features);
    }

    pub fn feature(&self, name: &str) -> Option<&Value> {
        self.features.get(name)
    }
}
