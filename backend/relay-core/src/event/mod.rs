//! Events flowing through a context's [`EventBus`].
//!
//! Two layers:
//!
//! - [`AppEvent`] - a named notification meant for the application layer
//!   (`CONFIG_READY`, `AUTH_CHANGE`, ...). These cross the context boundary.
//! - [`BusEvent`] - what actually travels on a bus: either an application
//!   event or the bootstrap `STATIC_CONFIG` payload. Bus events never leave
//!   the context they were dispatched in.

mod bus;

pub use bus::{EventBus, SubscriptionId};

use crate::config::StaticConfig;

use common::HttpStatusCode;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CONFIG_READY: &str = "CONFIG_READY";
pub const AUTH_CHANGE: &str = "AUTH_CHANGE";
pub const GITHUB_AUTH_CHANGE: &str = "GITHUB_AUTH_CHANGE";
pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";

const AUTHENTICATED_KEY: &str = "authenticated";
const STATUS_KEY: &str = "status";

/// A named application notification.
///
/// The payload is flattened next to `name` on the wire:
/// `{"name": "AUTH_CHANGE", "authenticated": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEvent {
    pub name: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl AppEvent {
    pub fn new(name: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// An event without payload.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Map::new())
    }

    pub fn config_ready() -> Self {
        Self::named(CONFIG_READY)
    }

    pub fn auth_change(authenticated: bool) -> Self {
        Self::named(AUTH_CHANGE).with(AUTHENTICATED_KEY, Value::Bool(authenticated))
    }

    pub fn github_auth_change(authenticated: bool) -> Self {
        Self::named(GITHUB_AUTH_CHANGE).with(AUTHENTICATED_KEY, Value::Bool(authenticated))
    }

    pub fn service_unavailable(status: HttpStatusCode) -> Self {
        Self::named(SERVICE_UNAVAILABLE).with(STATUS_KEY, Value::from(status.0))
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// `authenticated` flag of an auth change event.
    pub fn authenticated(&self) -> Option<bool> {
        self.get(AUTHENTICATED_KEY).and_then(Value::as_bool)
    }

    /// `status` of a `SERVICE_UNAVAILABLE` event.
    pub fn status(&self) -> Option<HttpStatusCode> {
        self.get(STATUS_KEY)
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .map(HttpStatusCode)
    }
}

/// Everything that can be dispatched on an [`EventBus`].
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// Bootstrap configuration sent by the first foreground client.
    StaticConfig(StaticConfig),
    /// Application notification, relayed to every port.
    App(AppEvent),
}

impl BusEvent {
    pub const STATIC_CONFIG: &'static str = "STATIC_CONFIG";
    pub const APP_EVENT: &'static str = "APP_EVENT";

    pub fn name(&self) -> &'static str {
        match self {
            BusEvent::StaticConfig(_) => Self::STATIC_CONFIG,
            BusEvent::App(_) => Self::APP_EVENT,
        }
    }
}

impl From<AppEvent> for BusEvent {
    fn from(event: AppEvent) -> Self {
        BusEvent::App(event)
    }
}
