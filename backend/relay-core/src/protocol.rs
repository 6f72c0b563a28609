//! Wire protocol between foreground clients and a background context.
//!
//! Structured JSON messages, no framing of their own:
//!
//! | Direction | Shape | Meaning |
//! |---|---|---|
//! | foreground → background | `{"name": "init", "config": {...}}` | bootstrap / liveness probe |
//! | foreground → background | `{"name": <other>, ...}` | application defined |
//! | background → foreground | `{"name": "APP_EVENT", "data": <AppEvent>}` | state-change notification |
//! | background → foreground | `{"hello": "from worker"}` | reply to unrecognized names |

use crate::config::StaticConfig;
use crate::event::AppEvent;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const INIT: &str = "init";
pub const HELLO_REPLY: &str = "from worker";

/// Message sent by a foreground client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Missing names deserialize as `""` and get the handshake reply.
    #[serde(default)]
    pub name: String,

    /// Left untyped on the wire: only `init` gives it a meaning, and other
    /// messages may carry any `config` they like.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClientMessage {
    pub fn init(config: StaticConfig) -> Self {
        let config = match serde_json::to_value(&config) {
            Ok(value) => value,
            Err(e) => {
                warn!("Cannot encode static configuration, sending none: {}", e);
                Value::Null
            }
        };
        Self {
            name: INIT.to_string(),
            config: Some(config),
            extra: Map::new(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_init(&self) -> bool {
        self.name == INIT
    }

    /// The bootstrap configuration carried by an `init`.
    ///
    /// Missing, `null` or malformed configs yield the default (with a warning
    /// for the malformed case); the bootstrap then fails on the missing
    /// `API_SERVER` instead of the message being dropped.
    pub fn static_config(&self) -> StaticConfig {
        match &self.config {
            None | Some(Value::Null) => StaticConfig::default(),
            Some(value) => match StaticConfig::deserialize(value) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Ignoring malformed static configuration: {}", e);
                    StaticConfig::default()
                }
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// The only `name` an envelope from the background may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeName {
    #[serde(rename = "APP_EVENT")]
    AppEvent,
}

/// Message sent by a background context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    AppEvent { name: EnvelopeName, data: AppEvent },
    Hello { hello: String },
}

impl ServerMessage {
    pub fn app_event(event: AppEvent) -> Self {
        ServerMessage::AppEvent {
            name: EnvelopeName::AppEvent,
            data: event,
        }
    }

    pub fn hello() -> Self {
        ServerMessage::Hello {
            hello: HELLO_REPLY.to_string(),
        }
    }

    pub fn as_app_event(&self) -> Option<&AppEvent> {
        match self {
            ServerMessage::AppEvent { data, .. } => Some(data),
            ServerMessage::Hello { .. } => None,
        }
    }

    pub fn into_app_event(self) -> Option<AppEvent> {
        match self {
            ServerMessage::AppEvent { data, .. } => Some(data),
            ServerMessage::Hello { .. } => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
