//! Background context.
//!
//! A [`BackgroundContext`] is one authoritative owner of configuration state:
//! an [`EventBus`], a [`ConfigStore`], a [`PortRegistry`], and the bootstrap
//! subscription wiring them together. Contexts are plain values; nothing is
//! global, and any number of them can live in one process.
//!
//! Two ways to host one:
//!
//! - [`start_shared_host`] - a localhost WebSocket server; every connecting
//!   foreground client shares the same context.
//! - [`spawn_dedicated`] - a private context on a tokio task, reachable only
//!   by the client that spawned it.

mod dedicated;
mod entrypoint;
mod shared;

pub use dedicated::{DedicatedWorker, WorkerSignal, spawn_dedicated};
pub use shared::{SharedHostHandle, start_shared_host};

use crate::config::HttpSettings;
use crate::error::http::HttpError;
use crate::event::{EventBus, SubscriptionId};
use crate::registry::PortRegistry;
use crate::store::{ConfigHttpClient, ConfigStore};

use log::info;

#[derive(Clone)]
pub struct BackgroundContext {
    bus: EventBus,
    store: ConfigStore,
    registry: PortRegistry,
    bootstrap: SubscriptionId,
}

impl BackgroundContext {
    /// Wires bus, store, registry and bootstrap subscription together.
    pub fn new(client: ConfigHttpClient) -> Self {
        let bus = EventBus::new();
        let store = ConfigStore::new(bus.clone(), client);
        let registry = PortRegistry::new(bus.clone(), store.clone());
        let bootstrap = entrypoint::install(&bus, &store);

        info!("Background context created");

        Self {
            bus,
            store,
            registry,
            bootstrap,
        }
    }

    pub fn from_settings(settings: &HttpSettings) -> Result<Self, HttpError> {
        Ok(Self::new(ConfigHttpClient::new(settings)?))
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    pub fn bootstrap_subscription(&self) -> SubscriptionId {
        self.bootstrap
    }
}
