//! Bootstrap of a background context.

use crate::error::bus::BusError;
use crate::event::{BusEvent, EventBus, SubscriptionId};
use crate::store::ConfigStore;

use log::info;

/// Subscribes to `STATIC_CONFIG`: merge the payload into the store, then fetch.
///
/// Only the port registry publishes `STATIC_CONFIG`, and only once, so in
/// practice this fires once per context. A second event would merge and fetch
/// again.
pub(crate) fn install(bus: &EventBus, store: &ConfigStore) -> SubscriptionId {
    // The store owns the bus; a strong reference here would be a cycle
    let store = store.downgrade();
    bus.register(move |event| {
        let BusEvent::StaticConfig(config) = event else {
            return Ok(());
        };
        let Some(store) = store.upgrade() else {
            return Ok(());
        };

        info!("Static configuration received, starting first fetch");
        store.extend(config.clone());

        // The handle is dropped: the fetch announces its outcome on the bus
        store
            .fetch()
            .map(|_| ())
            .map_err(|e| BusError::subscriber(format!("Cannot start configuration fetch: {e}")))
    })
}
