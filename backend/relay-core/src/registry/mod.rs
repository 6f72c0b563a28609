//! Port registry.
//!
//! Multiplexes many foreground connections onto one background context:
//!
//! - inbound: every message from any port goes through
//!   [`PortRegistry::handle_message`]
//! - outbound: every `APP_EVENT` on the bus is broadcast to all ports
//!
//! # Replay
//!
//! A port sending `init` while no fetch is running gets the store's current
//! pending events replayed to it, and only to it. While a fetch is running the
//! replay is skipped: the port is already registered and will get the fetch
//! outcome through the regular broadcast.

mod port;

pub use port::{ChannelPort, Port, PortId};

use crate::error::bus::BusError;
use crate::event::{BusEvent, EventBus, SubscriptionId};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::store::ConfigStore;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, info};

/// A message received from a port, plus the way to answer that port only.
pub struct InboundMessage {
    pub data: ClientMessage,
    pub respond: Arc<dyn Port>,
}

impl InboundMessage {
    pub fn new(data: ClientMessage, respond: Arc<dyn Port>) -> Self {
        Self { data, respond }
    }
}

struct RegistryInner {
    bus: EventBus,
    store: ConfigStore,
    ports: Mutex<Vec<(PortId, Arc<dyn Port>)>>,
    config_initialized: AtomicBool,
}

/// Port registry of one background context.
#[derive(Clone)]
pub struct PortRegistry {
    inner: Arc<RegistryInner>,
    subscription: SubscriptionId,
}

impl PortRegistry {
    /// Creates the registry and subscribes it to `bus` for `APP_EVENT` broadcasts.
    pub fn new(bus: EventBus, store: ConfigStore) -> Self {
        let inner = Arc::new(RegistryInner {
            bus: bus.clone(),
            store,
            ports: Mutex::new(Vec::new()),
            config_initialized: AtomicBool::new(false),
        });

        // Weak: the bus must not keep the registry alive
        let weak: Weak<RegistryInner> = Arc::downgrade(&inner);
        let subscription = bus.register(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_event(event);
            }
            Ok(())
        });

        Self {
            inner,
            subscription,
        }
    }

    /// Registers a port. No de-duplication: adding the same port twice
    /// delivers every broadcast to it twice.
    ///
    /// Waits for a fetch outcome being published to finish, so the new port
    /// sees either all of that broadcast or none of it.
    pub fn add_port(&self, port: Arc<dyn Port>) -> PortId {
        let id = PortId::new();
        let _relay = self.inner.store.lock_relay();
        let mut ports = self.inner.lock_ports();
        ports.push((id, port));
        debug!("Port {} added ({} total)", id, ports.len());
        id
    }

    /// Forgets a port whose connection has ended.
    pub fn remove_port(&self, id: PortId) -> bool {
        let mut ports = self.inner.lock_ports();
        let before = ports.len();
        ports.retain(|(port_id, _)| *port_id != id);
        let removed = ports.len() != before;
        if removed {
            debug!("Port {} removed ({} left)", id, ports.len());
        }
        removed
    }

    pub fn port_count(&self) -> usize {
        self.inner.lock_ports().len()
    }

    /// Routes one inbound message.
    ///
    /// - `init`: the first one ever publishes `STATIC_CONFIG` with the sender's
    ///   config; every one replays pending events to the sender if no fetch is
    ///   in progress.
    /// - anything else: answered with the handshake reply.
    ///
    /// # Errors
    ///
    /// Propagates a [`BusError`] raised while publishing `STATIC_CONFIG`.
    pub fn handle_message(&self, message: InboundMessage) -> Result<(), BusError> {
        let InboundMessage { data, respond } = message;
        debug!("Handling message '{}'", data.name);

        if !data.is_init() {
            deliver(respond.as_ref(), ServerMessage::hello());
            return Ok(());
        }

        // Held until the replay is done: a fetch cannot publish in between
        let _relay = self.inner.store.lock_relay();

        if !self.inner.config_initialized.swap(true, Ordering::SeqCst) {
            info!("First init received, publishing static configuration");
            let config = data.static_config();
            self.inner.bus.dispatch(&BusEvent::StaticConfig(config))?;
        }

        if !self.inner.store.is_fetch_in_progress() {
            let events = self.inner.store.app_events();
            debug!("Replaying {} pending events", events.len());
            for event in events {
                deliver(respond.as_ref(), ServerMessage::app_event(event));
            }
        }

        Ok(())
    }

    /// Bus callback: relays `APP_EVENT`s to every port.
    pub fn handle_event(&self, event: &BusEvent) {
        self.inner.handle_event(event);
    }

    /// Sends `message` to every registered port.
    ///
    /// A port that fails is skipped; the rest still get the message.
    /// Returns the number of successful deliveries.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        self.inner.broadcast(message)
    }

    pub fn is_config_initialized(&self) -> bool {
        self.inner.config_initialized.load(Ordering::SeqCst)
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }
}

impl RegistryInner {
    fn lock_ports(&self) -> MutexGuard<'_, Vec<(PortId, Arc<dyn Port>)>> {
        self.ports.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_event(&self, event: &BusEvent) {
        let BusEvent::App(app_event) = event else {
            return;
        };
        self.broadcast(&ServerMessage::app_event(app_event.clone()));
    }

    fn broadcast(&self, message: &ServerMessage) -> usize {
        // Ports are called without the registry lock held
        let ports: Vec<(PortId, Arc<dyn Port>)> = self
            .lock_ports()
            .iter()
            .map(|(id, port)| (*id, Arc::clone(port)))
            .collect();

        let mut delivered = 0;
        for (id, port) in ports {
            match port.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Dropping message for port {}: {}", id, e),
            }
        }
        delivered
    }
}

fn deliver(port: &dyn Port, message: ServerMessage) {
    if let Err(e) = port.send(message) {
        debug!("Reply not delivered: {}", e);
    }
}
