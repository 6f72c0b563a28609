//! In-process publish/subscribe.
//!
//! [`EventBus`] calls every registered subscriber synchronously, in
//! registration order, for every dispatched event. No queueing, no priority,
//! no de-duplication.
//!
//! ## Rules
//! - **Fail-fast**: a subscriber returning `Err` stops the dispatch; later
//!   subscribers are not called and the error goes back to the dispatcher.
//! - **Snapshot semantics**: the subscriber list is copied before a dispatch, so
//!   subscribers may register or unregister from inside a callback; the change
//!   applies to the next dispatch.
//! - **Context-local**: a bus is never visible outside the context that owns it.

use crate::error::bus::BusError;
use crate::event::BusEvent;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Subscriber = Arc<dyn Fn(&BusEvent) -> Result<(), BusError> + Send + Sync>;

/// Handle returned by [`EventBus::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(SubscriptionId, Subscriber)>,
}

/// Synchronous, ordered event bus.
///
/// Cheap to clone; all clones share the same subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a subscriber. It sees every event dispatched after this call.
    pub fn register<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&BusEvent) -> Result<(), BusError> + Send + Sync + 'static,
    {
        let mut subscribers = self.lock();
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.entries.push((id, Arc::new(subscriber)));
        id
    }

    /// Removes a subscriber. Returns `false` if the handle was unknown.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.entries.len();
        subscribers.entries.retain(|(entry_id, _)| *entry_id != id);
        subscribers.entries.len() != before
    }

    /// Calls every subscriber with `event`, in registration order.
    ///
    /// # Errors
    ///
    /// Returns the first [`BusError`] raised by a subscriber.
    pub fn dispatch(&self, event: &BusEvent) -> Result<(), BusError> {
        let snapshot: Vec<Subscriber> = self
            .lock()
            .entries
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();

        for subscriber in snapshot {
            subscriber(event)?;
        }
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
