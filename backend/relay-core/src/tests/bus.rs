// Unit tests for the event bus
// Ordering, fail-fast dispatch, and snapshot semantics on (un)registration

use crate::error::bus::BusError;
use crate::event::{AppEvent, BusEvent, EventBus};

use std::sync::{Arc, Mutex};

fn config_ready() -> BusEvent {
    BusEvent::App(AppEvent::config_ready())
}

/// **VALUE**: Subscribers run in the order they were registered.
///
/// **WHY THIS MATTERS**: The bootstrap subscription is registered after the
/// registry's broadcast subscription; observers rely on a stable order.
///
/// **BUG THIS CATCHES**: Would catch the subscriber list being stored in a map
/// or otherwise reordered.
#[test]
fn given_three_subscribers_when_dispatch_then_called_in_registration_order() {
    // GIVEN: Three subscribers recording their index
    let bus = EventBus::new();
    let calls = Arc::new(Mutex::new(Vec::new()));
    for index in 0..3 {
        let calls = Arc::clone(&calls);
        bus.register(move |_| {
            calls.lock().unwrap().push(index);
            Ok(())
        });
    }

    // WHEN: Dispatching one event
    bus.dispatch(&config_ready()).unwrap();

    // THEN: Every subscriber ran once, in order
    assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
}

/// **VALUE**: A failing subscriber stops the dispatch and surfaces its error.
///
/// **WHY THIS MATTERS**: A misbehaving subscriber must break dispatch visibly
/// instead of being silently skipped.
///
/// **BUG THIS CATCHES**: Would catch errors being logged and swallowed, or later
/// subscribers still running after a failure.
#[test]
fn given_failing_subscriber_when_dispatch_then_later_subscribers_skipped() {
    // GIVEN: ok, failing, ok
    let bus = EventBus::new();
    let reached = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&reached);
    bus.register(move |_| {
        first.lock().unwrap().push("first");
        Ok(())
    });
    bus.register(|_| Err(BusError::subscriber("boom")));
    let third = Arc::clone(&reached);
    bus.register(move |_| {
        third.lock().unwrap().push("third");
        Ok(())
    });

    // WHEN: Dispatching
    let result = bus.dispatch(&config_ready());

    // THEN: The error comes back and the third subscriber never ran
    let error = result.unwrap_err();
    assert!(error.to_string().contains("boom"));
    assert_eq!(*reached.lock().unwrap(), vec!["first"]);
}

#[test]
fn given_subscriber_registered_during_dispatch_when_dispatch_then_runs_next_time() {
    // GIVEN: A subscriber that registers another one on its first call
    let bus = EventBus::new();
    let late_calls = Arc::new(Mutex::new(0));

    let inner_bus = bus.clone();
    let late = Arc::clone(&late_calls);
    let registered = Arc::new(Mutex::new(false));
    bus.register(move |_| {
        let mut registered = registered.lock().unwrap();
        if !*registered {
            *registered = true;
            let late = Arc::clone(&late);
            inner_bus.register(move |_| {
                *late.lock().unwrap() += 1;
                Ok(())
            });
        }
        Ok(())
    });

    // WHEN: Dispatching twice
    bus.dispatch(&config_ready()).unwrap();
    let after_first = *late_calls.lock().unwrap();
    bus.dispatch(&config_ready()).unwrap();

    // THEN: The late subscriber missed the dispatch that registered it
    assert_eq!(after_first, 0);
    assert_eq!(*late_calls.lock().unwrap(), 1);
    assert_eq!(bus.subscriber_count(), 2);
}

#[test]
fn given_unregistered_subscriber_when_dispatch_then_not_called() {
    let bus = EventBus::new();
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let id = bus.register(move |_| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    assert!(bus.unregister(id));
    assert!(!bus.unregister(id));
    bus.dispatch(&config_ready()).unwrap();

    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn given_app_event_when_wrapped_then_bus_event_name_is_app_event() {
    let event: BusEvent = AppEvent::auth_change(true).into();
    assert_eq!(event.name(), BusEvent::APP_EVENT);
    assert_eq!(
        BusEvent::StaticConfig(Default::default()).name(),
        BusEvent::STATIC_CONFIG
    );
}
