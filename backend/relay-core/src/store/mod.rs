//! Configuration store.
//!
//! Owns the configuration snapshot of a background context, refreshes it from
//! `GET {API_SERVER}/config`, and turns every refresh into a short list of
//! [`AppEvent`]s published on the context's [`EventBus`].
//!
//! # Fetch lifecycle
//!
//! 1. [`ConfigStore::fetch`] resolves the URL and marks a fetch in flight
//!    *before* returning, so anything inspecting [`ConfigStore::is_fetch_in_progress`]
//!    right after the call already sees it.
//! 2. The request runs on a tokio task. Fetches never overlap: a second call
//!    queues behind the first.
//! 3. On completion the snapshot is updated (success) or kept (failure), the
//!    pending-event list is replaced, the in-flight mark is cleared, and the
//!    pending events are dispatched in order. Both outcomes dispatch.
//!
//! Step 3 runs under the relay lock ([`ConfigStore::lock_relay`]). The port
//! registry takes the same lock to add ports and to handle `init`, so a port
//! either joins before the outcome is published (and gets the broadcast) or
//! after it (and gets the replay), never both.
//!
//! The pending-event list outlives the fetch: [`ConfigStore::app_events`]
//! keeps returning it so late joiners can replay it.

mod diff;
mod http;
mod snapshot;

pub use diff::{AuthFlags, refresh_events};
pub use http::{ConfigHttpClient, config_url};
#[cfg(test)]
pub(crate) use http::json_content_type_regex;
pub use snapshot::{API_SERVER_KEY, ConfigSnapshot, ENDPOINTS_KEY, USER_KEY};

use crate::config::StaticConfig;
use crate::error::store::StoreError;
use crate::event::{AppEvent, BusEvent, EventBus};

use common::{ErrorLocation, HttpStatusCode, RedactedToken};

use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, info, warn};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use url::Url;

/// Observable state of the fetch machinery.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    pub in_progress: bool,
    pub last_error: Option<StoreError>,
    pub pending_events: Vec<AppEvent>,
}

/// A fetch running in the background.
///
/// Dropping the handle does not cancel the fetch; it always runs to
/// completion and always dispatches its outcome.
pub struct FetchHandle {
    handle: JoinHandle<Result<(), StoreError>>,
}

impl FetchHandle {
    /// Waits for the fetch and its event dispatch to finish.
    ///
    /// # Errors
    ///
    /// [`StoreError::ServiceUnavailable`] if the fetch failed,
    /// [`StoreError::Dispatch`] if a bus subscriber failed.
    pub async fn settled(self) -> Result<(), StoreError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
struct StoreState {
    snapshot: ConfigSnapshot,
    flags: AuthFlags,
    fetches_in_flight: usize,
    last_error: Option<StoreError>,
    pending_events: Vec<AppEvent>,
}

struct StoreInner {
    bus: EventBus,
    client: ConfigHttpClient,
    state: Mutex<StoreState>,
    fetch_gate: tokio::sync::Mutex<()>,
    relay: Mutex<()>,
}

/// Configuration store of one background context.
///
/// `Clone` is cheap; all clones share the same snapshot.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

impl ConfigStore {
    pub fn new(bus: EventBus, client: ConfigHttpClient) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                bus,
                client,
                state: Mutex::new(StoreState::default()),
                fetch_gate: tokio::sync::Mutex::new(()),
                relay: Mutex::new(()),
            }),
        }
    }

    /// Merges bootstrap configuration. Fetched keys are untouched.
    pub fn extend(&self, partial: StaticConfig) {
        debug!("Extending static configuration: {:?}", partial);
        self.inner.lock().snapshot.extend(partial);
    }

    /// Starts a configuration refresh on a tokio task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails immediately, without starting anything, if no `API_SERVER` is
    /// known or it is not a valid URL.
    pub fn fetch(&self) -> Result<FetchHandle, StoreError> {
        let url = {
            let mut state = self.inner.lock();
            let api_server =
                state
                    .snapshot
                    .api_server()
                    .ok_or_else(|| StoreError::MissingApiServer {
                        message: "API_SERVER is not configured".to_string(),
                        location: ErrorLocation::from(Location::caller()),
                    })?;
            let url = config_url(api_server, state.snapshot.static_config().https)?;
            state.fetches_in_flight += 1;
            url
        };

        info!("Fetching configuration from {}", url);

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run_fetch(url).await });
        Ok(FetchHandle { handle })
    }

    /// Stores a GitHub token obtained out of band and announces it.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotAuthenticated`] if the snapshot has no `user` record,
    /// [`StoreError::Dispatch`] if a bus subscriber failed.
    pub fn set_github_token(&self, token: RedactedToken) -> Result<(), StoreError> {
        let length = token.len();
        {
            let mut state = self.inner.lock();
            state.snapshot.set_github_token(token)?;
            state.flags.github_authenticated = true;
        }
        info!("GitHub token updated ({length} chars)");

        self.inner
            .bus
            .dispatch(&BusEvent::App(AppEvent::github_auth_change(true)))?;
        Ok(())
    }

    /// The events computed by the most recent completed fetch.
    pub fn app_events(&self) -> Vec<AppEvent> {
        self.inner.lock().pending_events.clone()
    }

    pub fn is_fetch_in_progress(&self) -> bool {
        self.inner.lock().fetches_in_flight > 0
    }

    pub fn fetch_state(&self) -> FetchState {
        let state = self.inner.lock();
        FetchState {
            in_progress: state.fetches_in_flight > 0,
            last_error: state.last_error.clone(),
            pending_events: state.pending_events.clone(),
        }
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        self.inner.lock().snapshot.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().flags.authenticated
    }

    pub fn is_github_authenticated(&self) -> bool {
        self.inner.lock().flags.github_authenticated
    }

    /// Serializes fetch completion against port registration and `init`.
    ///
    /// Never held across an await. Must not be taken from a bus subscriber:
    /// fetch completion dispatches while holding it.
    pub(crate) fn lock_relay(&self) -> MutexGuard<'_, ()> {
        self.inner.lock_relay()
    }

    pub(crate) fn downgrade(&self) -> WeakConfigStore {
        WeakConfigStore {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// Non-owning reference to a [`ConfigStore`], for bus subscribers.
#[derive(Clone)]
pub(crate) struct WeakConfigStore {
    inner: Weak<StoreInner>,
}

impl WeakConfigStore {
    pub(crate) fn upgrade(&self) -> Option<ConfigStore> {
        self.inner.upgrade().map(|inner| ConfigStore { inner })
    }
}

impl StoreInner {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_relay(&self) -> MutexGuard<'_, ()> {
        self.relay.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_fetch(&self, url: Url) -> Result<(), StoreError> {
        let _gate = self.fetch_gate.lock().await;

        let outcome = self.client.get_config(&url).await;
        self.publish(outcome)
    }

    /// Settles and dispatches as one step with respect to the registry.
    fn publish(&self, outcome: Result<Map<String, Value>, StoreError>) -> Result<(), StoreError> {
        let _relay = self.lock_relay();
        let (events, result) = self.settle(outcome);

        for event in events {
            self.bus.dispatch(&BusEvent::App(event))?;
        }
        result
    }

    /// Applies a fetch outcome and returns the events to dispatch.
    fn settle(
        &self,
        outcome: Result<Map<String, Value>, StoreError>,
    ) -> (Vec<AppEvent>, Result<(), StoreError>) {
        let mut state = self.lock();

        let result = match outcome {
            Ok(config) => {
                state.last_error = None;
                state.snapshot.replace_fetched(config);

                let current = AuthFlags::of(&state.snapshot);
                state.pending_events = refresh_events(state.flags, current);
                state.flags = current;

                info!(
                    "Configuration refreshed: {} keys, authenticated={}, github={}",
                    state.snapshot.fetched().len(),
                    current.authenticated,
                    current.github_authenticated
                );
                Ok(())
            }
            Err(error) => {
                warn!("Configuration fetch failed: {}", error);

                let status = error.status().unwrap_or(HttpStatusCode::NO_RESPONSE);
                state.pending_events = vec![AppEvent::service_unavailable(status)];
                state.last_error = Some(error.clone());
                Err(error)
            }
        };

        state.fetches_in_flight = state.fetches_in_flight.saturating_sub(1);
        (state.pending_events.clone(), result)
    }
}
