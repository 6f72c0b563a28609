//! Turns a snapshot refresh into the list of events to publish.

use crate::event::AppEvent;
use crate::store::snapshot::ConfigSnapshot;

/// Authentication booleans cached between refreshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthFlags {
    pub authenticated: bool,
    pub github_authenticated: bool,
}

impl AuthFlags {
    pub fn of(snapshot: &ConfigSnapshot) -> Self {
        Self {
            authenticated: snapshot.is_authenticated(),
            github_authenticated: snapshot.is_github_authenticated(),
        }
    }
}

/// `CONFIG_READY`, then `AUTH_CHANGE` if the user flag flipped, then
/// `GITHUB_AUTH_CHANGE` if the GitHub flag flipped.
pub fn refresh_events(previous: AuthFlags, current: AuthFlags) -> Vec<AppEvent> {
    let mut events = vec![AppEvent::config_ready()];

    if previous.authenticated != current.authenticated {
        events.push(AppEvent::auth_change(current.authenticated));
    }

    if previous.github_authenticated != current.github_authenticated {
        events.push(AppEvent::github_auth_change(current.github_authenticated));
    }

    events
}
