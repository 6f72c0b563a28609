// Unit tests for refresh event computation

use crate::event::{AUTH_CHANGE, CONFIG_READY, GITHUB_AUTH_CHANGE};
use crate::store::{AuthFlags, refresh_events};

fn names(flags: (AuthFlags, AuthFlags)) -> Vec<String> {
    refresh_events(flags.0, flags.1)
        .into_iter()
        .map(|event| event.name)
        .collect()
}

/// **VALUE**: An unchanged anonymous session yields `CONFIG_READY` alone.
///
/// **WHY THIS MATTERS**: Foreground code treats `AUTH_CHANGE` as a login/logout
/// transition; emitting it on every refresh would bounce the UI.
///
/// **BUG THIS CATCHES**: Would catch the cached flag starting as "unknown"
/// instead of `false`, which turns the first anonymous refresh into a spurious
/// `AUTH_CHANGE{false}`.
#[test]
fn given_no_user_before_and_after_when_refresh_then_only_config_ready() {
    // GIVEN: Default (anonymous) flags on both sides
    let previous = AuthFlags::default();
    let current = AuthFlags::default();

    // WHEN/THEN: Only CONFIG_READY
    assert_eq!(names((previous, current)), vec![CONFIG_READY]);
}

#[test]
fn given_user_appears_when_refresh_then_auth_change_true_follows_config_ready() {
    // GIVEN: Anonymous before, logged in after
    let current = AuthFlags {
        authenticated: true,
        github_authenticated: false,
    };

    // WHEN
    let events = refresh_events(AuthFlags::default(), current);

    // THEN
    assert_eq!(events.len(), 2);
    assert!(events[0].is(CONFIG_READY));
    assert!(events[1].is(AUTH_CHANGE));
    assert_eq!(events[1].authenticated(), Some(true));
}

/// **VALUE**: GitHub auth change is appended after the user auth change.
///
/// **BUG THIS CATCHES**: Would catch the two auth checks being evaluated in the
/// wrong order, which reorders events seen by every client.
#[test]
fn given_user_and_github_appear_when_refresh_then_github_change_is_last() {
    let current = AuthFlags {
        authenticated: true,
        github_authenticated: true,
    };

    assert_eq!(
        names((AuthFlags::default(), current)),
        vec![CONFIG_READY, AUTH_CHANGE, GITHUB_AUTH_CHANGE]
    );
}

#[test]
fn given_logout_when_refresh_then_both_changes_report_false() {
    let previous = AuthFlags {
        authenticated: true,
        github_authenticated: true,
    };

    let events = refresh_events(previous, AuthFlags::default());

    assert_eq!(events[1].authenticated(), Some(false));
    assert_eq!(events[2].authenticated(), Some(false));
}
