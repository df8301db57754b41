//! Page access decisions.
//!
//! Every page asks [`decide`] whether it may render for the current viewer. The
//! function is pure so the HTML handlers and the API client share the same rules.

use crate::db::models::User;
use crate::models::Role;
use crate::names;

/// What is known about the viewer when a page is requested.
#[derive(Clone, Debug, PartialEq)]
pub enum IdentityState {
    /// The profile has not been fetched yet.
    Loading,
    Ready(Option<User>),
}

/// Access requirements of a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Policy {
    pub roles: Option<&'static [Role]>,
    pub require_placement: bool,
}

impl Policy {
    /// Any signed-in user. Unplaced students are sent to the placement test.
    pub const ANY: Policy = Policy {
        roles: None,
        require_placement: true,
    };

    /// Any signed-in user, placed or not.
    pub const ANY_UNPLACED: Policy = Policy {
        roles: None,
        require_placement: false,
    };

    pub const STUDENT: Policy = Policy {
        roles: Some(&[Role::Student]),
        require_placement: true,
    };

    /// The placement page itself.
    pub const PLACEMENT: Policy = Policy {
        roles: Some(&[Role::Student]),
        require_placement: false,
    };

    pub const TEACHER: Policy = Policy {
        roles: Some(&[Role::Teacher, Role::Admin]),
        require_placement: true,
    };
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Access {
    /// Render nothing until the identity is known.
    Suspend,
    Redirect(String),
    Render,
}

pub fn decide(identity: &IdentityState, policy: &Policy, path: &str) -> Access {
    let user = match identity {
        IdentityState::Loading => return Access::Suspend,
        IdentityState::Ready(None) => return Access::Redirect(names::login_with_next(path)),
        IdentityState::Ready(Some(user)) => user,
    };

    if let Some(roles) = policy.roles {
        if !roles.contains(&user.role) {
            return Access::Redirect(names::DASHBOARD_URL.to_string());
        }
    }

    let route = path.split_once('?').map_or(path, |(route, _)| route);
    if policy.require_placement && user.needs_placement() && route != names::PLACEMENT_TEST_URL {
        return Access::Redirect(names::PLACEMENT_TEST_URL.to_string());
    }

    Access::Render
}

/// Server-side entry point: the viewer is always known by the time a page runs.
///
/// Returns the user when the page may render, or the redirect target.
pub fn guard(viewer: Option<User>, policy: &Policy, path: &str) -> Result<User, String> {
    let identity = IdentityState::Ready(viewer);
    match decide(&identity, policy, path) {
        Access::Redirect(target) => Err(target),
        Access::Suspend => Err(names::login_with_next(path)),
        Access::Render => match identity {
            IdentityState::Ready(Some(user)) => Ok(user),
            _ => Err(names::login_with_next(path)),
        },
    }
}

/// Where to go after signing in: `next` when it is a local path, the dashboard otherwise.
pub fn post_login_target(next: Option<&str>) -> String {
    match next {
        Some(next) if names::is_safe_next(next) => next.to_string(),
        _ => names::DASHBOARD_URL.to_string(),
    }
}
