//! Logical routes, the navigation collaborator and the route guard decision

use std::fmt;
use tracing::info;

/// Path of the sign-in view
pub const LOGIN_PATH: &str = "/login";
/// Path of the authenticated landing view
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Other(String),
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            LOGIN_PATH => Self::Login,
            DASHBOARD_PATH => Self::Dashboard,
            _ => Self::Other(path.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Login => LOGIN_PATH,
            Self::Dashboard => DASHBOARD_PATH,
            Self::Other(path) => path,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Outcome of evaluating the guard for a target route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(Route),
}

/// Decide whether `target` may be entered given the current sign-in status
pub fn evaluate_guard(target: &Route, signed_in: bool) -> GuardDecision {
    match (target, signed_in) {
        (Route::Login, true) => GuardDecision::Redirect(Route::Dashboard),
        (Route::Login, false) | (_, true) => GuardDecision::Proceed,
        (_, false) => GuardDecision::Redirect(Route::Login),
    }
}

/// Receives navigation requests issued by session transitions
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &Route);
}

/// Navigator that only records the transition in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: &Route) {
        info!(route = %route, "Navigating");
    }
}
