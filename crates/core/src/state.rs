//! In-memory session state
//!
//! [`SessionContext`] owns the reactive [`SessionState`]. It is created with
//! the client and passed explicitly to whoever needs it; observers subscribe
//! to a `watch` channel and see every transition.

use crate::route::{GuardDecision, Route, evaluate_guard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

/// Opaque user record returned by the backend at sign-in
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(Map<String, Value>);

impl UserProfile {
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    /// Look up a single attribute
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The backend's `id` attribute, if present
    pub fn id(&self) -> Option<&Value> {
        self.get("id")
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Authentication state
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true, // Until persisted state has been read once
            error: None,
        }
    }
}

impl SessionState {
    pub const fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Guard decision for `target` against this state
    pub fn guard(&self, target: &Route) -> GuardDecision {
        evaluate_guard(target, self.is_signed_in())
    }
}

/// Owner of the session state for one client
#[derive(Debug)]
pub struct SessionContext {
    tx: watch::Sender<SessionState>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionState::default());
        Self { tx }
    }

    /// Current state
    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.tx.borrow().loading
    }

    /// Finish bootstrap with the persisted user.
    ///
    /// Only the first call has an effect; returns whether it applied.
    pub fn finish_loading(&self, user: Option<UserProfile>) -> bool {
        self.tx.send_if_modified(|state| {
            if !state.loading {
                return false;
            }
            state.user = user;
            state.loading = false;
            true
        })
    }

    pub fn signed_in(&self, user: UserProfile) {
        self.tx.send_modify(|state| {
            state.user = Some(user);
            state.loading = false;
            state.error = None;
        });
    }

    pub fn signed_out(&self) {
        self.tx.send_replace(SessionState {
            user: None,
            loading: false,
            error: None,
        });
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|state| state.error = Some(message));
    }

    pub fn clear_error(&self) {
        self.tx.send_if_modified(|state| state.error.take().is_some());
    }

    /// Wait until bootstrap has completed and return the resulting state
    pub async fn wait_until_loaded(&self) -> SessionState {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        match rx.wait_for(|state| !state.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.snapshot(),
        }
    }
}
