//! Sign-in, token refresh, sign-out and session bootstrap

use super::{ClientError, SessionClient, read_json};
use crate::types::{
    REFRESH_PATH, RefreshRequest, RefreshResponse, SIGN_IN_PATH, SIGN_OUT_PATH, SignInRequest,
    SignInResponse, SignOutRequest, VERIFY_PATH, VerifyRequest,
};
use panel_core::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use panel_core::{Durability, GuardDecision, Route, SessionState, UserProfile};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

/// Shown when sign-in fails without a message from the backend
pub const SIGN_IN_FAILED_MESSAGE: &str = "Sign-in failed. Please try again.";
/// Shown when the sign-in response lacks tokens or the user record
pub const MISSING_TOKEN_MESSAGE: &str = "No token received.";
/// Shown when a successful sign-in could not be persisted
pub const SAVE_FAILED_MESSAGE: &str = "Could not save the session.";

struct IssuedSession {
    access: String,
    refresh: Option<String>,
    user: UserProfile,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl SessionClient {
    /// Sign in with a password.
    ///
    /// On success the tokens and user record are persisted in the store
    /// chosen by `remember_me`, the state is updated and the navigator is
    /// sent to the dashboard. On failure nothing is persisted and the state
    /// carries a user-facing error message. If persisting fails the state
    /// is also signed out.
    pub async fn sign_in(&self, credentials: SignInRequest) -> Result<UserProfile, ClientError> {
        self.context.clear_error();

        let issued = match self.request_sign_in(&credentials).await {
            Ok(issued) => issued,
            Err(err) => {
                let message = match &err {
                    ClientError::MissingTokens => MISSING_TOKEN_MESSAGE.to_string(),
                    other => other
                        .detail()
                        .map_or_else(|| SIGN_IN_FAILED_MESSAGE.to_string(), str::to_string),
                };
                warn!(error = %err, "Sign-in failed");
                self.context.set_error(message);
                return Err(err);
            }
        };

        let durability = Durability::from_remember_me(credentials.remember_me);
        if let Err(err) = self.persist_session(durability, &issued).await {
            warn!(error = %err, "Failed to persist session after sign-in");
            // Storage may already be cleared, so no earlier user can stay signed in.
            self.context.signed_out();
            self.context.set_error(SAVE_FAILED_MESSAGE);
            return Err(err);
        }

        info!(user_id = ?issued.user.id(), durability = ?durability, "Signed in");
        self.context.signed_in(issued.user.clone());
        self.navigator.navigate(&Route::Dashboard);
        Ok(issued.user)
    }

    async fn request_sign_in(
        &self,
        credentials: &SignInRequest,
    ) -> Result<IssuedSession, ClientError> {
        let url = self.endpoint(SIGN_IN_PATH)?;
        let response = self.http.post(url).json(credentials).send().await?;
        let body = read_json(response).await?;
        let response: SignInResponse =
            serde_json::from_value(body).map_err(ClientError::MalformedResponse)?;

        match (non_empty(response.access), response.user) {
            (Some(access), Some(user)) => Ok(IssuedSession {
                access,
                refresh: non_empty(response.refresh),
                user,
            }),
            _ => Err(ClientError::MissingTokens),
        }
    }

    /// Replace whatever session was stored with `issued`, in one write
    async fn persist_session(
        &self,
        durability: Durability,
        issued: &IssuedSession,
    ) -> Result<(), ClientError> {
        let user =
            serde_json::to_string(&issued.user).map_err(ClientError::MalformedResponse)?;

        let mut entries = vec![
            (ACCESS_TOKEN_KEY, issued.access.as_str()),
            (USER_KEY, user.as_str()),
        ];
        if let Some(refresh) = &issued.refresh {
            entries.push((REFRESH_TOKEN_KEY, refresh.as_str()));
        }

        self.stores.clear_all().await?;
        self.stores.store(durability).set_many(&entries).await?;
        self.stores.select(durability);
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Only the access token is overwritten. Returns false, leaving storage
    /// untouched, when there is no refresh token or the exchange fails.
    pub async fn refresh(&self) -> bool {
        match self.exchange_refresh_token().await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                warn!(error = %err, "Token refresh failed");
                false
            }
        }
    }

    async fn exchange_refresh_token(&self) -> Result<bool, ClientError> {
        let store = self.stores.active();
        let Some(refresh) = non_empty(store.get(REFRESH_TOKEN_KEY).await?) else {
            debug!("No refresh token stored, skipping refresh");
            return Ok(false);
        };

        let url = self.endpoint(REFRESH_PATH)?;
        let response = self
            .http
            .post(url)
            .json(&RefreshRequest { refresh: &refresh })
            .send()
            .await?;
        let body = read_json(response).await?;
        let response: RefreshResponse =
            serde_json::from_value(body).map_err(ClientError::MalformedResponse)?;

        let Some(access) = non_empty(response.access) else {
            warn!("Refresh response did not include an access token");
            return Ok(false);
        };

        store.set(ACCESS_TOKEN_KEY, &access).await?;
        debug!("Access token refreshed");
        Ok(true)
    }

    /// Ask the backend whether the stored access token is still valid.
    ///
    /// Returns `Ok(false)` when no token is stored or the backend rejects it.
    pub async fn verify(&self) -> Result<bool, ClientError> {
        let Some(access) = self.access_token().await? else {
            return Ok(false);
        };

        let url = self.endpoint(VERIFY_PATH)?;
        let response = self
            .http
            .post(url)
            .json(&VerifyRequest { token: &access })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => Ok(false),
            _ => read_json(response).await.map(|_| false),
        }
    }

    /// End the session.
    ///
    /// The backend is notified on a best-effort basis; local state is always
    /// cleared and the navigator is sent to the sign-in view.
    pub async fn end_session(&self) {
        let store = self.stores.active();
        let access = store.get(ACCESS_TOKEN_KEY).await.ok().flatten();
        let refresh = store.get(REFRESH_TOKEN_KEY).await.ok().flatten();

        if let (Some(access), Some(refresh)) = (non_empty(access), non_empty(refresh)) {
            if let Err(err) = self.notify_sign_out(&access, &refresh).await {
                warn!(error = %err, "Sign-out notification failed, signing out locally");
            }
        }

        if let Err(err) = self.stores.clear_all().await {
            warn!(error = %err, "Failed to clear persisted session");
        }

        self.context.signed_out();
        info!("Signed out");
        self.navigator.navigate(&Route::Login);
    }

    async fn notify_sign_out(&self, access: &str, refresh: &str) -> Result<(), ClientError> {
        let url = self.endpoint(SIGN_OUT_PATH)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(access)
            .json(&SignOutRequest { refresh })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(ClientError::from_status(status, &text))
        }
    }

    /// Hydrate the state from persisted storage.
    ///
    /// Only the first call reads storage; later calls return the current
    /// state untouched. Unreadable or incomplete persisted data counts as
    /// signed out.
    pub async fn load_session(&self) -> SessionState {
        if !self.context.is_loading() {
            return self.context.snapshot();
        }

        let user = match self.restore_user().await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "Could not read persisted session, discarding it");
                if let Err(err) = self.stores.clear_all().await {
                    warn!(error = %err, "Failed to clear persisted session");
                }
                None
            }
        };

        if self.context.finish_loading(user) {
            debug!(signed_in = self.context.snapshot().is_signed_in(), "Session loaded");
        }
        self.context.snapshot()
    }

    async fn restore_user(&self) -> Result<Option<UserProfile>, ClientError> {
        let Some(raw) = self.stores.restore().await? else {
            return Ok(None);
        };

        let user = match serde_json::from_str::<UserProfile>(&raw) {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "Discarding corrupt persisted user record");
                self.stores.clear_all().await?;
                return Ok(None);
            }
        };

        if self.access_token().await?.is_none() {
            warn!("Persisted user has no access token, discarding session");
            self.stores.clear_all().await?;
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// Decide whether `target` may be entered.
    ///
    /// Bootstraps the session first and evaluates only once loading has
    /// resolved.
    pub async fn guard(&self, target: &Route) -> GuardDecision {
        self.load_session().await;
        let state = self.context.wait_until_loaded().await;
        let decision = state.guard(target);
        debug!(target = %target, decision = ?decision, "Route guard evaluated");
        decision
    }
}
