//! Wire types for the authentication endpoints

use panel_core::UserProfile;
use serde::{Deserialize, Serialize};

/// Sign-in endpoint, relative to the API root
pub const SIGN_IN_PATH: &str = "user/sign-in-with-password/";
/// Token refresh endpoint
pub const REFRESH_PATH: &str = "token/refresh/";
/// Token verification endpoint
pub const VERIFY_PATH: &str = "token/verify/";
/// Sign-out notification endpoint
pub const SIGN_OUT_PATH: &str = "user/sign-out-request/";

/// Credentials submitted at sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    #[serde(rename = "phone_number")]
    pub identifier: String,
    #[serde(rename = "password")]
    pub secret: String,
    /// Keep the session across restarts
    #[serde(rename = "keep_me_signed_in")]
    pub remember_me: bool,
}

impl SignInRequest {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
            remember_me: false,
        }
    }

    pub fn remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }
}

/// Sign-in response. Every field is optional on the wire; the client
/// decides what counts as a usable answer.
#[derive(Debug, Default, Deserialize)]
pub struct SignInResponse {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub user: Option<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshResponse {
    pub access: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyRequest<'a> {
    pub token: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SignOutRequest<'a> {
    pub refresh: &'a str,
}
