//! Client error types

use panel_core::{CoreError, StorageError};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Why an authenticated call ended in a forced sign-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    /// The refresh token was missing or rejected
    RefreshFailed,
    /// The request was rejected again after a successful refresh
    RetryRejected,
}

impl fmt::Display for UnauthorizedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefreshFailed => f.write_str("refresh failed"),
            Self::RetryRejected => f.write_str("rejected after refresh"),
        }
    }
}

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// No access token is stored; the request was not attempted
    #[error("Not signed in: no access token available")]
    NoCredential,

    /// The session could not be kept alive and has been ended
    #[error("Unauthenticated, {0}")]
    Unauthorized(UnauthorizedReason),

    /// Server returned a non-success status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: Value },

    /// Server answered with success but the body could not be parsed
    #[error("Malformed response: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    /// Network or transport error
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Sign-in succeeded on the wire but did not carry tokens and a user
    #[error("Sign-in response did not include tokens")]
    MissingTokens,

    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Build an API error from a status and raw body text.
    ///
    /// JSON bodies are kept structured; anything else is carried as a string.
    pub fn from_status(status: reqwest::StatusCode, text: &str) -> Self {
        let body = serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));
        Self::Api {
            status: status.as_u16(),
            body,
        }
    }

    /// Whether this error ended the session
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(401),
            _ => None,
        }
    }

    /// The backend's `detail` message, when the error body carries one
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Api { body, .. } => body.get("detail").and_then(Value::as_str),
            _ => None,
        }
    }
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        Self::Configuration(err.to_string())
    }
}
