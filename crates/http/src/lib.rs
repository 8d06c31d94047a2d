//! Panel HTTP session client
//!
//! Wraps the admin panel REST API: signs in with a password, keeps the
//! issued tokens in a [`panel_core::SessionStores`] strategy, attaches the
//! access token to requests and refreshes it once when it expires.

pub mod client;
pub mod types;

pub use client::error::{ClientError, UnauthorizedReason};
pub use client::retry::RetryPolicy;
pub use client::{RequestOptions, SessionClient, SessionClientBuilder};
pub use types::SignInRequest;
