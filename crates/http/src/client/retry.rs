//! Single-retry policy for authenticated requests

use reqwest::StatusCode;

/// Tracks whether the one permitted retry has been spent.
///
/// A fresh policy allows exactly one retry after a 401; once
/// [`mark_attempted`](Self::mark_attempted) is called every later status is
/// final.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempted: bool,
}

impl RetryPolicy {
    pub const fn new() -> Self {
        Self { attempted: false }
    }

    pub const fn attempted(&self) -> bool {
        self.attempted
    }

    /// Whether a response with `status` should trigger refresh-and-retry
    pub fn should_retry(&self, status: StatusCode) -> bool {
        !self.attempted && status == StatusCode::UNAUTHORIZED
    }

    pub fn mark_attempted(&mut self) {
        self.attempted = true;
    }
}
