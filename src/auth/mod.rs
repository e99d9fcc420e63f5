//! Remote login collaborators for the token cache.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub mod partner;

/// Fresh credential returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self { value: value.into(), expires_at }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("login endpoint answered HTTP {0}")]
    Status(http::StatusCode),

    #[error("login rejected with status {status_code}: {message}")]
    Rejected { status_code: i64, message: String },

    #[error("malformed login response: {0}")]
    MalformedResponse(String),

    #[error("login timed out after {0:?}")]
    TimedOut(Duration),
}

/// Performs the remote login. Only called when no valid cached token
/// exists; redundant calls must be harmless.
pub trait AuthClient: Send + Sync {
    fn login(&self) -> impl Future<Output = Result<IssuedToken, AuthError>> + Send;
}
