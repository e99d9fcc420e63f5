use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Partner credential together with the instant it stops being usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(value: String, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    /// usable iff now < expires_at, no grace window
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left until expiry, clamped to zero once `now` has passed it.
    pub fn ttl_at(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.is_usable_at(now) {
            TokenState::Valid
        } else {
            TokenState::Expired
        }
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// Lifecycle of the entry behind one cache key.
/// `Absent` and `Expired` both lead to a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    Absent,
    Valid,
    Expired,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Absent => "absent",
            TokenState::Valid => "valid",
            TokenState::Expired => "expired",
        }
    }
}
