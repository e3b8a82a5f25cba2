//! Access token holder
//!
//! A token is an opaque string plus an absolute expiry in unix milliseconds.
//! It is never mutated: a refresh produces a new `AccessToken` that replaces
//! the old one wherever it was held.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::EXPIRY_MARGIN_SECS;

/// Which identity a token belongs to.
///
/// Decides the query parameter the token travels in and labels logs and
/// metrics. Both scopes share the same `AccessToken` shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Suite,
    Provider,
}

impl TokenScope {
    /// Query parameter carrying the token on authenticated calls.
    pub fn query_param(self) -> &'static str {
        match self {
            TokenScope::Suite => "suite_access_token",
            TokenScope::Provider => "provider_access_token",
        }
    }

    /// Short label for logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            TokenScope::Suite => "suite",
            TokenScope::Provider => "provider",
        }
    }
}

/// Short-lived bearer credential.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    value: String,
    expires_at: u64,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: u64) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Build a token from an issuance response received at `now`.
    ///
    /// The expiry is pulled in by `EXPIRY_MARGIN_SECS`; a TTL shorter than
    /// the margin yields a token that is already expired.
    pub fn issued_at(value: impl Into<String>, ttl_secs: u64, now: u64) -> Self {
        let lifetime_millis = ttl_secs
            .saturating_sub(EXPIRY_MARGIN_SECS)
            .saturating_mul(1000);
        Self::new(value, now.saturating_add(lifetime_millis))
    }

    /// Build a token from an issuance response received just now.
    pub fn issued_now(value: impl Into<String>, ttl_secs: u64) -> Self {
        Self::issued_at(value, ttl_secs, now_millis())
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Whether the token can still be attached to a request.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(now_millis())
    }

    /// Validity against an explicit clock reading (unix millis).
    pub fn is_valid_at(&self, now: u64) -> bool {
        !self.value.is_empty() && now < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
