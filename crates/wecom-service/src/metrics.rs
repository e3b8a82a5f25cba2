//! Client metrics
//!
//! - `wecom_token_refresh_total` (counter): labels `scope`, `outcome`
//! - `wecom_token_expired_retries_total` (counter): label `scope`
//! - `wecom_api_errors_total` (counter): label `kind`
//!
//! The library never installs a recorder; without one these are no-ops.

/// Record a token issuance attempt.
pub fn record_refresh(scope: &'static str, outcome: &'static str) {
    metrics::counter!("wecom_token_refresh_total", "scope" => scope, "outcome" => outcome)
        .increment(1);
}

/// Record a retry triggered by a token-expiry error code.
pub fn record_expired_retry(scope: &'static str) {
    metrics::counter!("wecom_token_expired_retries_total", "scope" => scope).increment(1);
}

/// Record a failed call by error kind (`http`, `transport`, `remote`, `response`).
pub fn record_api_error(kind: &'static str) {
    metrics::counter!("wecom_api_errors_total", "kind" => kind).increment(1);
}
