//! WeCom third-party service authentication library
//!
//! Provides the access token holder, pluggable token storage, token issuance
//! for suite and provider identities, response envelope parsing, and
//! authorization URL construction. The request client lives in
//! `wecom-service`; this crate has no knowledge of retries.
//!
//! Token flow:
//! 1. Client asks its `TokenStore` for the last known token via `load()`
//! 2. If absent or expired, `issue::issue_suite_token()` (or the provider variant) mints a new one
//! 3. The new token is mirrored through `TokenStore::save()`
//! 4. On an expiry error code the client calls `save(None)` and goes back to step 2

pub mod authorize;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod issue;
pub mod store;
pub mod token;

pub use authorize::{provider_authorization_url, suite_authorization_url};
pub use constants::*;
pub use envelope::{
    EnvelopeError, UNKNOWN_ERRCODE, envelope_error, is_accepted_status, parse_body,
};
pub use error::{Error, Result};
pub use issue::{
    ProviderCredentials, ProviderTokenResponse, SuiteCredentials, SuiteTokenResponse,
    issue_provider_token, issue_suite_token,
};
pub use store::{BoxFuture, FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{AccessToken, TokenScope, now_millis};
