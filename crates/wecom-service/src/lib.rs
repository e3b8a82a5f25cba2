//! Token-guarded request client for the WeCom third-party service API
//!
//! Wraps every authenticated call in the same protocol: make sure a valid
//! access token is attached, dispatch, inspect the response envelope, and
//! on a token-expiry error code refresh the token and retry (bounded by a
//! per-call retry budget). Two clients share the mechanism:
//!
//! - `SuiteClient`: suite token, `suite_access_token` query parameter
//! - `ProviderClient`: provider token, `provider_access_token` query parameter
//!
//! Call lifecycle:
//! 1. `TokenStore::load()`; reuse the token if still valid, else issue one
//! 2. Merge default and per-call `RequestOptions`, sign the URL, send
//! 3. Status outside 200..=204 → `Error::Transport`
//! 4. `errcode` 40001/42001 with budget left → clear store, reissue, retry
//! 5. Any other `errcode` → `Error::Remote`

pub mod classify;
pub mod endpoints;
pub mod error;
pub mod guard;
pub mod metrics;
pub mod options;
pub mod provider;
pub mod suite;

#[cfg(test)]
mod test_support;

pub use classify::{ErrorClassification, classify_code};
pub use endpoints::{EndpointFn, Endpoints};
pub use error::{Error, Result};
pub use guard::{ClientConfig, TokenGuard, TokenIssuer};
pub use options::{HttpMethod, RequestOptions};
pub use provider::{PROVIDER_METHODS, ProviderClient};
pub use suite::{SUITE_METHODS, SuiteClient};
