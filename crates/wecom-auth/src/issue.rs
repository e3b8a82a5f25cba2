//! Token issuance for suite and provider identities
//!
//! Both issuance endpoints are unauthenticated JSON POSTs relative to the
//! API prefix:
//! 1. `service/get_suite_token` with suite id, secret and the current ticket
//! 2. `service/get_provider_token` with corp id and provider secret
//!
//! Issuance never retries; the request client decides what to do with a
//! failure.

use std::sync::RwLock;

use common::Secret;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::constants::{PROVIDER_TOKEN_PATH, SUITE_TOKEN_PATH};
use crate::envelope::{envelope_error, is_accepted_status, parse_body};
use crate::error::{Error, Result};
use crate::token::AccessToken;

/// Suite (ISV) identity.
///
/// The ticket is pushed by the platform to the suite's callback URL every
/// ten minutes and rotates independently of the token, so it sits behind a
/// lock and can be replaced on a shared client.
#[derive(Debug)]
pub struct SuiteCredentials {
    suite_id: String,
    suite_secret: Secret<String>,
    suite_ticket: RwLock<Secret<String>>,
}

impl SuiteCredentials {
    pub fn new(
        suite_id: impl Into<String>,
        suite_secret: impl Into<Secret<String>>,
        suite_ticket: impl Into<Secret<String>>,
    ) -> Self {
        Self {
            suite_id: suite_id.into(),
            suite_secret: suite_secret.into(),
            suite_ticket: RwLock::new(suite_ticket.into()),
        }
    }

    pub fn suite_id(&self) -> &str {
        &self.suite_id
    }

    /// Replace the ticket used by the next issuance.
    pub fn set_suite_ticket(&self, ticket: impl Into<Secret<String>>) {
        let mut current = self
            .suite_ticket
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = ticket.into();
    }

    fn issue_body(&self) -> Value {
        let ticket = self
            .suite_ticket
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        json!({
            "suite_id": self.suite_id,
            "suite_secret": self.suite_secret.expose(),
            "suite_ticket": ticket.expose(),
        })
    }
}

/// Provider identity (corp id + provider secret).
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    corp_id: String,
    provider_secret: Secret<String>,
}

impl ProviderCredentials {
    pub fn new(corp_id: impl Into<String>, provider_secret: impl Into<Secret<String>>) -> Self {
        Self {
            corp_id: corp_id.into(),
            provider_secret: provider_secret.into(),
        }
    }

    pub fn corp_id(&self) -> &str {
        &self.corp_id
    }

    fn issue_body(&self) -> Value {
        json!({
            "corpid": self.corp_id,
            "provider_secret": self.provider_secret.expose(),
        })
    }
}

/// Response from `service/get_suite_token`.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Debug, Deserialize, Serialize)]
pub struct SuiteTokenResponse {
    pub suite_access_token: String,
    pub expires_in: u64,
}

/// Response from `service/get_provider_token`.
#[derive(Debug, Deserialize, Serialize)]
pub struct ProviderTokenResponse {
    pub provider_access_token: String,
    pub expires_in: u64,
}

/// Issue a suite access token.
pub async fn issue_suite_token(
    client: &reqwest::Client,
    prefix: &str,
    credentials: &SuiteCredentials,
) -> Result<AccessToken> {
    let url = format!("{prefix}{SUITE_TOKEN_PATH}");
    let data = post_issue(client, &url, &credentials.issue_body()).await?;
    let response: SuiteTokenResponse = serde_json::from_value(data)
        .map_err(|e| Error::InvalidResponse(format!("invalid suite token response: {e}")))?;
    debug!(
        suite_id = credentials.suite_id(),
        expires_in = response.expires_in,
        "suite token issued"
    );
    Ok(AccessToken::issued_now(
        response.suite_access_token,
        response.expires_in,
    ))
}

/// Issue a provider access token.
pub async fn issue_provider_token(
    client: &reqwest::Client,
    prefix: &str,
    credentials: &ProviderCredentials,
) -> Result<AccessToken> {
    let url = format!("{prefix}{PROVIDER_TOKEN_PATH}");
    let data = post_issue(client, &url, &credentials.issue_body()).await?;
    let response: ProviderTokenResponse = serde_json::from_value(data)
        .map_err(|e| Error::InvalidResponse(format!("invalid provider token response: {e}")))?;
    debug!(
        corp_id = credentials.corp_id(),
        expires_in = response.expires_in,
        "provider token issued"
    );
    Ok(AccessToken::issued_now(
        response.provider_access_token,
        response.expires_in,
    ))
}

/// POST an issuance body and return the envelope-checked payload.
async fn post_issue(client: &reqwest::Client, url: &str, body: &Value) -> Result<Value> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token issuance request failed: {e}")))?;

    let status = response.status().as_u16();
    if !is_accepted_status(status) {
        return Err(Error::Transport {
            url: url.to_string(),
            status,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("reading token issuance response: {e}")))?;
    let data = parse_body(url, &bytes)?;

    if let Some(err) = envelope_error(&data) {
        return Err(Error::Remote {
            code: err.code,
            message: err.message,
        });
    }
    Ok(data)
}
