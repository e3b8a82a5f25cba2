//! Token-guarded request dispatch
//!
//! `TokenGuard` owns the current token reference, the token store, and the
//! client-wide defaults. Per logical call it runs:
//!
//! ```text
//! load token ── valid ──────────────┐
//!      └─ absent/expired → issue ───┤
//!                                   ▼
//!                     sign URL, dispatch, check status
//!                                   │
//!            errcode 40001/42001, budget > 0, not externally managed
//!                 → save(None), issue, budget - 1, dispatch again
//!            other errcode → Error::Remote
//! ```
//!
//! There is no mutual exclusion around refresh: concurrent calls that both
//! see an expired token each issue a new one.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Url;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use wecom_auth::{
    API_PREFIX, AccessToken, BoxFuture, DEFAULT_RETRY_BUDGET, MemoryTokenStore, TokenScope,
    TokenStore, envelope_error, is_accepted_status, parse_body,
};

use crate::classify::{ErrorClassification, classify_code};
use crate::error::{Error, Result};
use crate::metrics;
use crate::options::RequestOptions;

/// Mints a new access token for one identity.
///
/// Uses `Pin<Box<dyn Future>>` so suite and provider issuers share one
/// guard implementation without an async-trait dependency.
pub trait TokenIssuer: Send + Sync {
    fn scope(&self) -> TokenScope;

    fn issue<'a>(
        &'a self,
        http: &'a reqwest::Client,
        prefix: &'a str,
    ) -> BoxFuture<'a, wecom_auth::Result<AccessToken>>;
}

/// Client-wide settings, fixed at construction.
#[derive(Clone)]
pub struct ClientConfig {
    prefix: String,
    defaults: RequestOptions,
    store: Arc<dyn TokenStore>,
    externally_managed: bool,
    retry_budget: u32,
    http: reqwest::Client,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            prefix: API_PREFIX.to_string(),
            defaults: RequestOptions::default(),
            store: Arc::new(MemoryTokenStore::new()),
            externally_managed: false,
            retry_budget: DEFAULT_RETRY_BUDGET,
            http: reqwest::Client::new(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// API prefix; a trailing slash is added when missing.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.prefix = prefix;
        self
    }

    pub fn with_defaults(mut self, defaults: RequestOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = store;
        self
    }

    /// The token is maintained outside this client; expiry error codes are
    /// returned to the caller instead of triggering a refresh.
    pub fn externally_managed(mut self, externally_managed: bool) -> Self {
        self.externally_managed = externally_managed;
        self
    }

    /// Retry budget used by the endpoint wrappers.
    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }
}

/// The shared request mechanism behind both clients.
pub struct TokenGuard<I> {
    issuer: I,
    config: ClientConfig,
    current: RwLock<Option<AccessToken>>,
}

impl<I: TokenIssuer> TokenGuard<I> {
    pub fn new(issuer: I, config: ClientConfig) -> Self {
        Self {
            issuer,
            config,
            current: RwLock::new(None),
        }
    }

    pub fn issuer(&self) -> &I {
        &self.issuer
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The token this client last used or issued, if any.
    pub async fn current_token(&self) -> Option<AccessToken> {
        self.current.read().await.clone()
    }

    /// Cached token if the store holds a valid one, otherwise a fresh one.
    pub async fn latest_token(&self) -> Result<AccessToken> {
        let stored = self
            .config
            .store
            .load()
            .await
            .map_err(|e| Error::TokenStore(e.to_string()))?;

        match stored {
            Some(token) if token.is_valid() => {
                *self.current.write().await = Some(token.clone());
                Ok(token)
            }
            _ => self.refresh_token().await,
        }
    }

    /// Issue a new token, make it current, and mirror it to the store.
    pub async fn refresh_token(&self) -> Result<AccessToken> {
        let scope = self.issuer.scope();
        let token = match self
            .issuer
            .issue(&self.config.http, &self.config.prefix)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                metrics::record_refresh(scope.label(), "error");
                warn!(scope = scope.label(), error = %e, "access token issuance failed");
                return Err(Error::TokenRefresh(e));
            }
        };

        *self.current.write().await = Some(token.clone());
        self.config
            .store
            .save(Some(token.clone()))
            .await
            .map_err(|e| Error::TokenStore(e.to_string()))?;

        metrics::record_refresh(scope.label(), "ok");
        info!(
            scope = scope.label(),
            expires_at = token.expires_at(),
            "access token refreshed"
        );
        Ok(token)
    }

    /// Perform a token-guarded call.
    ///
    /// `url` is either relative to the API prefix (`service/get_agent`) or
    /// absolute. Each expiry-triggered retry consumes one unit of
    /// `retry_budget`; once it is spent the expiry error is returned.
    pub async fn request(
        &self,
        url: &str,
        options: &RequestOptions,
        retry_budget: u32,
    ) -> Result<Value> {
        let scope = self.issuer.scope();
        let options = self.config.defaults.merged(options);
        let url = self.resolve_url(url)?;

        let mut token = self.latest_token().await?;
        let mut remaining = retry_budget;

        loop {
            let data = self.dispatch(&url, &options, &token).await?;

            let Some(err) = envelope_error(&data) else {
                return Ok(data);
            };

            let retryable = classify_code(err.code) == ErrorClassification::TokenExpired
                && remaining > 0
                && !self.config.externally_managed;

            if !retryable {
                metrics::record_api_error("remote");
                debug!(url = %url, code = err.code, "remote API error");
                return Err(Error::Remote {
                    code: err.code,
                    message: err.message,
                });
            }

            warn!(
                scope = scope.label(),
                url = %url,
                code = err.code,
                remaining,
                "access token rejected, refreshing and retrying"
            );
            metrics::record_expired_retry(scope.label());
            self.invalidate().await?;
            token = self.refresh_token().await?;
            remaining -= 1;
        }
    }

    /// Drop the current token locally and in the store.
    async fn invalidate(&self) -> Result<()> {
        *self.current.write().await = None;
        self.config
            .store
            .save(None)
            .await
            .map_err(|e| Error::TokenStore(e.to_string()))
    }

    fn resolve_url(&self, url: &str) -> Result<Url> {
        let full = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{}", self.config.prefix, url.trim_start_matches('/'))
        };
        Url::parse(&full).map_err(|e| Error::InvalidRequest(format!("invalid url {full}: {e}")))
    }

    /// Send one attempt and return the parsed body.
    async fn dispatch(
        &self,
        url: &Url,
        options: &RequestOptions,
        token: &AccessToken,
    ) -> Result<Value> {
        let param = self.issuer.scope().query_param();
        let signed = sign_url(url, param, token.value(), options.query.as_ref());
        let method = options.method();

        let mut builder = self
            .config
            .http
            .request(method.into(), signed)
            .headers(options.header_map());
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        // Log the unsigned URL; the signed one carries the token
        debug!(url = %url, method = method.as_str(), "dispatching request");

        let response = builder.send().await.map_err(|e| {
            metrics::record_api_error("http");
            Error::Http(format!("request to {url} failed: {e}"))
        })?;

        let status = response.status().as_u16();
        if !is_accepted_status(status) {
            metrics::record_api_error("transport");
            return Err(Error::Transport {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            metrics::record_api_error("http");
            Error::Http(format!("reading response from {url}: {e}"))
        })?;
        parse_body(url.as_str(), &bytes).map_err(|e| {
            metrics::record_api_error("response");
            Error::InvalidResponse(e.to_string())
        })
    }
}

/// Attach the token as `param`, replacing any value already in the URL.
///
/// `extra` query parameters replace same-named parameters from the URL.
fn sign_url(
    url: &Url,
    param: &str,
    token: &str,
    extra: Option<&BTreeMap<String, String>>,
) -> Url {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(name, _)| name != param && !extra.is_some_and(|e| e.contains_key(name)))
        .collect();
    if let Some(extra) = extra {
        pairs.extend(
            extra
                .iter()
                .filter(|(name, _)| name.as_str() != param)
                .map(|(name, value)| (name.clone(), value.clone())),
        );
    }
    pairs.push((param.to_string(), token.to_string()));

    let mut signed = url.clone();
    signed.query_pairs_mut().clear().extend_pairs(pairs);
    signed
}
