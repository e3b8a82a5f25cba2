//! Provider (service vendor) client
//!
//! Signs calls with `provider_access_token`, issued from the vendor's corp
//! id and provider secret. Used for the web login flow.

use serde_json::{Value, json};
use wecom_auth::{
    AccessToken, BoxFuture, ProviderCredentials, TokenScope, issue_provider_token,
    provider_authorization_url,
};

use crate::endpoints::Endpoints;
use crate::error::Result;
use crate::guard::{ClientConfig, TokenGuard, TokenIssuer};
use crate::options::RequestOptions;

/// Built-in method names; registered endpoints may not reuse them.
pub const PROVIDER_METHODS: &[&str] = &[
    "request",
    "latest_token",
    "refresh_token",
    "authorization_url",
    "get_login_info",
];

struct ProviderIssuer {
    credentials: ProviderCredentials,
}

impl TokenIssuer for ProviderIssuer {
    fn scope(&self) -> TokenScope {
        TokenScope::Provider
    }

    fn issue<'a>(
        &'a self,
        http: &'a reqwest::Client,
        prefix: &'a str,
    ) -> BoxFuture<'a, wecom_auth::Result<AccessToken>> {
        Box::pin(issue_provider_token(http, prefix, &self.credentials))
    }
}

pub struct ProviderClient {
    guard: TokenGuard<ProviderIssuer>,
    endpoints: Endpoints<ProviderClient>,
}

impl ProviderClient {
    pub fn new(credentials: ProviderCredentials, config: ClientConfig) -> Self {
        Self {
            guard: TokenGuard::new(ProviderIssuer { credentials }, config),
            endpoints: Endpoints::new(),
        }
    }

    pub fn corp_id(&self) -> &str {
        self.guard.issuer().credentials.corp_id()
    }

    pub fn config(&self) -> &ClientConfig {
        self.guard.config()
    }

    pub async fn current_token(&self) -> Option<AccessToken> {
        self.guard.current_token().await
    }

    pub async fn latest_token(&self) -> Result<AccessToken> {
        self.guard.latest_token().await
    }

    pub async fn refresh_token(&self) -> Result<AccessToken> {
        self.guard.refresh_token().await
    }

    pub async fn request(
        &self,
        url: &str,
        options: &RequestOptions,
        retry_budget: u32,
    ) -> Result<Value> {
        self.guard.request(url, options, retry_budget).await
    }

    /// Login page URL for signing in with a WeCom account.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        provider_authorization_url(self.corp_id(), redirect_uri, state)
    }

    /// `service/get_login_info`: resolve the auth code from the login redirect.
    pub async fn get_login_info(&self, auth_code: &str) -> Result<Value> {
        let budget = self.config().retry_budget();
        self.request(
            "service/get_login_info",
            &RequestOptions::post_json(json!({ "auth_code": auth_code })),
            budget,
        )
        .await
    }

    pub fn extend(&mut self, endpoints: Endpoints<ProviderClient>) -> Result<()> {
        self.endpoints.merge(endpoints, PROVIDER_METHODS)
    }

    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        self.endpoints.call(self, name, args).await
    }

    pub fn endpoints(&self) -> &Endpoints<ProviderClient> {
        &self.endpoints
    }
}
