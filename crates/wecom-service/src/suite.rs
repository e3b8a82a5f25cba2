//! Suite (third-party application) client
//!
//! Every call carries `suite_access_token`. The suite ticket used to issue
//! that token rotates on its own schedule; feed new tickets in through
//! `set_suite_ticket` and the next issuance picks them up.

use common::Secret;
use serde_json::{Value, json};
use wecom_auth::{
    AccessToken, BoxFuture, SuiteCredentials, TokenScope, issue_suite_token,
    suite_authorization_url,
};

use crate::endpoints::Endpoints;
use crate::error::Result;
use crate::guard::{ClientConfig, TokenGuard, TokenIssuer};
use crate::options::RequestOptions;

/// Built-in method names; registered endpoints may not reuse them.
pub const SUITE_METHODS: &[&str] = &[
    "request",
    "latest_token",
    "refresh_token",
    "authorization_url",
    "set_suite_ticket",
    "get_pre_auth_code",
    "set_session_info",
    "get_permanent_code",
    "get_auth_info",
    "get_agent",
    "set_agent",
    "get_corp_token",
];

struct SuiteIssuer {
    credentials: SuiteCredentials,
}

impl TokenIssuer for SuiteIssuer {
    fn scope(&self) -> TokenScope {
        TokenScope::Suite
    }

    fn issue<'a>(
        &'a self,
        http: &'a reqwest::Client,
        prefix: &'a str,
    ) -> BoxFuture<'a, wecom_auth::Result<AccessToken>> {
        Box::pin(issue_suite_token(http, prefix, &self.credentials))
    }
}

pub struct SuiteClient {
    guard: TokenGuard<SuiteIssuer>,
    endpoints: Endpoints<SuiteClient>,
}

impl SuiteClient {
    pub fn new(credentials: SuiteCredentials, config: ClientConfig) -> Self {
        Self {
            guard: TokenGuard::new(SuiteIssuer { credentials }, config),
            endpoints: Endpoints::new(),
        }
    }

    pub fn suite_id(&self) -> &str {
        self.guard.issuer().credentials.suite_id()
    }

    pub fn config(&self) -> &ClientConfig {
        self.guard.config()
    }

    /// Replace the suite ticket used by the next issuance.
    pub fn set_suite_ticket(&self, ticket: impl Into<Secret<String>>) {
        self.guard.issuer().credentials.set_suite_ticket(ticket);
    }

    /// The token this client last used or issued, if any.
    pub async fn current_token(&self) -> Option<AccessToken> {
        self.guard.current_token().await
    }

    pub async fn latest_token(&self) -> Result<AccessToken> {
        self.guard.latest_token().await
    }

    pub async fn refresh_token(&self) -> Result<AccessToken> {
        self.guard.refresh_token().await
    }

    /// Token-guarded call to `url` (relative to the API prefix, or absolute).
    pub async fn request(
        &self,
        url: &str,
        options: &RequestOptions,
        retry_budget: u32,
    ) -> Result<Value> {
        self.guard.request(url, options, retry_budget).await
    }

    /// Login page URL that starts the installation flow for `pre_auth_code`.
    pub fn authorization_url(&self, pre_auth_code: &str, redirect_uri: &str, state: &str) -> String {
        suite_authorization_url(self.suite_id(), pre_auth_code, redirect_uri, state)
    }

    /// `service/get_pre_auth_code`; `appids` limits which suite apps may be installed.
    pub async fn get_pre_auth_code(&self, appids: Option<&[u32]>) -> Result<Value> {
        let mut body = json!({ "suite_id": self.suite_id() });
        if let Some(appids) = appids {
            body["appid"] = json!(appids);
        }
        self.post("service/get_pre_auth_code", body).await
    }

    /// `service/set_session_info`
    pub async fn set_session_info(&self, pre_auth_code: &str, appids: &[u32]) -> Result<Value> {
        self.post(
            "service/set_session_info",
            json!({
                "pre_auth_code": pre_auth_code,
                "session_info": { "appid": appids },
            }),
        )
        .await
    }

    /// `service/get_permanent_code`: exchange a temporary auth code.
    pub async fn get_permanent_code(&self, auth_code: &str) -> Result<Value> {
        self.post(
            "service/get_permanent_code",
            json!({ "suite_id": self.suite_id(), "auth_code": auth_code }),
        )
        .await
    }

    /// `service/get_auth_info`
    pub async fn get_auth_info(&self, auth_corpid: &str, permanent_code: &str) -> Result<Value> {
        self.post("service/get_auth_info", self.corp_body(auth_corpid, permanent_code))
            .await
    }

    /// `service/get_agent`
    pub async fn get_agent(
        &self,
        auth_corpid: &str,
        permanent_code: &str,
        agentid: u32,
    ) -> Result<Value> {
        let mut body = self.corp_body(auth_corpid, permanent_code);
        body["agentid"] = json!(agentid);
        self.post("service/get_agent", body).await
    }

    /// `service/set_agent`; `agent` is sent as given.
    pub async fn set_agent(
        &self,
        auth_corpid: &str,
        permanent_code: &str,
        agent: Value,
    ) -> Result<Value> {
        let mut body = self.corp_body(auth_corpid, permanent_code);
        body["agent"] = agent;
        self.post("service/set_agent", body).await
    }

    /// `service/get_corp_token`: access token for an authorizing corporation.
    pub async fn get_corp_token(&self, auth_corpid: &str, permanent_code: &str) -> Result<Value> {
        self.post("service/get_corp_token", self.corp_body(auth_corpid, permanent_code))
            .await
    }

    /// Register extra endpoints. Fails without changes on any name collision.
    pub fn extend(&mut self, endpoints: Endpoints<SuiteClient>) -> Result<()> {
        self.endpoints.merge(endpoints, SUITE_METHODS)
    }

    /// Invoke a registered endpoint by name.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        self.endpoints.call(self, name, args).await
    }

    pub fn endpoints(&self) -> &Endpoints<SuiteClient> {
        &self.endpoints
    }

    fn corp_body(&self, auth_corpid: &str, permanent_code: &str) -> Value {
        json!({
            "suite_id": self.suite_id(),
            "auth_corpid": auth_corpid,
            "permanent_code": permanent_code,
        })
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let budget = self.config().retry_budget();
        self.request(path, &RequestOptions::post_json(body), budget)
            .await
    }
}
