//! Mock platform server and test doubles shared by the client tests

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use wecom_auth::{AccessToken, BoxFuture, MemoryTokenStore, TokenScope, TokenStore};

use crate::guard::TokenIssuer;

/// A request the mock platform received (issuance calls excluded).
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Value,
}

/// Scripted stand-in for the platform API.
///
/// Issuance endpoints mint `T1, T2, ...` (suite) or `P1, P2, ...`
/// (provider) with a 7200s TTL. Every other path pops the next scripted
/// reply, or answers `{"errcode":0,"errmsg":"ok"}` when the script is empty.
pub(crate) struct MockPlatform {
    issued: AtomicUsize,
    issue_failure: Mutex<Option<(StatusCode, Value)>>,
    issue_bodies: Mutex<Vec<Value>>,
    script: Mutex<VecDeque<(StatusCode, Value)>>,
    calls: Mutex<Vec<Recorded>>,
    reply_delay: Mutex<Option<Duration>>,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            issued: AtomicUsize::new(0),
            issue_failure: Mutex::new(None),
            issue_bodies: Mutex::new(vec![]),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(vec![]),
            reply_delay: Mutex::new(None),
        })
    }

    /// Hold every non-issuance reply for `delay` after recording the call.
    pub fn delay_replies(&self, delay: Duration) {
        *self.reply_delay.lock().unwrap() = Some(delay);
    }

    pub fn push_reply(&self, status: StatusCode, body: Value) {
        self.script.lock().unwrap().push_back((status, body));
    }

    /// Make every issuance call answer with this reply.
    pub fn fail_issuance(&self, status: StatusCode, body: Value) {
        *self.issue_failure.lock().unwrap() = Some((status, body));
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn issue_bodies(&self) -> Vec<Value> {
        self.issue_bodies.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }
}

async fn handle(
    State(mock): State<Arc<MockPlatform>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let path = uri.path().to_string();

    let token_field = match path.as_str() {
        "/cgi-bin/service/get_suite_token" => Some(("suite_access_token", "T")),
        "/cgi-bin/service/get_provider_token" => Some(("provider_access_token", "P")),
        _ => None,
    };
    if let Some((field, prefix)) = token_field {
        mock.issue_bodies.lock().unwrap().push(body);
        if let Some((status, reply)) = mock.issue_failure.lock().unwrap().clone() {
            return (status, Json(reply));
        }
        let n = mock.issued.fetch_add(1, Ordering::SeqCst) + 1;
        return (
            StatusCode::OK,
            Json(json!({ field: format!("{prefix}{n}"), "expires_in": 7200 })),
        );
    }

    let query = reqwest::Url::parse(&format!("http://mock{uri}"))
        .map(|url| url.query_pairs().into_owned().collect())
        .unwrap_or_default();
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                value.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();
    mock.calls.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path,
        query,
        headers,
        body,
    });

    let delay = *mock.reply_delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let (status, reply) = mock
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::OK, json!({"errcode": 0, "errmsg": "ok"})));
    (status, Json(reply))
}

/// Start the mock platform; returns the API prefix (`http://addr/cgi-bin/`).
pub(crate) async fn start_platform(mock: Arc<MockPlatform>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = axum::Router::new().fallback(handle).with_state(mock);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/cgi-bin/")
}

/// Issuer that mints tokens locally and counts issuances.
pub(crate) struct CountingIssuer {
    scope: TokenScope,
    issued: AtomicUsize,
    fail: bool,
}

impl CountingIssuer {
    pub fn new(scope: TokenScope) -> Self {
        Self {
            scope,
            issued: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing(scope: TokenScope) -> Self {
        Self {
            fail: true,
            ..Self::new(scope)
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl TokenIssuer for CountingIssuer {
    fn scope(&self) -> TokenScope {
        self.scope
    }

    fn issue<'a>(
        &'a self,
        _http: &'a reqwest::Client,
        _prefix: &'a str,
    ) -> BoxFuture<'a, wecom_auth::Result<AccessToken>> {
        Box::pin(async move {
            if self.fail {
                return Err(wecom_auth::Error::Remote {
                    code: 40085,
                    message: "invalid suite_ticket".into(),
                });
            }
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            let prefix = match self.scope {
                TokenScope::Suite => "T",
                TokenScope::Provider => "P",
            };
            Ok(AccessToken::issued_now(format!("{prefix}{n}"), 7200))
        })
    }
}

/// Memory store that counts saves and clears.
pub(crate) struct SpyStore {
    inner: MemoryTokenStore,
    saves: AtomicUsize,
    clears: AtomicUsize,
    fail_loads: AtomicBool,
}

impl SpyStore {
    pub fn holding(token: Option<AccessToken>) -> Arc<Self> {
        let mut inner = MemoryTokenStore::with_production_warning(false);
        if let Some(token) = token {
            inner = inner.with_token(token);
        }
        Arc::new(Self {
            inner,
            saves: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            fail_loads: AtomicBool::new(false),
        })
    }

    pub fn fail_loads(&self) {
        self.fail_loads.store(true, Ordering::SeqCst);
    }

    /// Saves of `Some(token)`.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Saves of `None`.
    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub async fn token(&self) -> Option<AccessToken> {
        self.inner.load().await.ok().flatten()
    }
}

impl TokenStore for SpyStore {
    fn load(&self) -> BoxFuture<'_, wecom_auth::Result<Option<AccessToken>>> {
        Box::pin(async move {
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(wecom_auth::Error::Io("token backend unavailable".into()));
            }
            self.inner.load().await
        })
    }

    fn save(&self, token: Option<AccessToken>) -> BoxFuture<'_, wecom_auth::Result<()>> {
        Box::pin(async move {
            match token {
                Some(_) => self.saves.fetch_add(1, Ordering::SeqCst),
                None => self.clears.fetch_add(1, Ordering::SeqCst),
            };
            self.inner.save(token).await
        })
    }
}
