//! Error types for guarded requests

/// Errors surfaced to callers of the request client.
///
/// `Transport` and `Remote` separate a delivery failure (HTTP status) from
/// an application-level rejection (envelope `errcode`).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("{url} returned status {status}")]
    Transport { url: String, status: u16 },

    #[error("remote API error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("token refresh failed: {0}")]
    TokenRefresh(#[source] wecom_auth::Error),

    #[error("token store error: {0}")]
    TokenStore(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("method already registered: {0}")]
    DuplicateMethod(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),
}

impl Error {
    /// Envelope error code, for `Remote` errors and refresh rejections.
    pub fn code(&self) -> Option<i64> {
        match self {
            Error::Remote { code, .. } => Some(*code),
            Error::TokenRefresh(wecom_auth::Error::Remote { code, .. }) => Some(*code),
            _ => None,
        }
    }

    /// HTTP status, for `Transport` errors and refresh transport failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => Some(*status),
            Error::TokenRefresh(wecom_auth::Error::Transport { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
