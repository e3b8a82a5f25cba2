//! Response envelope parsing
//!
//! The platform answers HTTP 200 for most application failures and reports
//! them through `errcode`/`errmsg` fields in the JSON body. A missing
//! `errcode` or `errcode == 0` means success.

use serde_json::Value;

use crate::error::{Error, Result};

/// Application-level failure carried inside a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeError {
    pub code: i64,
    pub message: String,
}

/// Whether an HTTP status is accepted as a delivered response (200..=204).
pub fn is_accepted_status(status: u16) -> bool {
    (200..=204).contains(&status)
}

/// Code reported for an `errcode` that is set but not an integer.
pub const UNKNOWN_ERRCODE: i64 = -1;

/// Extract the envelope error, if any.
///
/// Numeric codes are the norm; string codes (`"42001"`) are tolerated. Any
/// other non-empty `errcode` is still a failure and maps to `UNKNOWN_ERRCODE`.
pub fn envelope_error(data: &Value) -> Option<EnvelopeError> {
    let code = match data.get("errcode")? {
        Value::Null | Value::Bool(false) => return None,
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(UNKNOWN_ERRCODE),
        Value::String(s) if s.trim().is_empty() => return None,
        Value::String(s) => s.trim().parse().unwrap_or(UNKNOWN_ERRCODE),
        _ => UNKNOWN_ERRCODE,
    };
    if code == 0 {
        return None;
    }
    let message = data
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(EnvelopeError { code, message })
}

/// Parse a response body as JSON. An empty body (e.g. 204) becomes `null`.
pub fn parse_body(url: &str, bytes: &[u8]) -> Result<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| Error::InvalidResponse(format!("{url} returned non-JSON body: {e}")))
}
