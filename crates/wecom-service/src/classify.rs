//! Envelope error classification
//!
//! Only token-expiry codes are recoverable, and only by refreshing the token.
//! Every other code is an application-level rejection the caller must see.

use wecom_auth::TOKEN_EXPIRED_CODES;

/// What the request client should do with an envelope error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// Token invalid or expired: clear the store, reissue, retry
    TokenExpired,
    /// Surface to the caller as `Error::Remote`
    Terminal,
}

/// Classify an envelope error code.
pub fn classify_code(code: i64) -> ErrorClassification {
    if TOKEN_EXPIRED_CODES.contains(&code) {
        ErrorClassification::TokenExpired
    } else {
        ErrorClassification::Terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_credential_is_token_expired() {
        assert_eq!(classify_code(40001), ErrorClassification::TokenExpired);
    }

    #[test]
    fn access_token_expired_is_token_expired() {
        assert_eq!(classify_code(42001), ErrorClassification::TokenExpired);
    }

    #[test]
    fn other_codes_are_terminal() {
        for code in [-1, 1, 40013, 40014, 40082, 40085, 48002, 60011] {
            assert_eq!(
                classify_code(code),
                ErrorClassification::Terminal,
                "code {code} must not trigger a refresh"
            );
        }
    }
}
