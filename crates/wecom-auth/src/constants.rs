//! WeCom platform constants
//!
//! Endpoint paths are relative to `API_PREFIX` (or whatever prefix the
//! client was built with, e.g. a mock server in tests).

/// Default API prefix for all server-side calls.
pub const API_PREFIX: &str = "https://qyapi.weixin.qq.com/cgi-bin/";

/// Browser login page used for third-party authorization.
pub const LOGIN_PAGE: &str = "https://qy.weixin.qq.com/cgi-bin/loginpage";

/// Suite token issuance endpoint.
pub const SUITE_TOKEN_PATH: &str = "service/get_suite_token";

/// Provider token issuance endpoint.
pub const PROVIDER_TOKEN_PATH: &str = "service/get_provider_token";

/// Seconds subtracted from the server-reported TTL so a token is retired
/// before the platform starts rejecting it.
pub const EXPIRY_MARGIN_SECS: u64 = 10;

/// Envelope error codes meaning "access token invalid or expired".
///
/// 40001: invalid credential, 42001: access token expired.
pub const TOKEN_EXPIRED_CODES: &[i64] = &[40001, 42001];

/// Retry budget for a top-level request when none is given.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Environment variable that marks a production deployment.
pub const ENVIRONMENT_VAR: &str = "WECOM_ENV";
