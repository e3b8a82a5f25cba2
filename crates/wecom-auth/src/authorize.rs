//! Authorization page URLs
//!
//! The admin of an authorizing corporation is sent to the platform login
//! page, which redirects back to `redirect_uri` with an auth code and the
//! opaque `state` value unchanged. Inputs are interpolated as given; callers
//! pass an already-encoded `redirect_uri`.

use crate::constants::LOGIN_PAGE;

/// Login page URL for the suite authorization flow.
pub fn suite_authorization_url(
    suite_id: &str,
    pre_auth_code: &str,
    redirect_uri: &str,
    state: &str,
) -> String {
    format!(
        "{LOGIN_PAGE}?suite_id={suite_id}&pre_auth_code={pre_auth_code}&redirect_uri={redirect_uri}&state={state}"
    )
}

/// Login page URL for the provider (corp login) flow.
pub fn provider_authorization_url(corp_id: &str, redirect_uri: &str, state: &str) -> String {
    format!("{LOGIN_PAGE}?corp_id={corp_id}&redirect_uri={redirect_uri}&state={state}")
}
