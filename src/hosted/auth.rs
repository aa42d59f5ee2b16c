//! Bearer credential handling for hosted requests.
//!
//! The host accepts the token in two places and some deployments only read
//! one of them, so every authenticated request carries both.

use reqwest::{Client, RequestBuilder};

use crate::config::endpoints::{TOKEN_HEADER, VERIFY_PATH};
use crate::config::BridgeConfig;
use crate::core::LOG_TARGET;
use crate::token_store::normalize_token;

/// Attach `authorization: Bearer <token>` and `x-symphony-token: <token>`.
pub(crate) fn with_bearer(builder: RequestBuilder, token: &str) -> RequestBuilder {
    builder.bearer_auth(token).header(TOKEN_HEADER, token)
}

/// `true` only when the host answers the verification endpoint with 2xx.
/// Blank candidates are rejected without a request.
pub(crate) async fn verify_token(http: &Client, config: &BridgeConfig, candidate: &str) -> bool {
    let Some(token) = normalize_token(Some(candidate)) else {
        return false;
    };
    let request = with_bearer(http.get(config.endpoint(VERIFY_PATH)), &token);
    match request.send().await {
        Ok(resp) => {
            let status = resp.status();
            if !status.is_success() {
                tracing::info!(target = LOG_TARGET, status = status.as_u16(), "token rejected by host");
            }
            status.is_success()
        }
        Err(err) => {
            tracing::warn!(target = LOG_TARGET, error = %err, "token verification request failed");
            false
        }
    }
}
