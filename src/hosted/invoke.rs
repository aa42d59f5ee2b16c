use reqwest::Client;
use serde_json::Value;

use super::auth::with_bearer;
use crate::commands::{CommandInvocation, InvokeResponse};
use crate::config::endpoints::INVOKE_PATH;
use crate::config::BridgeConfig;
use crate::core::LOG_TARGET;
use crate::error::{BridgeError, Result};

/// One command, one `POST /api/invoke`. No retry, no timeout.
pub(crate) struct CommandChannel {
    http: Client,
    url: String,
}

impl CommandChannel {
    pub(crate) fn new(http: Client, config: &BridgeConfig) -> Self {
        Self {
            http,
            url: config.endpoint(INVOKE_PATH),
        }
    }

    pub(crate) async fn invoke(&self, token: &str, command: &str, args: Value) -> Result<Value> {
        let body = CommandInvocation::new(command, args);
        let resp = with_bearer(self.http.post(&self.url), token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::debug!(target = LOG_TARGET, command, status = status.as_u16(), "invoke rejected by host");
            return Err(BridgeError::http_status(
                status.as_u16(),
                server_error_message(&text),
            ));
        }

        let text = resp.text().await?;
        let envelope: InvokeResponse = serde_json::from_str(&text)
            .map_err(|e| BridgeError::InvalidResponse(format!("{command}: {e}")))?;
        envelope.into_result(command)
    }
}

/// Error text from a non-2xx body shaped like the invoke envelope.
fn server_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<InvokeResponse>(body)
        .ok()
        .and_then(|envelope| envelope.error)
}
