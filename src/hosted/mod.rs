//! Hosted mode: the bridge talks to a remote host over HTTP and SSE.
//!
//! Commands go through [`invoke::CommandChannel`], push events through
//! [`push::EventChannel`]; both authenticate with the token held by the
//! runtime's [`TokenStore`].

pub(crate) mod auth;
pub(crate) mod invoke;
pub(crate) mod push;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::bridge::BridgeRuntime;
use crate::commands::OPEN_IN_FILE_MANAGER;
use crate::config::endpoints::{HEALTH_PATH, HOSTED_VERSION_PLACEHOLDER};
use crate::config::BridgeConfig;
use crate::core::{user_agent, LOG_TARGET};
use crate::error::Result;
use crate::events::{EventHandler, Unlisten};
use crate::opener;
use crate::runtime::RuntimeMode;
use crate::token_store::{TokenStorage, TokenStore};

use invoke::CommandChannel;
use push::EventChannel;

#[derive(Debug, Deserialize)]
struct HealthBody {
    #[serde(default)]
    version: Option<String>,
}

pub struct HostedRuntime {
    config: BridgeConfig,
    http: Client,
    tokens: TokenStore,
    commands: CommandChannel,
    events: EventChannel,
}

impl HostedRuntime {
    pub fn new(config: BridgeConfig, storage: Arc<dyn TokenStorage>) -> Result<Self> {
        // No request timeout: the push stream is long-lived and callers own
        // timeout policy for commands.
        let http = Client::builder().user_agent(user_agent()).build()?;
        Ok(Self {
            commands: CommandChannel::new(http.clone(), &config),
            events: EventChannel::new(http.clone(), config.clone()),
            tokens: TokenStore::new(storage),
            http,
            config,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Whether a push stream is currently open.
    pub fn has_push_connection(&self) -> bool {
        self.events.has_connection()
    }

    /// Handlers currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.events.registry().handler_count(event)
    }

    async fn probe_version(&self, token: &str) -> Option<String> {
        let request = auth::with_bearer(self.http.get(self.config.endpoint(HEALTH_PATH)), token);
        let resp = match request.send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::debug!(target = LOG_TARGET, status = resp.status().as_u16(), "health probe refused");
                return None;
            }
            Err(err) => {
                tracing::debug!(target = LOG_TARGET, error = %err, "health probe failed");
                return None;
            }
        };
        resp.json::<HealthBody>()
            .await
            .ok()
            .and_then(|body| body.version)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

#[async_trait]
impl BridgeRuntime for HostedRuntime {
    fn mode(&self) -> RuntimeMode {
        RuntimeMode::Hosted
    }

    async fn invoke(&self, command: &str, args: Value) -> Result<Value> {
        let token = self.tokens.require_token()?;
        self.commands.invoke(&token, command, args).await
    }

    async fn listen(&self, event: &str, handler: EventHandler) -> Result<Unlisten> {
        self.events.listen(&self.tokens, event, handler)
    }

    async fn get_version(&self) -> Result<String> {
        let Some(token) = self.tokens.get_token() else {
            return Ok(HOSTED_VERSION_PLACEHOLDER.to_string());
        };
        Ok(self
            .probe_version(&token)
            .await
            .unwrap_or_else(|| HOSTED_VERSION_PLACEHOLDER.to_string()))
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        opener::open_url(url)
    }

    async fn open_path(&self, path: &str) -> Result<()> {
        // The file manager belongs to the host machine; ask the host to open it.
        self.invoke(OPEN_IN_FILE_MANAGER, json!({ "path": path }))
            .await
            .map(|_| ())
    }

    fn get_token(&self) -> Option<String> {
        self.tokens.get_token()
    }

    fn set_token(&self, token: Option<&str>) {
        self.events.replace_token(&self.tokens, token);
    }

    async fn verify_token(&self, candidate: &str) -> bool {
        auth::verify_token(&self.http, &self.config, candidate).await
    }
}
