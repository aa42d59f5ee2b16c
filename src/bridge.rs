//! The bridge facade application code talks to.
//!
//! [`HostBridge`] owns one [`BridgeRuntime`] strategy chosen at construction
//! and forwards every call to it. Everything a runtime keeps (token cache,
//! handler map, push connection) lives inside that runtime, so independent
//! bridges never share state.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::config::BridgeConfig;
use crate::core::LOG_TARGET;
use crate::embedded::{EmbeddedHost, EmbeddedRuntime};
use crate::error::{BridgeError, Result};
use crate::events::{BridgeEvent, EventHandler, Unlisten};
use crate::hosted::HostedRuntime;
use crate::runtime::{embedded_host, is_embedded_runtime, RuntimeMode};
use crate::token_store::{FileTokenStorage, TokenStorage};

/// One way of reaching the host. Implemented by [`EmbeddedRuntime`] and
/// [`HostedRuntime`].
#[async_trait]
pub trait BridgeRuntime: Send + Sync {
    fn mode(&self) -> RuntimeMode;

    async fn invoke(&self, command: &str, args: Value) -> Result<Value>;

    async fn listen(&self, event: &str, handler: EventHandler) -> Result<Unlisten>;

    async fn get_version(&self) -> Result<String>;

    async fn open_url(&self, url: &str) -> Result<()>;

    async fn open_path(&self, path: &str) -> Result<()>;

    fn get_token(&self) -> Option<String>;

    fn set_token(&self, token: Option<&str>);

    /// Never fails: transport or parse problems count as "not valid".
    async fn verify_token(&self, candidate: &str) -> bool;
}

#[derive(Clone)]
pub struct HostBridge {
    runtime: Arc<dyn BridgeRuntime>,
}

impl HostBridge {
    pub fn with_runtime(runtime: Arc<dyn BridgeRuntime>) -> Self {
        Self { runtime }
    }

    pub fn embedded(host: Arc<dyn EmbeddedHost>) -> Self {
        Self::with_runtime(Arc::new(EmbeddedRuntime::new(host)))
    }

    pub fn hosted(config: BridgeConfig, storage: Arc<dyn TokenStorage>) -> Result<Self> {
        Ok(Self::with_runtime(Arc::new(HostedRuntime::new(
            config, storage,
        )?)))
    }

    /// Pick the runtime for this process: the installed embedded host when
    /// the process runs inside the native shell, otherwise hosted mode with
    /// `config` and the token file under its data directory.
    pub fn from_environment(config: BridgeConfig) -> Result<Self> {
        if is_embedded_runtime() {
            let host = embedded_host().ok_or(BridgeError::EmbeddedHostMissing)?;
            return Ok(Self::embedded(host));
        }
        let storage = Arc::new(FileTokenStorage::in_dir(&config.data_dir));
        Self::hosted(config, storage)
    }

    pub fn mode(&self) -> RuntimeMode {
        self.runtime.mode()
    }

    /// Run `command` on the host and return its JSON result.
    pub async fn invoke(&self, command: &str, args: Value) -> Result<Value> {
        self.runtime.invoke(command, args).await
    }

    /// [`invoke`](Self::invoke) with typed arguments and result.
    pub async fn invoke_as<T, A>(&self, command: &str, args: &A) -> Result<T>
    where
        T: DeserializeOwned,
        A: Serialize + ?Sized,
    {
        let args = serde_json::to_value(args).map_err(|source| BridgeError::EncodeArgs {
            command: command.to_string(),
            source,
        })?;
        let value = self.invoke(command, args).await?;
        serde_json::from_value(value).map_err(|source| BridgeError::DecodeResult {
            command: command.to_string(),
            source,
        })
    }

    /// Call `handler` for every `event` pushed by the host until the returned
    /// handle is unlistened.
    ///
    /// In hosted mode the push stream is spawned onto the current tokio
    /// runtime; polled outside one, this fails with
    /// [`BridgeError::RuntimeUnavailable`].
    pub async fn listen<F>(&self, event: &str, handler: F) -> Result<Unlisten>
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        self.runtime.listen(event, Arc::new(handler)).await
    }

    /// [`listen`](Self::listen) with the payload decoded to `T`. Payloads that
    /// do not decode are logged and skipped.
    pub async fn listen_as<T, F>(&self, event: &str, handler: F) -> Result<Unlisten>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.listen(event, move |message: &BridgeEvent| {
            match message.payload_as::<T>() {
                Ok(payload) => handler(payload),
                Err(err) => {
                    tracing::warn!(target = LOG_TARGET, event = %message.event, error = %err, "event payload did not match expected shape");
                }
            }
        })
        .await
    }

    pub async fn get_version(&self) -> Result<String> {
        self.runtime.get_version().await
    }

    pub async fn open_url(&self, url: &str) -> Result<()> {
        self.runtime.open_url(url).await
    }

    pub async fn open_path(&self, path: &str) -> Result<()> {
        self.runtime.open_path(path).await
    }

    /// Hosted token, if one is stored. Always `None` in embedded mode.
    pub fn get_token(&self) -> Option<String> {
        self.runtime.get_token()
    }

    /// Store (or clear) the hosted token. Any open push stream is closed; the
    /// next `listen` reconnects with the new credential.
    pub fn set_token(&self, token: Option<&str>) {
        self.runtime.set_token(token)
    }

    pub async fn verify_token(&self, candidate: &str) -> bool {
        self.runtime.verify_token(candidate).await
    }
}
