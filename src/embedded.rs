//! Embedded mode: the bridge talks to the native host in-process.
//!
//! [`EmbeddedHost`] is the primitive the shell provides (direct command call,
//! direct event subscription). [`InProcessHost`] is a ready-made host backed
//! by a command registry and the shared [`HandlerRegistry`]; shells register
//! their command handlers on it and emit events through it.

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::bridge::BridgeRuntime;
use crate::commands::embedded_args;
use crate::core::LOG_TARGET;
use crate::error::{BridgeError, Result};
use crate::events::{subscribe, EventHandler, HandlerRegistry, Unlisten};
use crate::opener;
use crate::runtime::RuntimeMode;

/// Direct call/event primitive exposed by the native shell.
#[async_trait]
pub trait EmbeddedHost: Send + Sync {
    /// Run a command. `args` is absent when the caller passed anything other
    /// than a JSON object.
    async fn invoke(&self, command: &str, args: Option<Map<String, Value>>)
        -> std::result::Result<Value, String>;

    fn listen(&self, event: &str, handler: EventHandler) -> Unlisten;

    async fn app_version(&self) -> std::result::Result<String, String>;

    async fn open_url(&self, url: &str) -> std::result::Result<(), String>;

    /// Reveal `path` in the platform file manager.
    async fn open_path(&self, path: &str) -> std::result::Result<(), String>;
}

pub type CommandFuture = BoxFuture<'static, std::result::Result<Value, String>>;
type CommandFn = Arc<dyn Fn(Option<Map<String, Value>>) -> CommandFuture + Send + Sync>;

pub struct InProcessHost {
    version: String,
    commands: RwLock<HashMap<String, CommandFn>>,
    events: Arc<HandlerRegistry>,
}

impl InProcessHost {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            commands: RwLock::new(HashMap::new()),
            events: Arc::new(HandlerRegistry::new()),
        }
    }

    pub fn register_command<F, Fut>(&self, name: &str, handler: F) -> &Self
    where
        F: Fn(Option<Map<String, Value>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, String>> + Send + 'static,
    {
        let boxed: CommandFn = Arc::new(move |args| Box::pin(handler(args)));
        self.commands.write().insert(name.to_string(), boxed);
        self
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.read().contains_key(name)
    }

    /// Deliver `payload` to every listener of `event`, synchronously. Returns
    /// how many handlers ran.
    pub fn emit<T: Serialize>(&self, event: &str, payload: T) -> usize {
        // Shell event names may not contain dots; callers may use either form.
        let name = if event.contains('.') {
            event.replace('.', "-")
        } else {
            event.to_string()
        };
        match serde_json::to_value(payload) {
            Ok(value) => self.events.dispatch(&name, value),
            Err(err) => {
                tracing::warn!(target = LOG_TARGET, event = %name, error = %err, "failed to encode event payload");
                0
            }
        }
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.events.handler_count(event)
    }
}

impl Default for InProcessHost {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl EmbeddedHost for InProcessHost {
    async fn invoke(
        &self,
        command: &str,
        args: Option<Map<String, Value>>,
    ) -> std::result::Result<Value, String> {
        let handler = self.commands.read().get(command).cloned();
        match handler {
            Some(handler) => handler(args).await,
            None => Err(format!("Unknown command: {command}")),
        }
    }

    fn listen(&self, event: &str, handler: EventHandler) -> Unlisten {
        subscribe(&self.events, event, handler)
    }

    async fn app_version(&self) -> std::result::Result<String, String> {
        Ok(self.version.clone())
    }

    async fn open_url(&self, url: &str) -> std::result::Result<(), String> {
        opener::open_url(url).map_err(|e| e.to_string())
    }

    async fn open_path(&self, path: &str) -> std::result::Result<(), String> {
        opener::open_path(path).map_err(|e| e.to_string())
    }
}

/// Embedded strategy: every facade call goes straight to the host primitive.
/// There is no token; token operations are no-ops and verification passes.
pub struct EmbeddedRuntime {
    host: Arc<dyn EmbeddedHost>,
}

impl EmbeddedRuntime {
    pub fn new(host: Arc<dyn EmbeddedHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl BridgeRuntime for EmbeddedRuntime {
    fn mode(&self) -> RuntimeMode {
        RuntimeMode::Embedded
    }

    async fn invoke(&self, command: &str, args: Value) -> Result<Value> {
        self.host
            .invoke(command, embedded_args(args))
            .await
            .map_err(BridgeError::Command)
    }

    async fn listen(&self, event: &str, handler: EventHandler) -> Result<Unlisten> {
        Ok(self.host.listen(event, handler))
    }

    async fn get_version(&self) -> Result<String> {
        self.host.app_version().await.map_err(BridgeError::Command)
    }

    async fn open_url(&self, url: &str) -> Result<()> {
        self.host.open_url(url).await.map_err(BridgeError::Open)
    }

    async fn open_path(&self, path: &str) -> Result<()> {
        self.host.open_path(path).await.map_err(BridgeError::Open)
    }

    fn get_token(&self) -> Option<String> {
        None
    }

    fn set_token(&self, _token: Option<&str>) {}

    async fn verify_token(&self, _candidate: &str) -> bool {
        true
    }
}
