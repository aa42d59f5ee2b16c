//! Event names, payloads and the handler registry shared by both runtimes.
//!
//! The registry is the multiplexer behind `listen`: one transport feeds it,
//! any number of handlers per event name hang off it.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use parking_lot::{Mutex, ReentrantMutex};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::core::LOG_TARGET;

// Names emitted by the host's agent supervisor.
pub const REPO_AGENT_STDOUT: &str = "repo-agent-stdout";
pub const REPO_AGENT_STDERR: &str = "repo-agent-stderr";
pub const REPO_AGENT_DONE: &str = "repo-agent-done";
pub const REPO_AGENT_FORCE_STOP: &str = "repo-agent-force-stop";

/// Payload of `repo-agent-stdout` / `repo-agent-stderr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStreamPayload {
    pub run_id: String,
    pub agent_id: i64,
    pub line: String,
}

/// Payload of `repo-agent-done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDonePayload {
    pub run_id: String,
    pub agent_id: i64,
    pub success: bool,
}

/// What a handler receives: the event name and its decoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub event: String,
    pub payload: Value,
}

impl BridgeEvent {
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

pub type EventHandler = Arc<dyn Fn(&BridgeEvent) + Send + Sync>;

/// Decode a push message body. Bodies that are not JSON are delivered as the
/// raw string.
pub fn decode_payload(data: &str) -> Value {
    match serde_json::from_str::<Value>(data) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(target = LOG_TARGET, error = %err, "event body is not JSON; delivering raw text");
            Value::String(data.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Handle returned by `listen`. Calling [`Unlisten::unlisten`] removes the
/// registration; further calls are no-ops. Dropping the handle does NOT
/// unsubscribe.
pub struct Unlisten {
    action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Unlisten {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    pub fn unlisten(&self) {
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    pub fn is_active(&self) -> bool {
        self.action.lock().is_some()
    }
}

impl fmt::Debug for Unlisten {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unlisten")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Event name → ordered handlers.
///
/// INVARIANT: delivery of one message, removal of a handler and any
/// `exclusive` section are serialised by `delivery`. Once `remove` returns the
/// handler is never invoked again, even by a delivery running on another
/// thread. The lock is re-entrant so handlers may unsubscribe or listen from
/// inside a callback.
pub struct HandlerRegistry {
    delivery: ReentrantMutex<()>,
    handlers: Mutex<HashMap<String, Vec<(SubscriptionId, EventHandler)>>>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            delivery: ReentrantMutex::new(()),
            handlers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn register(&self, event: &str, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove one registration. Empty names are dropped from the map.
    pub fn remove(&self, event: &str, id: SubscriptionId) -> bool {
        let _delivery = self.delivery.lock();
        let mut handlers = self.handlers.lock();
        let Some(list) = handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(event);
        }
        removed
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.lock().get(event).map_or(0, Vec::len)
    }

    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Deliver to every handler of `event` in registration order. Returns the
    /// number of handlers invoked.
    pub fn dispatch(&self, event: &str, payload: Value) -> usize {
        self.dispatch_if(event, payload, || true).unwrap_or(0)
    }

    /// Like [`dispatch`](Self::dispatch), but `admit` is evaluated inside the
    /// delivery lock first; `None` means the message was refused.
    pub fn dispatch_if(
        &self,
        event: &str,
        payload: Value,
        admit: impl FnOnce() -> bool,
    ) -> Option<usize> {
        let _delivery = self.delivery.lock();
        if !admit() {
            return None;
        }
        let snapshot = match self.handlers.lock().get(event) {
            Some(list) => list.clone(),
            None => return Some(0),
        };
        let message = BridgeEvent {
            event: event.to_string(),
            payload,
        };
        let mut delivered = 0;
        for (id, handler) in snapshot {
            // A handler earlier in this pass may have unsubscribed a later one.
            if !self.is_registered(event, id) {
                continue;
            }
            handler(&message);
            delivered += 1;
        }
        Some(delivered)
    }

    /// Run `f` with no delivery in progress.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _delivery = self.delivery.lock();
        f()
    }

    fn is_registered(&self, event: &str, id: SubscriptionId) -> bool {
        self.handlers
            .lock()
            .get(event)
            .is_some_and(|list| list.iter().any(|(existing, _)| *existing == id))
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Register `handler` and hand back an [`Unlisten`] bound to that one
/// registration.
pub fn subscribe(registry: &Arc<HandlerRegistry>, event: &str, handler: EventHandler) -> Unlisten {
    let id = registry.register(event, handler);
    let weak: Weak<HandlerRegistry> = Arc::downgrade(registry);
    let event = event.to_string();
    Unlisten::new(move || {
        if let Some(registry) = weak.upgrade() {
            registry.remove(&event, id);
        }
    })
}
