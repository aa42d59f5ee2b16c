//! Hosted push stream: one SSE connection feeding the handler registry.
//!
//! The connection lives in a spawned reader task. Replacing or discarding it
//! bumps `generation` inside the registry's exclusive section; a reader whose
//! generation is no longer current has its messages refused and exits.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use parking_lot::Mutex;
use reqwest::{header::ACCEPT, Client};
use secrecy::{ExposeSecret, SecretString};
use tokio::{runtime::Handle, task::JoinHandle};
use url::Url;

use super::auth::with_bearer;
use crate::config::endpoints::{EVENTS_PATH, LAST_EVENT_ID_HEADER, TOKEN_QUERY_PARAM};
use crate::config::BridgeConfig;
use crate::core::LOG_TARGET;
use crate::error::{BridgeError, Result};
use crate::events::{decode_payload, subscribe, EventHandler, HandlerRegistry, Unlisten};
use crate::resilience::{ErrorCategory, ReconnectBackoff, RetryPolicy};
use crate::token_store::TokenStore;

/// SSE messages without an `event:` field.
const DEFAULT_EVENT_NAME: &str = "message";

struct PushConnection {
    url: String,
    token: SecretString,
    generation: u64,
    task: JoinHandle<()>,
}

impl PushConnection {
    fn serves(&self, url: &str, token: &str) -> bool {
        self.url == url && self.token.expose_secret() == token && !self.task.is_finished()
    }
}

pub(crate) struct EventChannel {
    http: Client,
    config: BridgeConfig,
    registry: Arc<HandlerRegistry>,
    connection: Mutex<Option<PushConnection>>,
    generation: Arc<AtomicU64>,
}

impl EventChannel {
    pub(crate) fn new(http: Client, config: BridgeConfig) -> Self {
        Self {
            http,
            config,
            registry: Arc::new(HandlerRegistry::new()),
            connection: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register `handler` and make sure a live stream exists for the current
    /// token. The token is read inside the exclusive section, so a concurrent
    /// [`replace_token`](Self::replace_token) is either fully before or fully
    /// after this call.
    pub(crate) fn listen(
        &self,
        tokens: &TokenStore,
        event: &str,
        handler: EventHandler,
    ) -> Result<Unlisten> {
        self.registry.exclusive(|| {
            let token = tokens.require_token()?;
            let unlisten = subscribe(&self.registry, event, handler);
            if let Err(err) = self.ensure_connection(&token) {
                unlisten.unlisten();
                return Err(err);
            }
            Ok(unlisten)
        })
    }

    /// Swap the stored token and drop the stream opened with the old one, as
    /// one step with respect to `listen` and message delivery.
    pub(crate) fn replace_token(&self, tokens: &TokenStore, token: Option<&str>) {
        self.registry.exclusive(|| {
            tokens.set_token(token);
            self.discard_connection();
        });
    }

    /// Close the current stream, if any. Nothing it already read is delivered
    /// after this returns.
    fn discard_connection(&self) {
        self.registry.exclusive(|| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            if let Some(old) = self.connection.lock().take() {
                tracing::debug!(target = LOG_TARGET, generation = old.generation, "push stream discarded");
                old.task.abort();
            }
        });
    }

    pub(crate) fn has_connection(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .is_some_and(|conn| !conn.task.is_finished())
    }

    pub(crate) fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Token of the live stream, if there is one.
    #[cfg(test)]
    pub(crate) fn connection_token(&self) -> Option<String> {
        self.connection
            .lock()
            .as_ref()
            .filter(|conn| !conn.task.is_finished())
            .map(|conn| conn.token.expose_secret().clone())
    }

    fn ensure_connection(&self, token: &str) -> Result<()> {
        let url = stream_url(&self.config, token)?;
        self.registry.exclusive(|| {
            let mut slot = self.connection.lock();
            if slot.as_ref().is_some_and(|conn| conn.serves(&url, token)) {
                return Ok(());
            }
            let runtime = Handle::try_current().map_err(|_| BridgeError::RuntimeUnavailable)?;
            if let Some(old) = slot.take() {
                old.task.abort();
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let reader = StreamReader {
                http: self.http.clone(),
                url: url.clone(),
                token: SecretString::new(token.to_string()),
                policy: self.config.reconnect.clone(),
                registry: Arc::clone(&self.registry),
                current: Arc::clone(&self.generation),
                generation,
            };
            tracing::debug!(target = LOG_TARGET, generation, "opening push stream");
            let task = runtime.spawn(reader.run());
            *slot = Some(PushConnection {
                url,
                token: SecretString::new(token.to_string()),
                generation,
                task,
            });
            Ok(())
        })
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.get_mut().take() {
            conn.task.abort();
        }
    }
}

/// `{base}/api/events`, with `?token=` unless the tokenless variant is
/// configured.
pub(crate) fn stream_url(config: &BridgeConfig, token: &str) -> Result<String> {
    let raw = config.endpoint(EVENTS_PATH);
    let mut url = Url::parse(&raw).map_err(|e| BridgeError::InvalidUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })?;
    if config.token_in_query {
        url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, token);
    }
    Ok(url.into())
}

enum StreamEnd {
    /// A newer connection took over; exit quietly.
    Superseded,
    Failed(ErrorCategory),
}

struct StreamReader {
    http: Client,
    url: String,
    token: SecretString,
    policy: RetryPolicy,
    registry: Arc<HandlerRegistry>,
    current: Arc<AtomicU64>,
    generation: u64,
}

impl StreamReader {
    async fn run(self) {
        let mut backoff = ReconnectBackoff::new(self.policy.clone());
        let mut last_event_id: Option<String> = None;
        let mut server_retry: Option<Duration> = None;

        loop {
            let category = match self
                .read_once(&mut backoff, &mut last_event_id, &mut server_retry)
                .await
            {
                StreamEnd::Superseded => return,
                StreamEnd::Failed(category) => category,
            };
            if self.is_stale() {
                return;
            }
            match backoff.next_delay(category, server_retry) {
                Some(delay) => {
                    tracing::info!(
                        target = LOG_TARGET,
                        ?category,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "push stream reconnect scheduled"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::warn!(target = LOG_TARGET, ?category, "push stream closed; not reconnecting");
                    return;
                }
            }
        }
    }

    fn is_stale(&self) -> bool {
        self.current.load(Ordering::SeqCst) != self.generation
    }

    async fn read_once(
        &self,
        backoff: &mut ReconnectBackoff,
        last_event_id: &mut Option<String>,
        server_retry: &mut Option<Duration>,
    ) -> StreamEnd {
        let mut request = with_bearer(self.http.get(&self.url), self.token.expose_secret())
            .header(ACCEPT, "text/event-stream");
        if let Some(id) = last_event_id.as_deref() {
            request = request.header(LAST_EVENT_ID_HEADER, id);
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::warn!(target = LOG_TARGET, error = %err, "push stream connect failed");
                return StreamEnd::Failed(ErrorCategory::Network);
            }
        };
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(target = LOG_TARGET, status = status.as_u16(), "push stream refused by host");
            return StreamEnd::Failed(ErrorCategory::categorize(Some(status.as_u16())));
        }
        backoff.reset();
        tracing::info!(target = LOG_TARGET, generation = self.generation, "push stream connected");

        let mut messages = Box::pin(resp.bytes_stream().eventsource());
        while let Some(item) = messages.next().await {
            let message = match item {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(target = LOG_TARGET, error = %err, "push stream error");
                    return StreamEnd::Failed(ErrorCategory::Transport);
                }
            };
            if !message.id.is_empty() {
                *last_event_id = Some(message.id.clone());
            }
            if let Some(retry) = message.retry {
                *server_retry = Some(retry);
            }
            let name = if message.event.is_empty() {
                DEFAULT_EVENT_NAME
            } else {
                message.event.as_str()
            };
            let payload = decode_payload(&message.data);
            let admitted = self
                .registry
                .dispatch_if(name, payload, || !self.is_stale());
            if admitted.is_none() {
                return StreamEnd::Superseded;
            }
        }

        tracing::info!(target = LOG_TARGET, "push stream ended by host");
        StreamEnd::Failed(ErrorCategory::Network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::endpoints::TOKEN_STORAGE_KEY;
    use crate::events::BridgeEvent;
    use crate::resilience::no_reconnect_policy;
    use crate::token_store::MemoryTokenStorage;

    fn channel() -> EventChannel {
        let config = BridgeConfig::new("http://127.0.0.1:9").with_reconnect(no_reconnect_policy());
        EventChannel::new(Client::new(), config)
    }

    fn tokens(value: &str) -> TokenStore {
        TokenStore::new(Arc::new(MemoryTokenStorage::with_value(TOKEN_STORAGE_KEY, value)))
    }

    fn noop() -> EventHandler {
        Arc::new(|_: &BridgeEvent| {})
    }

    #[test]
    fn listen_outside_a_runtime_is_an_error_not_a_panic() {
        let channel = channel();
        let err = channel
            .listen(&tokens("abc123"), "repo-agent-done", noop())
            .unwrap_err();
        assert!(matches!(err, BridgeError::RuntimeUnavailable));
        assert_eq!(channel.registry().handler_count("repo-agent-done"), 0);
        assert!(!channel.has_connection());
    }

    #[test]
    fn listen_without_token_registers_nothing() {
        let channel = channel();
        let store = TokenStore::new(Arc::new(MemoryTokenStorage::new()));
        let err = channel.listen(&store, "repo-agent-done", noop()).unwrap_err();
        assert!(matches!(err, BridgeError::AuthenticationRequired));
        assert_eq!(channel.registry().handler_count("repo-agent-done"), 0);
    }

    #[tokio::test]
    async fn replace_token_drops_the_stream_and_keeps_handlers() {
        // Bound but never accepted: the reader stays parked on the request.
        let parked = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = BridgeConfig::new(format!("http://{}", parked.local_addr().unwrap()))
            .with_reconnect(no_reconnect_policy());
        let channel = EventChannel::new(Client::new(), config);
        let store = tokens("old");

        let _unlisten = channel.listen(&store, "tick", noop()).unwrap();
        assert_eq!(channel.connection_token().as_deref(), Some("old"));

        channel.replace_token(&store, Some("new"));
        assert_eq!(channel.connection_token(), None);
        assert_eq!(store.get_token().as_deref(), Some("new"));
        assert_eq!(channel.registry().handler_count("tick"), 1);

        let _again = channel.listen(&store, "tick", noop()).unwrap();
        assert_eq!(channel.connection_token().as_deref(), Some("new"));
    }

    #[test]
    fn token_is_url_encoded_in_query() {
        let config = BridgeConfig::new("http://127.0.0.1:48678");
        assert_eq!(
            stream_url(&config, "a b&c").unwrap(),
            "http://127.0.0.1:48678/api/events?token=a+b%26c"
        );
    }

    #[test]
    fn tokenless_variant_has_no_query() {
        let config = BridgeConfig::new("http://127.0.0.1:48678").with_token_in_query(false);
        assert_eq!(
            stream_url(&config, "abc123").unwrap(),
            "http://127.0.0.1:48678/api/events"
        );
    }

    #[test]
    fn unparseable_base_is_reported() {
        let config = BridgeConfig::new("not a url");
        assert!(matches!(
            stream_url(&config, "t"),
            Err(BridgeError::InvalidUrl { .. })
        ));
    }
}
