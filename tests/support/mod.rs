//! Shared helpers for the bridge integration suites.

#![allow(dead_code)]

pub mod sse_fixtures;

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use serde_json::Value;
use symphony_bridge::BridgeEvent;

/// Poll `condition` until it holds or `timeout` elapses. Yields to the
/// runtime between checks so spawned stream readers make progress.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Records `(tag, payload)` for every event a handler sees.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(&self, tag: &str) -> impl Fn(&BridgeEvent) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        let tag = tag.to_string();
        move |event: &BridgeEvent| seen.lock().push((tag.clone(), event.payload.clone()))
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.seen.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn tags(&self) -> Vec<String> {
        self.seen.lock().iter().map(|(tag, _)| tag.clone()).collect()
    }
}
