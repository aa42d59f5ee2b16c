//! Runtime detection.
//!
//! The native shell marks the process as embedded by installing its
//! [`EmbeddedHost`] before any bridge is built. The mode is derived from that
//! marker on first use and never re-evaluated.

use std::{fmt, sync::Arc};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::embedded::EmbeddedHost;

static EMBEDDED_HOST: OnceCell<Arc<dyn EmbeddedHost>> = OnceCell::new();
static RUNTIME_MODE: OnceCell<RuntimeMode> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    Embedded,
    Hosted,
}

impl RuntimeMode {
    pub fn from_marker(embedded_marker_present: bool) -> Self {
        if embedded_marker_present {
            RuntimeMode::Embedded
        } else {
            RuntimeMode::Hosted
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeMode::Embedded => "embedded",
            RuntimeMode::Hosted => "hosted",
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called once by the native shell at startup. Returns `false` if a host was
/// already installed (the first one stays).
pub fn install_embedded_host(host: Arc<dyn EmbeddedHost>) -> bool {
    EMBEDDED_HOST.set(host).is_ok()
}

pub fn embedded_host() -> Option<Arc<dyn EmbeddedHost>> {
    EMBEDDED_HOST.get().cloned()
}

/// Mode of this process, fixed at first call.
pub fn runtime_mode() -> RuntimeMode {
    *RUNTIME_MODE.get_or_init(|| RuntimeMode::from_marker(EMBEDDED_HOST.get().is_some()))
}

pub fn is_embedded_runtime() -> bool {
    runtime_mode() == RuntimeMode::Embedded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_decides_mode() {
        assert_eq!(RuntimeMode::from_marker(true), RuntimeMode::Embedded);
        assert_eq!(RuntimeMode::from_marker(false), RuntimeMode::Hosted);
        assert_eq!(RuntimeMode::Hosted.to_string(), "hosted");
    }

    #[test]
    fn mode_is_stable_across_calls() {
        let first = runtime_mode();
        for _ in 0..4 {
            assert_eq!(runtime_mode(), first);
        }
    }
}
