use thiserror::Error;

/// Failure surfaced by a bridge operation.
///
/// Push-stream failures never appear here: they are logged by the event
/// channel and the stream is reconnected or abandoned.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Hosted mode without a usable token. Raised before any request is made.
    #[error("Authentication required")]
    AuthenticationRequired,
    /// The host answered with a non-2xx status. `message` carries the host's
    /// own error text when the body had one.
    #[error("{message}")]
    HttpStatus { status: u16, message: String },
    #[error("Bridge transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid bridge response: {0}")]
    InvalidResponse(String),
    /// Application-level failure reported by the host, passed through verbatim.
    #[error("{0}")]
    Command(String),
    #[error("Failed to encode arguments for {command}: {source}")]
    EncodeArgs {
        command: String,
        source: serde_json::Error,
    },
    #[error("Unexpected result shape from {command}: {source}")]
    DecodeResult {
        command: String,
        source: serde_json::Error,
    },
    #[error("Invalid bridge URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// `listen` was polled outside a tokio runtime, so the push stream has
    /// nowhere to run.
    #[error("No tokio runtime available for the push stream")]
    RuntimeUnavailable,
    #[error("Embedded runtime detected but no embedded host is installed")]
    EmbeddedHostMissing,
    #[error("{0}")]
    Open(String),
}

impl BridgeError {
    pub fn http_status(status: u16, server_message: Option<String>) -> Self {
        let message = server_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Bridge request failed: HTTP {status}"));
        BridgeError::HttpStatus { status, message }
    }

    pub fn is_authentication(&self) -> bool {
        match self {
            BridgeError::AuthenticationRequired => true,
            BridgeError::HttpStatus { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }
}

/// Durable token storage failure. Never crosses the token store boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage document corrupt: {0}")]
    Format(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_prefers_server_message() {
        let err = BridgeError::http_status(401, Some("bad token".into()));
        assert_eq!(err.to_string(), "bad token");
        assert!(err.is_authentication());
    }

    #[test]
    fn http_status_falls_back_to_status_text() {
        let err = BridgeError::http_status(502, Some("  ".into()));
        assert_eq!(err.to_string(), "Bridge request failed: HTTP 502");
        assert!(!err.is_authentication());
    }
}
