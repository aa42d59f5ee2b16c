//! Reconnect decisions for the hosted push stream
//!
//! Failures are categorised the same way for every attempt; auth failures
//! never retry, everything else backs off per [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use crate::config::resilience::{no_reconnect_policy, push_reconnect_policy, RetryPolicy};

/// Why a push connection attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// HTTP 401/403 - credential rejected (no retry)
    Auth,
    /// HTTP 429 - host is shedding load
    RateLimit,
    /// HTTP 5xx or a broken stream body
    Transport,
    /// HTTP 4xx other than the above - request will not succeed as-is (no retry)
    Policy,
    /// Connect failure, timeout, or the host closing the stream
    Network,
}

impl ErrorCategory {
    /// Categorize a failed attempt from its HTTP status (if one was received)
    pub fn categorize(status: Option<u16>) -> Self {
        match status {
            Some(401 | 403) => ErrorCategory::Auth,
            Some(429) => ErrorCategory::RateLimit,
            Some(500..=599) => ErrorCategory::Transport,
            Some(400..=499) => ErrorCategory::Policy,
            _ => ErrorCategory::Network,
        }
    }

    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorCategory::Auth | ErrorCategory::Policy)
    }
}

/// Tracks consecutive failures of one push connection.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    policy: RetryPolicy,
    attempt: u8,
}

impl ReconnectBackoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Call after the host accepted a connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u8 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` when the stream should stay
    /// closed. A `retry:` hint from the host raises the floor of the delay.
    pub fn next_delay(
        &mut self,
        category: ErrorCategory,
        server_hint: Option<Duration>,
    ) -> Option<Duration> {
        if !category.is_retryable() || self.attempt >= self.policy.max_attempts {
            return None;
        }
        let delay = self.policy.calculate_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        Some(match server_hint {
            Some(hint) => delay.max(hint),
            None => delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(max_attempts: u8) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_error_categorization() {
        assert_eq!(ErrorCategory::categorize(Some(401)), ErrorCategory::Auth);
        assert_eq!(ErrorCategory::categorize(Some(403)), ErrorCategory::Auth);
        assert_eq!(
            ErrorCategory::categorize(Some(429)),
            ErrorCategory::RateLimit
        );
        assert_eq!(
            ErrorCategory::categorize(Some(503)),
            ErrorCategory::Transport
        );
        assert_eq!(ErrorCategory::categorize(Some(404)), ErrorCategory::Policy);
        assert_eq!(ErrorCategory::categorize(None), ErrorCategory::Network);
    }

    #[test]
    fn auth_failures_never_reconnect() {
        let mut backoff = ReconnectBackoff::new(fixed(5));
        assert_eq!(backoff.next_delay(ErrorCategory::Auth, None), None);
        assert_eq!(backoff.next_delay(ErrorCategory::Policy, None), None);
        assert_eq!(backoff.attempt(), 0);
    }

    #[test]
    fn attempts_are_capped_and_reset() {
        let mut backoff = ReconnectBackoff::new(fixed(2));
        assert_eq!(
            backoff.next_delay(ErrorCategory::Network, None),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            backoff.next_delay(ErrorCategory::Transport, None),
            Some(Duration::from_millis(200))
        );
        assert_eq!(backoff.next_delay(ErrorCategory::Network, None), None);

        backoff.reset();
        assert_eq!(
            backoff.next_delay(ErrorCategory::Network, None),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn server_retry_hint_raises_the_floor() {
        let mut backoff = ReconnectBackoff::new(fixed(3));
        assert_eq!(
            backoff.next_delay(ErrorCategory::Network, Some(Duration::from_secs(3))),
            Some(Duration::from_secs(3))
        );
        assert_eq!(
            backoff.next_delay(ErrorCategory::Network, Some(Duration::from_millis(1))),
            Some(Duration::from_millis(200))
        );
    }

    #[test]
    fn disabled_policy_stays_closed() {
        let mut backoff = ReconnectBackoff::new(no_reconnect_policy());
        assert_eq!(backoff.next_delay(ErrorCategory::Network, None), None);
    }
}
