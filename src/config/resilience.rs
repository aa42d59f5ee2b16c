//! Reconnection configuration for the hosted push stream

use rand::Rng;
use std::time::Duration;

/// Exponential backoff policy applied between push-stream connection attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum consecutive failed attempts before the stream is abandoned (0 = never reconnect)
    pub max_attempts: u8,
    /// Base delay in milliseconds
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add jitter so many clients do not reconnect in lockstep
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        push_reconnect_policy()
    }
}

pub const PUSH_RECONNECT_MAX_ATTEMPTS: u8 = 8;
pub const PUSH_RECONNECT_BASE_DELAY_MS: u64 = 500;
pub const PUSH_RECONNECT_MAX_DELAY_MS: u64 = 30_000;
pub const PUSH_RECONNECT_MULTIPLIER: f64 = 2.0;
pub const PUSH_RECONNECT_JITTER: bool = true;

pub const RECONNECT_MAX_ATTEMPTS_ENV: &str = "SYMPHONY_EVENTS_RECONNECT_MAX_ATTEMPTS";
pub const RECONNECT_BASE_MS_ENV: &str = "SYMPHONY_EVENTS_RECONNECT_BASE_MS";
pub const RECONNECT_MAX_MS_ENV: &str = "SYMPHONY_EVENTS_RECONNECT_MAX_MS";

impl RetryPolicy {
    /// Calculate delay for a given attempt number (0-based)
    pub fn calculate_delay(&self, attempt: u8) -> Duration {
        let delay_ms = (self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32)) as u64;
        let delay_ms = delay_ms.min(self.max_delay_ms);

        let final_delay = if self.jitter {
            let jitter_range = delay_ms / 4;
            let mut rng = rand::thread_rng();
            let offset = rng.gen_range(0..=2 * jitter_range);
            delay_ms.saturating_add(offset).saturating_sub(jitter_range)
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }

    /// Default push policy with environment overrides applied.
    ///
    /// Environment variables:
    /// - SYMPHONY_EVENTS_RECONNECT_MAX_ATTEMPTS (default: 8)
    /// - SYMPHONY_EVENTS_RECONNECT_BASE_MS (default: 500)
    /// - SYMPHONY_EVENTS_RECONNECT_MAX_MS (default: 30000)
    pub fn from_env() -> Self {
        let mut policy = push_reconnect_policy();
        if let Some(v) = env_parse::<u8>(RECONNECT_MAX_ATTEMPTS_ENV) {
            policy.max_attempts = v;
        }
        if let Some(v) = env_parse::<u64>(RECONNECT_BASE_MS_ENV) {
            policy.base_delay_ms = v;
        }
        if let Some(v) = env_parse::<u64>(RECONNECT_MAX_MS_ENV) {
            policy.max_delay_ms = v.max(policy.base_delay_ms);
        }
        policy
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Create the default push-stream reconnect policy
pub fn push_reconnect_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: PUSH_RECONNECT_MAX_ATTEMPTS,
        base_delay_ms: PUSH_RECONNECT_BASE_DELAY_MS,
        max_delay_ms: PUSH_RECONNECT_MAX_DELAY_MS,
        multiplier: PUSH_RECONNECT_MULTIPLIER,
        jitter: PUSH_RECONNECT_JITTER,
    }
}

/// Policy that leaves a dropped stream closed
pub fn no_reconnect_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 0,
        ..push_reconnect_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(policy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(policy.calculate_delay(10), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_stays_within_a_quarter() {
        let policy = push_reconnect_policy();
        for _ in 0..32 {
            let ms = policy.calculate_delay(0).as_millis() as u64;
            assert!((375..=625).contains(&ms), "got {ms}");
        }
    }

    #[test]
    fn no_reconnect_keeps_timings() {
        let policy = no_reconnect_policy();
        assert_eq!(policy.max_attempts, 0);
        assert_eq!(policy.base_delay_ms, PUSH_RECONNECT_BASE_DELAY_MS);
    }
}
