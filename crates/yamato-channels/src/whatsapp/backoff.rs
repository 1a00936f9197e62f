//! Reconnection timing policy.

use std::time::Duration;
use yamato_core::config::ConnectionConfig;

/// Backoff and circuit-breaker limits for reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Retries with exponential backoff before starting a fresh session.
    pub max_retries: u32,
    /// Total scheduled attempts before credentials are wiped outright.
    pub max_connection_attempts: u32,
    /// Fixed delay used when the retry budget is exhausted.
    pub fresh_session_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(3_000),
            max_delay: Duration::from_millis(60_000),
            max_retries: 10,
            max_connection_attempts: 50,
            fresh_session_delay: Duration::from_millis(10_000),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(cfg: &ConnectionConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            max_retries: cfg.max_retries,
            max_connection_attempts: cfg.max_connection_attempts,
            fresh_session_delay: Duration::from_millis(cfg.fresh_session_delay_ms),
        }
    }

    /// `min(base * 2^retry_count, max)`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 1u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        let policy = ReconnectPolicy::default();
        let expected_ms = [3_000, 6_000, 12_000, 24_000, 48_000, 60_000, 60_000, 60_000, 60_000, 60_000];
        for (retry, ms) in expected_ms.iter().enumerate() {
            assert_eq!(
                policy.delay_for(retry as u32),
                Duration::from_millis(*ms),
                "retry {retry}"
            );
        }
    }

    #[test]
    fn test_delay_formula_for_first_ten_retries() {
        let policy = ReconnectPolicy::default();
        for retry in 0..10u32 {
            let expected = (3_000u64 * 2u64.pow(retry)).min(60_000);
            assert_eq!(policy.delay_for(retry), Duration::from_millis(expected));
        }
    }

    #[test]
    fn test_delay_never_overflows() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(64), policy.max_delay);
        assert_eq!(policy.delay_for(u32::MAX), policy.max_delay);
    }

    #[test]
    fn test_from_config() {
        let cfg = ConnectionConfig {
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            max_retries: 2,
            max_connection_attempts: 5,
            fresh_session_delay_ms: 250,
            ..Default::default()
        };
        let policy = ReconnectPolicy::from_config(&cfg);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.max_connection_attempts, 5);
        assert_eq!(policy.delay_for(4), Duration::from_millis(1_000));
    }
}
