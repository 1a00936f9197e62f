//! Bounded retry with backoff for flaky external calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How the wait between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `step * attempt` (1s, 2s, 3s, ...).
    Linear,
    /// `step * 2^(attempt - 1)` (1s, 2s, 4s, ...).
    Exponential,
}

/// Attempt budget plus the wait schedule between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub attempts: u32,
    pub step: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn linear(attempts: u32, step: Duration) -> Self {
        Self {
            attempts,
            step,
            backoff: Backoff::Linear,
        }
    }

    pub fn exponential(attempts: u32, step: Duration) -> Self {
        Self {
            attempts,
            step,
            backoff: Backoff::Exponential,
        }
    }

    /// Wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::Linear => self.step.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.step.saturating_mul(factor)
            }
        }
    }
}

/// Run `op` until it succeeds or the attempt budget runs out.
///
/// `op` receives the 1-based attempt number. Every failure is logged with
/// `label`; the last error is returned when all attempts fail.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => {
                warn!("{label} failed (attempt {attempt}/{attempts}): {e}");
                return Err(e);
            }
            Err(e) => {
                warn!("{label} failed (attempt {attempt}/{attempts}): {e}");
                tokio::time::sleep(policy.delay_after(attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// Like [`retry_with_backoff`], but resolves exhaustion through `fallback`
/// instead of returning the error.
pub async fn retry_or_else<T, E, F, Fut, G>(
    policy: &RetryPolicy,
    label: &str,
    op: F,
    fallback: G,
) -> T
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    G: FnOnce(E) -> T,
{
    match retry_with_backoff(policy, label, op).await {
        Ok(value) => value,
        Err(e) => fallback(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(attempts: u32) -> RetryPolicy {
        RetryPolicy::linear(attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_linear_delays() {
        let p = RetryPolicy::linear(3, Duration::from_secs(1));
        assert_eq!(p.delay_after(1), Duration::from_secs(1));
        assert_eq!(p.delay_after(2), Duration::from_secs(2));
        assert_eq!(p.delay_after(3), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_delays() {
        let p = RetryPolicy::exponential(3, Duration::from_millis(500));
        assert_eq!(p.delay_after(1), Duration::from_millis(500));
        assert_eq!(p.delay_after(2), Duration::from_millis(1000));
        assert_eq!(p.delay_after(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_exponential_delay_saturates() {
        let p = RetryPolicy::exponential(3, Duration::from_secs(1));
        assert!(p.delay_after(200) >= Duration::from_secs(u32::MAX as u64));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = retry_with_backoff(&fast(3), "op", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(format!("boom {attempt}"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_with_backoff(&fast(3), "op", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("boom {attempt}")) }
        })
        .await;
        assert_eq!(result.unwrap_err(), "boom 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let _: Result<(), String> = retry_with_backoff(&fast(0), "op", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("no".to_string()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_on_exhaustion() {
        let value = retry_or_else(
            &fast(2),
            "op",
            |_| async { Err::<String, _>("down".to_string()) },
            |e| format!("fallback after {e}"),
        )
        .await;
        assert_eq!(value, "fallback after down");
    }
}
