//! Connection resilience primitives: bounded retry with a fixed delay, plus the
//! coordinator channel state machine.
//!
//! The retry loop is deliberately simple: a fixed number of attempts with a
//! constant pause between them, no exponential backoff and no jitter. The
//! coordinator either comes up within the budget or the participant has no
//! useful work to do. Tests drive the schedule on tokio's paused clock, so the
//! delay never costs wall-clock time in CI.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Lifecycle of the channel to the coordinator.
///
/// `Disconnected -> Connecting -> Ready`, back to `Disconnected` on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

/// Fixed-delay retry budget.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(10),
        }
    }
}

/// Runs `op` up to `cfg.max_attempts` times, sleeping `cfg.delay` between
/// attempts. Every attempt counts against the budget; the last error is
/// returned once the budget is spent. A zero budget still makes one attempt,
/// so there is always an outcome to report.
pub async fn retry_async<F, Fut, T, E>(cfg: &RetryConfig, mut op: F) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let budget = cfg.max_attempts.max(1);
    let mut last_err = None;
    for attempt in 0..budget {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!(
                    attempt = attempt + 1,
                    max_attempts = budget,
                    error = %e,
                    "attempt failed"
                );
                last_err = Some(e);
                if attempt + 1 < budget {
                    tokio::time::sleep(cfg.delay).await;
                }
            }
        }
    }
    Err(last_err.expect("budget is at least 1"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn retry_eventually_succeeds() {
        let cfg = RetryConfig {
            max_attempts: 5,
            delay: Duration::from_millis(1),
        };
        let mut calls = 0;
        let res: Result<u32, &str> = retry_async(&cfg, |_| {
            calls += 1;
            let ok = calls >= 3;
            async move { if ok { Ok(42) } else { Err("refused") } }
        })
        .await;
        assert_eq!(res.unwrap(), 42);
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_makes_exactly_ten_attempts_with_fixed_spacing() {
        let cfg = RetryConfig::default();
        let attempts = Cell::new(0usize);
        let start = tokio::time::Instant::now();

        let res: Result<(), &str> = retry_async(&cfg, |_| {
            attempts.set(attempts.get() + 1);
            async { Err("connection refused") }
        })
        .await;

        assert_eq!(res.unwrap_err(), "connection refused");
        assert_eq!(attempts.get(), 10);
        // nine pauses between ten attempts, none after the last
        assert_eq!(start.elapsed(), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn zero_budget_still_makes_one_attempt() {
        let cfg = RetryConfig {
            max_attempts: 0,
            delay: Duration::from_secs(10),
        };
        let attempts = Cell::new(0usize);
        let res: Result<(), &str> = retry_async(&cfg, |_| {
            attempts.set(attempts.get() + 1);
            async { Err("connection refused") }
        })
        .await;
        assert_eq!(res.unwrap_err(), "connection refused");
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn first_attempt_success_never_sleeps() {
        let cfg = RetryConfig {
            max_attempts: 10,
            delay: Duration::from_secs(3600),
        };
        let res: Result<u32, &str> = retry_async(&cfg, |_| async { Ok(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
