// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use rand::RngExt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Bounded retry with fixed backoff and optional jitter.
///
/// Transient failures are retried up to `max_attempts` total attempts with
/// a fixed delay between them; the jitter spreads simultaneous retries so
/// contending tasks do not reacquire locks in lockstep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Fixed delay between attempts.
    pub backoff_ms: u64,
    /// Maximum random extra delay added to each backoff.
    pub jitter_ms: u64,
}

impl RetryPolicy {
    /// Creates a policy, clamping `max_attempts` to at least one.
    #[must_use]
    pub const fn new(max_attempts: usize, backoff_ms: u64, jitter_ms: u64) -> Self {
        let clamped_attempts = if max_attempts == 0 { 1 } else { max_attempts };
        Self {
            max_attempts: clamped_attempts,
            backoff_ms,
            jitter_ms,
        }
    }

    /// A single attempt, no backoff. Useful in tests that assert on the
    /// first failure.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new(1, 0, 0)
    }

    fn next_delay(&self) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            rand::rng().random_range(0..=self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.backoff_ms.saturating_add(jitter))
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// exhausts the attempt budget. `is_retryable` decides which errors
    /// are worth another attempt.
    pub async fn run<T, E, F, Fut>(&self, is_retryable: impl Fn(&E) -> bool, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !is_retryable(&err) {
                        return Err(err);
                    }
                    warn!(attempt, "Retrying after transient failure: {err}");
                    sleep(self.next_delay()).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, 200 ms apart, with up to 50 ms of jitter.
    fn default() -> Self {
        Self::new(3, 200, 50)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{advance, pause};

    #[test]
    fn test_new_clamps_zero_attempts() {
        let policy = RetryPolicy::new(0, 100, 0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        pause();
        let policy = RetryPolicy::new(3, 10, 0);
        let attempts = Arc::new(AtomicUsize::new(0));
        let advancer = tokio::spawn(async {
            advance(Duration::from_millis(10)).await;
            advance(Duration::from_millis(10)).await;
        });

        let counter = attempts.clone();
        let result: Result<&'static str, &'static str> = policy
            .run(
                |_| true,
                move || {
                    let counter = counter.clone();
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err("transient")
                        } else {
                            Ok("done")
                        }
                    }
                },
            )
            .await;

        advancer.await.unwrap();
        assert_eq!(result, Ok("done"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_after_attempt_budget() {
        pause();
        let policy = RetryPolicy::new(2, 5, 0);
        let attempts = Arc::new(AtomicUsize::new(0));
        let advancer = tokio::spawn(async {
            advance(Duration::from_millis(5)).await;
        });

        let counter = attempts.clone();
        let result: Result<(), &'static str> = policy
            .run(
                |_| true,
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err("transient")
                    }
                },
            )
            .await;

        advancer.await.unwrap();
        assert_eq!(result, Err("transient"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_terminal_errors_are_not_retried() {
        let policy = RetryPolicy::new(5, 10, 0);
        let attempts = Arc::new(AtomicUsize::new(0));

        let counter = attempts.clone();
        let result: Result<(), &'static str> = policy
            .run(
                |err| *err != "terminal",
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err("terminal")
                    }
                },
            )
            .await;

        assert_eq!(result, Err("terminal"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
