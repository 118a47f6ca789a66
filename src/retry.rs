//! Exponential-backoff retry for fallible async operations.
//!
//! [`with_retry`] retries every failure; [`with_retry_for`] only retries
//! failures accepted by a predicate and hands the rest straight back.

use std::future::Future;
use std::time::Duration;

/// Backoff schedule: `initial_delay`, then multiplied by `factor` per retry,
/// never exceeding `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Attempt count with the `0 => 1` floor applied.
    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let factor = if self.factor.is_finite() && self.factor > 0.0 {
            self.factor
        } else {
            1.0
        };
        let next = current.as_secs_f64() * factor;
        if next >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(next)
        }
    }

    /// The delays slept between attempts, in order. Has `max_attempts - 1` entries.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut current = self.initial_delay.min(self.max_delay);
        for _ in 1..self.attempts() {
            delays.push(current);
            current = self.next_delay(current);
        }
        delays
    }
}

/// Run `operation`, retrying every failure per `policy`. Returns the last
/// error once attempts are exhausted.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    with_retry_for(policy, |_| true, operation).await
}

/// Like [`with_retry`], but only failures for which `is_retryable` returns
/// `true` are retried. Anything else propagates immediately without using up
/// an attempt.
pub async fn with_retry_for<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.attempts();
    let mut delay = policy.initial_delay.min(policy.max_delay);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => return Err(err),
            Err(err) if attempt >= max_attempts => {
                tracing::warn!(attempts = attempt, error = %err, "giving up after retries");
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = policy.next_delay(delay);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(150),
            factor: 2.0,
        }
    }

    #[test]
    fn delays_grow_and_cap() {
        let delays = policy(4).delays();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(150),
                Duration::from_millis(150),
            ]
        );
    }

    #[test]
    fn zero_attempts_means_one() {
        assert!(policy(0).delays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let p = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            factor: 3.0,
        };
        let start = tokio::time::Instant::now();

        let result: Result<&str, String> = with_retry(&p, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("failure {n}"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms, then 100ms * 3
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry(&policy(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("failure {n}")) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result: Result<(), String> = with_retry_for(
            &policy(5),
            |e: &String| e.starts_with("transient"),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            },
        )
        .await;

        assert_eq!(result.unwrap_err(), "fatal");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_then_fatal_stops_at_fatal() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_retry_for(
            &policy(5),
            |e: &String| e.starts_with("transient"),
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err("transient blip".to_string())
                    } else {
                        Err("fatal".to_string())
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap_err(), "fatal");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn each_retry_is_logged_at_warn() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let calls = AtomicU32::new(0);
        tracing::subscriber::with_default(subscriber, || {
            rt.block_on(async {
                let result: Result<(), String> = with_retry(&policy(3), || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move { Err(format!("failure {n}")) }
                })
                .await;
                assert!(result.is_err());
            })
        });

        let log = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(log.matches("operation failed, retrying").count(), 2);
        assert_eq!(log.matches("giving up after retries").count(), 1);
    }
}
