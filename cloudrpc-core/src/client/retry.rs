//! # Retry Policy
//!
//! Reissues calls that failed with a transient error (`UNAVAILABLE`).
//!
//! The historical behavior is three attempts with a short fixed delay. Both numbers are
//! policy, not protocol: [`RetryConfig`] exposes attempts, delay growth and jitter.
use crate::error::DispatchError;
use rand::Rng;
use std::{future::Future, time::Duration};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor applied to the delay after each retry. `1.0` keeps it fixed.
    pub multiplier: f64,
    /// Upper bound for the delay, jitter included.
    pub max_delay: Duration,
    /// Fraction of the delay (0.0 - 1.0) randomly added on top of it.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            multiplier: 1.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before reissuing after `attempt` attempts failed (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);

        let mut delay = if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max_delay
        };

        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter > 0.0 {
            delay += delay.mul_f64(rand::thread_rng().gen_range(0.0..=jitter));
        }

        delay.min(self.max_delay)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `op` until it succeeds, fails with a non-transient error or runs out of attempts.
    ///
    /// Attempts are sequential: a new one starts only after the previous one failed
    /// and the delay elapsed. Exhaustion returns the last error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        let mut attempt = 1;

        loop {
            match op().await {
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };
    use tonic::Status;

    type Attempt = std::future::Ready<Result<&'static str, DispatchError>>;

    fn flaky(failures: u32, status: fn() -> Status) -> impl FnMut() -> Attempt {
        let calls = Arc::new(AtomicU32::new(0));
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < failures {
                Err(status().into())
            } else {
                Ok("done")
            })
        }
    }

    fn counted<F, T>(mut f: F, counter: Arc<AtomicU32>) -> impl FnMut() -> T
    where
        F: FnMut() -> T,
    {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            f()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_one_unavailable() {
        let invocations = Arc::new(AtomicU32::new(0));
        let op = counted(flaky(1, || Status::unavailable("down")), invocations.clone());

        let result = RetryPolicy::default().run(op).await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_attempts_with_503() {
        let invocations = Arc::new(AtomicU32::new(0));
        let op = counted(flaky(u32::MAX, || Status::unavailable("down")), invocations.clone());

        let err = RetryPolicy::default().run(op).await.unwrap_err();

        assert_eq!(err.http_status(), Some(503));
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn other_failures_are_returned_immediately() {
        let invocations = Arc::new(AtomicU32::new(0));
        let op = counted(flaky(u32::MAX, || Status::not_found("gone")), invocations.clone());

        let err = RetryPolicy::default().run(op).await.unwrap_err();

        assert_eq!(err.http_status(), Some(404));
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts() {
        let start = tokio::time::Instant::now();
        let op = flaky(2, || Status::unavailable("down"));

        RetryPolicy::default().run(op).await.unwrap();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(300), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_configurable() {
        let invocations = Arc::new(AtomicU32::new(0));
        let op = counted(flaky(u32::MAX, || Status::unavailable("down")), invocations.clone());

        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 5,
            ..RetryConfig::default()
        });
        assert!(policy.run(op).await.is_err());
        assert_eq!(invocations.load(Ordering::SeqCst), 5);

        let invocations = Arc::new(AtomicU32::new(0));
        let op = counted(flaky(u32::MAX, || Status::unavailable("down")), invocations.clone());
        assert!(RetryPolicy::new(RetryConfig::disabled()).run(op).await.is_err());
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(300),
            ..RetryConfig::default()
        };

        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(300));
        assert_eq!(config.delay_for(10), Duration::from_millis(300));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = RetryConfig {
            jitter: 0.5,
            ..RetryConfig::default()
        };

        for _ in 0..100 {
            let delay = config.delay_for(1);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn jitter_never_exceeds_the_cap() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(100),
            jitter: 1.0,
            ..RetryConfig::default()
        };

        for attempt in 1..=5 {
            for _ in 0..50 {
                assert!(config.delay_for(attempt) <= Duration::from_millis(100));
            }
        }
    }
}
