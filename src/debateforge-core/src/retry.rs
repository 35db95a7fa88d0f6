//! Retry policies and the sleep seam they wait through.
//!
//! Two independent policies are used by the pipeline: the transport policy
//! inside [`GenerationClient`](crate::client::GenerationClient) (plain
//! exponential) and the generation policy inside the orchestrator
//! (exponential plus jitter). Both wait through a [`Sleeper`] so tests can
//! record the schedule instead of sleeping.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

/// Something that can pause the current task.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Random addition to a computed delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Jitter {
    None,
    /// Uniform in `[0, max)`.
    Uniform(Duration),
}

impl Jitter {
    pub fn sample(&self) -> Duration {
        match self {
            Jitter::None => Duration::ZERO,
            Jitter::Uniform(max) if max.is_zero() => Duration::ZERO,
            Jitter::Uniform(max) => {
                let fraction: f64 = rand::rng().random_range(0.0..1.0);
                max.mul_f64(fraction)
            }
        }
    }

    /// `base` plus one jitter sample.
    pub fn apply(&self, base: Duration) -> Duration {
        base + self.sample()
    }
}

/// Bounded retry with `delay = base * 2^attempt + jitter`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base: Duration,
    pub jitter: Jitter,
}

impl RetryPolicy {
    pub fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
            jitter: Jitter::None,
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Wait before retrying after the zero-based `attempt` failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.jitter.apply(self.base.saturating_mul(factor))
    }

    /// Run `op` until it succeeds, `should_retry` rejects the error, or the
    /// attempts are used up. `op` receives the zero-based attempt number.
    pub async fn run<T, E, F, Fut, S>(
        &self,
        sleeper: &S,
        label: &str,
        should_retry: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        S: Sleeper + ?Sized,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt + 1 < self.max_attempts && should_retry(&err) => {
                    let wait = self.delay(attempt);
                    warn!(
                        %label,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        wait_secs = wait.as_secs_f64(),
                        error = %err,
                        "attempt failed, retrying"
                    );
                    sleeper.sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSleeper;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_schedule_without_jitter() {
        let policy = RetryPolicy::exponential(5, Duration::from_secs(1));
        let delays: Vec<_> = (0..4).map(|a| policy.delay(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = RetryPolicy::exponential(5, Duration::from_secs(1))
            .with_jitter(Jitter::Uniform(Duration::from_secs(1)));
        for attempt in 0..4 {
            let base = Duration::from_secs(1 << attempt);
            for _ in 0..50 {
                let delay = policy.delay(attempt);
                assert!(delay >= base && delay < base + Duration::from_secs(1));
            }
        }
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::exponential(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_run_gives_up_after_max_attempts() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::exponential(3, Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy
            .run(&sleeper, "test", |_| true, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom".to_string()) }
            })
            .await;

        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_non_retryable_error() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::exponential(5, Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy
            .run(&sleeper, "test", |e: &String| e != "fatal", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal".to_string()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_run_returns_first_success() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::exponential(5, Duration::from_secs(1));

        let result: Result<u32, String> = policy
            .run(&sleeper, "test", |_| true, |attempt| async move {
                if attempt < 2 {
                    Err(format!("fail {attempt}"))
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(sleeper.recorded().len(), 2);
    }
}
