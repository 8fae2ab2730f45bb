//! Bounded retry with exponential backoff for transient broker failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{ExecutionError, FailureClass};

/// Retry settings for calls whose failure is not position-critical
/// (quote subscriptions, cancels of already-dead orders).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Jitter as a fraction of the delay, `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), without jitter.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(32) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor)
            .min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let range = base.as_secs_f64() * self.jitter.clamp(0.0, 1.0);
        if range <= 0.0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(-range..=range);
        Duration::from_secs_f64((base.as_secs_f64() + jitter).max(0.0))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are exhausted. The last error is returned.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, ExecutionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExecutionError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.class() == FailureClass::Retryable && attempt + 1 < attempts => {
                    let delay = self.delay(attempt);
                    debug!(what, attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %e, "Retrying broker call");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.class() == FailureClass::Retryable {
                        warn!(what, attempts, error = %e, "Broker call failed after retries");
                    }
                    return Err(e);
                }
            }
        }
    }
}
