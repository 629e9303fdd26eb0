//! Bounded retry with exponential backoff.
//!
//! A small policy value object consumed by a generic [`with_retry`] helper,
//! shared by the model-service client and the blob-download step. The caller
//! supplies the transient/permanent classification as a predicate so each
//! operation can apply its own rules (extraction does not retry timeouts,
//! embedding does).

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Retry policy: bounded attempts with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Backoff multiplier applied per attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::defaults::MAX_RETRIES,
            base_delay: Duration::from_millis(crate::defaults::RETRY_BASE_DELAY_MS),
            multiplier: crate::defaults::RETRY_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier,
        }
    }

    /// Policy with no backoff delay (tests).
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, 1.0)
    }

    /// Backoff delay before the retry following `attempt` (1-based):
    /// `base_delay * multiplier^(attempt - 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        self.base_delay.mul_f64(factor)
    }
}

/// Run `op` under the retry policy.
///
/// Errors for which `is_retryable` returns false propagate immediately; on
/// exhausting all attempts, the last error (carrying its message) propagates.
pub async fn with_retry<T, F, Fut, P>(policy: &RetryPolicy, is_retryable: P, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&Error) -> bool,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                debug!(attempt, error = %e, "Giving up");
                return Err(e);
            }
        }
    }
}
