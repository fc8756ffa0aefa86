//! Retry-with-backoff helper shared by both gateways

use std::future::Future;
use std::time::Duration;

/// Delay schedule between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `retry * step` before retry number `retry` (1-based)
    Linear(Duration),
    /// Same delay before every retry
    Fixed(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Single attempt, no retries
    pub const fn none() -> Self {
        Self::new(0, Backoff::Fixed(Duration::ZERO))
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Linear(step) => step.saturating_mul(retry),
            Backoff::Fixed(delay) => delay,
        }
    }
}

/// Why [`retry_with_backoff`] gave up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Error the predicate classified as not retryable
    Permanent(E),
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: E },
}

/// Run `op` until it succeeds, fails permanently, or the policy runs out
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(RetryError::Permanent(e)),
            Err(e) if attempt >= policy.max_retries => {
                return Err(RetryError::Exhausted {
                    attempts: attempt + 1,
                    last: e,
                });
            }
            Err(e) => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Remote call failed, retrying: {e}"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
