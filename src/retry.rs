use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or has been
/// tried `policy.max_attempts` times. `op` receives the 1-based attempt number.
/// Exhaustion wraps the last error in [`Error::Exhausted`].
pub async fn retry<T, F, Fut>(policy: RetryPolicy, operation: &'static str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) if attempt >= policy.max_attempts => {
                return Err(Error::Exhausted {
                    operation,
                    attempts: attempt,
                    source: Box::new(err),
                })
            }
            Err(err) => {
                warn!(operation, attempt, error = %err, "retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
