//! Exponential backoff for rate-limited requests.

use std::future::Future;
use std::time::Duration;

use raster_common::RasterResult;
use tracing::warn;

use crate::config::RetryConfig;

/// Retries an operation while it fails with `RateLimited`.
///
/// Every other error is returned immediately. The delay before retry `n`
/// is `initial_delay * 2^(n-1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.initial_delay(), config.max_attempts)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempts are used up. The last error is returned as-is.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> RasterResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RasterResult<T>>,
    {
        let mut attempt = 1;
        let mut delay = self.initial_delay;

        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limited() && attempt < self.max_attempts => {
                    warn!(
                        operation = operation,
                        error = %e,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, retrying"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
