use crate::config::BackendConfig;
use crate::error::BackendError;
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;

/// Bounded retry with exponential backoff for upstream calls
///
/// Every attempt is capped by `call_timeout`. Only transient failures
/// (unavailable, timed out) are retried; not-found, access-denied and API
/// errors return immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&BackendConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, call_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            call_timeout,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.retry_base_delay(),
            config.timeout(),
        )
    }

    /// Same timeout, no retries
    pub fn single_attempt(&self) -> Self {
        Self {
            max_attempts: 1,
            ..self.clone()
        }
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out
    ///
    /// # Arguments
    /// * `operation` - Name used in log lines
    /// * `call` - Produces a fresh future for every attempt
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 1;
        loop {
            debug!("{}: attempt {}/{}", operation, attempt, self.max_attempts);

            let outcome = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(BackendError::Timeout(self.call_timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {:?}",
                        operation, attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!("{} failed: {}", operation, e);
                    return Err(e);
                }
            }
        }
    }
}
