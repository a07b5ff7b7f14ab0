//! Bounded linear-backoff retry for rate-limited API calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::{ClientError, LorrgsError, LorrgsResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(15);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait after the n-th rate-limited attempt is `base_delay * n`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `op` until it succeeds, fails with a non-rate-limit error, or the
    /// attempts are used up.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> LorrgsResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limit() => {
                    if attempt < max_attempts {
                        let wait = self.delay_for(attempt);
                        warn!(
                            "Rate limit on {} (attempt {}/{}). Waiting {:?}...",
                            label, attempt, max_attempts, wait
                        );
                        tokio::time::sleep(wait).await;
                    } else {
                        warn!("Rate limit on {} (attempt {}/{}). Giving up.", label, attempt, max_attempts);
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(LorrgsError::RateLimitExhausted {
            attempts: max_attempts,
        })
    }
}
