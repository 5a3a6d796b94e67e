//! Per-adapter retry with exponential backoff
//!
//! Re-sends a request only after transport failures (network errors and
//! per-attempt timeouts). Rate limits and provider outages are returned to the
//! router, which decides whether to move on to a fallback provider.
//!
//! - Exponential backoff with up to 10% jitter
//! - Per-attempt timeout and total operation budget
//! - Cancellation checked before, during and between attempts

use crate::error::{LlmError, LlmResult};
use crate::logging::{log_debug, log_error};

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Retry policy configuration for LLM requests
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum total operation time
    pub total_timeout: Duration,
    /// Request timeout for individual attempts
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(16),
            backoff_multiplier: 2.0,
            total_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Executes an operation under a [`RetryPolicy`].
///
/// Holds no state between calls, so one executor is shared by every request
/// an adapter serves.
#[derive(Debug, Clone)]
pub(crate) struct RetryExecutor {
    pub(crate) policy: RetryPolicy,
    provider: String,
}

impl RetryExecutor {
    pub fn new(provider: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            policy,
            provider: provider.into(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.policy.request_timeout
    }

    /// Run `operation` until it succeeds, fails with a non-transport error,
    /// or the attempt budget is used up.
    pub async fn execute<F, Fut, T>(
        &self,
        cancel: Option<&CancellationToken>,
        operation: F,
    ) -> LlmResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = LlmResult<T>>,
    {
        let start_time = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.check_cancelled(cancel)?;

            log_debug!(
                provider = %self.provider,
                attempt = attempt,
                max_attempts = max_attempts,
                "Executing request"
            );

            let error = match self.run_attempt(cancel, &operation).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            let budget_left = start_time.elapsed() < self.policy.total_timeout;
            if !Self::should_retry_error(&error) || attempt >= max_attempts || !budget_left {
                if attempt > 1 {
                    log_error!(
                        provider = %self.provider,
                        attempts = attempt,
                        total_duration_ms = start_time.elapsed().as_millis(),
                        error = %error,
                        "Request failed after retry attempts"
                    );
                }
                return Err(error);
            }

            let delay = self.calculate_delay(attempt);
            log_debug!(
                provider = %self.provider,
                attempt = attempt,
                delay_ms = delay.as_millis(),
                error = %error,
                "Request failed, retrying after delay"
            );
            self.backoff(cancel, delay).await?;
        }
    }

    async fn run_attempt<F, Fut, T>(
        &self,
        cancel: Option<&CancellationToken>,
        operation: &F,
    ) -> LlmResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = LlmResult<T>>,
    {
        let timed = tokio::time::timeout(self.policy.request_timeout, operation());
        let result = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(LlmError::cancelled(&self.provider)),
                result = timed => result,
            },
            None => timed.await,
        };

        result.unwrap_or_else(|_elapsed| {
            Err(LlmError::timeout(
                &self.provider,
                self.policy.request_timeout.as_secs(),
            ))
        })
    }

    async fn backoff(&self, cancel: Option<&CancellationToken>, delay: Duration) -> LlmResult<()> {
        match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(LlmError::cancelled(&self.provider)),
                _ = sleep(delay) => Ok(()),
            },
            None => {
                sleep(delay).await;
                Ok(())
            }
        }
    }

    fn check_cancelled(&self, cancel: Option<&CancellationToken>) -> LlmResult<()> {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(LlmError::cancelled(&self.provider));
        }
        Ok(())
    }

    /// Only transport failures are re-sent to the same provider.
    pub fn should_retry_error(error: &LlmError) -> bool {
        matches!(error, LlmError::Network { .. } | LlmError::Timeout { .. })
    }

    /// Calculate delay for exponential backoff
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_seconds =
            self.policy.initial_delay.as_secs_f64() * self.policy.backoff_multiplier.powi(exponent);

        let delay = Duration::from_secs_f64(delay_seconds.min(self.policy.max_delay.as_secs_f64()));

        // Up to 10% jitter
        let jitter = fastrand::f64() * 0.1;
        Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter))
    }
}
