// Timeout, rate limiting and exponential backoff for external step calls
//
// Only the external call is retried. State is written once, after the call
// succeeds, so a failed call never leaves a partial document behind.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, error, warn};

use crate::config::UpstreamConfig;
use crate::upstream::UpstreamError;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Per-attempt timeout
    pub timeout: Duration,
    pub jitter: bool,
    /// Zero disables rate limiting
    pub requests_per_second: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            timeout: Duration::from_secs(30),
            jitter: true,
            requests_per_second: 0,
        }
    }
}

impl From<&UpstreamConfig> for RetryConfig {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            jitter: config.jitter,
            requests_per_second: config.requests_per_second,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamExecutor {
    config: RetryConfig,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl Default for UpstreamExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl UpstreamExecutor {
    pub fn new(config: RetryConfig) -> Self {
        let limiter = NonZeroU32::new(config.requests_per_second)
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        Self { config, limiter }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `call` with a per-attempt timeout, retrying transient failures with
    /// exponential backoff until `max_attempts` is reached.
    pub async fn call<F, Fut, T>(&self, operation: &str, mut call: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let jitter_enabled = self.config.jitter;
        // from_millis(2) doubles each step; the factor scales the first delay to base_delay
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(backoff_factor(self.config.base_delay))
            .max_delay(self.config.max_delay)
            .map(move |delay| if jitter_enabled { jitter(delay) } else { delay })
            .take(self.config.max_attempts.saturating_sub(1) as usize);

        let timeout = self.config.timeout;
        let operation_id = uuid::Uuid::new_v4();
        let mut attempts = 0u32;

        debug!(
            operation = %operation,
            operation_id = %operation_id,
            max_attempts = self.config.max_attempts,
            "Starting upstream call"
        );

        let result = RetryIf::start(
            strategy,
            || {
                attempts += 1;
                let attempt = attempts;
                let pending = call();
                let limiter = self.limiter.clone();
                async move {
                    if let Some(limiter) = limiter {
                        limiter.until_ready().await;
                    }
                    match tokio::time::timeout(timeout, pending).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => {
                            warn!(operation = %operation, attempt, error = %e.summary(), "Upstream attempt failed");
                            Err(e)
                        }
                        Err(_) => {
                            warn!(operation = %operation, attempt, "Upstream attempt timed out");
                            Err(UpstreamError::Timeout {
                                operation: operation.to_string(),
                                duration_ms: timeout.as_millis() as u64,
                            })
                        }
                    }
                }
            },
            |e: &UpstreamError| e.is_retryable(),
        )
        .await;

        match &result {
            Ok(_) => debug!(operation = %operation, operation_id = %operation_id, attempts, "Upstream call succeeded"),
            Err(e) => error!(
                operation = %operation,
                operation_id = %operation_id,
                attempts,
                retryable = e.is_retryable(),
                error = %e.summary(),
                "Upstream call failed"
            ),
        }
        result
    }
}

fn backoff_factor(base_delay: Duration) -> u64 {
    (base_delay.as_millis() as u64 / 2).max(1)
}
