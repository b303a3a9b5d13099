//! Bounded exponential-backoff retry
//!
//! Wraps a single operation. Transient failures (see
//! [`crate::domain::DistributorError::is_transient`]) are retried after
//! `initial_delay * backoff_coefficient^(attempt - 1)`, capped at `max_delay`,
//! until `max_attempts` have been made; the last error is then returned.
//! Permanent failures are returned immediately.

use crate::config::RetryConfig;
use crate::domain::{Result, ServiceError};
use crate::log_retry_attempt;
use std::future::Future;
use std::time::Duration;

/// Retry policy parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_coefficient: f64,
    pub max_delay: Duration,
    /// Upper bound on a single attempt; a timed-out attempt counts as transient
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_coefficient: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_coefficient,
            max_delay: Duration::from_secs(300),
            attempt_timeout: None,
        }
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Delay slept after failed attempt number `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.backoff_coefficient.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Sum of the delays slept when the first `failures` attempts fail
    pub fn total_backoff(&self, failures: u32) -> Duration {
        (1..=failures).map(|a| self.delay_for_attempt(a)).sum()
    }

    /// Run `operation` under this policy
    ///
    /// `operation_name` labels logs and timeout errors.
    pub async fn execute<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, operation()).await {
                    Ok(result) => result,
                    Err(_) => Err(ServiceError::Timeout {
                        service: operation_name.to_string(),
                        message: format!("attempt {attempt} exceeded {}ms", limit.as_millis()),
                    }
                    .into()),
                },
                None => operation().await,
            };

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(
                            operation = operation_name,
                            attempt = attempt,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    tracing::warn!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %e,
                        "Retry attempts exhausted"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for_attempt(attempt);
                    log_retry_attempt!(attempt + 1, self.max_attempts, operation_name, &e);
                    tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let policy = RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            config.backoff_coefficient,
        )
        .with_max_delay(Duration::from_millis(config.max_delay_ms));

        if config.attempt_timeout_ms > 0 {
            policy.with_attempt_timeout(Duration::from_millis(config.attempt_timeout_ms))
        } else {
            policy
        }
    }
}
