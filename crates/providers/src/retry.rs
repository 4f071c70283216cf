//! Retrying provider: bounded retry with linear backoff.
//!
//! Wraps any provider and re-issues a request when the failure is transient
//! (network error, timeout, HTTP 5xx). Terminal failures (4xx, malformed or
//! API-reported errors) are returned on the spot.
//!
//! The backoff between attempt `i` and `i + 1` is `i * base_delay`, with no
//! jitter. Waits race a [`CancellationToken`], so a caller deadline is
//! observed mid-sleep rather than after it.

use async_trait::async_trait;
use loglens_core::error::ProviderError;
use loglens_core::provider::*;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// A provider that retries transient failures of an inner provider.
pub struct RetryingProvider {
    name: String,
    inner: Arc<dyn Provider>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn Provider>, policy: RetryPolicy) -> Self {
        Self {
            name: format!("{}+retry", inner.name()),
            inner,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop retrying (and abandon in-flight requests) once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

impl fmt::Debug for RetryingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingProvider")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[async_trait]
impl Provider for RetryingProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            if self.cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ProviderError::Cancelled),
                result = self.inner.complete(request.clone()) => result,
            };

            let error = match result {
                Ok(response) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), attempt, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            if attempt >= self.policy.max_attempts {
                warn!(
                    provider = %self.inner.name(),
                    attempts = attempt,
                    error = %error,
                    "Retries exhausted"
                );
                return Err(ProviderError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                provider = %self.inner.name(),
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient provider failure, backing off"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
