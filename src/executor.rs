use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::Error;
use crate::transport::{GraphQlRequest, Transport};

/// Configuration for the request executor retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts per request. Zero is treated as one.
    pub retry_attempts: u32,
    /// Base backoff. The delay after failed attempt `k` is `backoff_unit * 2^k`.
    pub backoff_unit: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the failed attempt with the given 0-based index.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Source of the delay between retry attempts.
pub trait Delay: Send + Sync {
    /// Returns a future that completes after `duration`.
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// Waits on the tokio timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioDelay;

impl Delay for TokioDelay {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Wraps a [`Transport`] and retries every failed request with exponential backoff.
///
/// All failures are retried, including errors reported by the server.
/// The executor holds no state between calls.
#[derive(Clone)]
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    config: RetryConfig,
    delay: Arc<dyn Delay>,
}

impl RequestExecutor {
    /// Creates a new executor with the given transport and configuration.
    pub fn new(transport: Arc<dyn Transport>, config: RetryConfig) -> Self {
        Self {
            transport,
            config,
            delay: Arc::new(TokioDelay),
        }
    }

    /// Creates a new executor with default configuration.
    pub fn new_with_default_config(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, RetryConfig::default())
    }

    /// Replaces the delay used between attempts.
    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Gets the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Executes the request, returning the raw `data` object of the first successful attempt.
    /// Fails with [`Error::QueryExecution`] wrapping the last failure once all attempts are used.
    pub async fn execute(&self, request: &GraphQlRequest) -> Result<Value, Error> {
        let max_attempts = self.config.retry_attempts.max(1);
        let mut attempt = 0;

        loop {
            let err = match self.transport.execute(request).await {
                Ok(data) => return Ok(data),
                Err(e) => e,
            };
            attempt += 1;

            if attempt >= max_attempts {
                log::warn!(
                    "{} failed after {max_attempts} attempts: {err}",
                    request.name
                );
                return Err(Error::QueryExecution {
                    request: request.name,
                    attempts: attempt,
                    source: err,
                });
            }

            let backoff = self.config.backoff(attempt - 1);
            log::debug!(
                "{} failed (attempt {attempt}/{max_attempts}): {err}. Retrying in {backoff:?}...",
                request.name
            );
            self.delay.sleep(backoff).await;
        }
    }
}
