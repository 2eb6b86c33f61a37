//! Bounded retry with exponential backoff.
//!
//! Every external call in the pipeline (source poll, analysis call, delivery
//! send) goes through [`RetryPolicy::run`]. The attempt budget and backoff
//! schedule are explicit parameters, and only errors the taxonomy marks
//! retryable are attempted again; everything else returns immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::error::PipelineError;

/// Retry schedule: up to `max_attempts` tries, with
/// `backoff_base * 2^(n-2)` slept before attempt `n` (none before the first),
/// capped at `backoff_base * 32`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_secs(config.backoff_base_secs),
        )
    }

    /// Delay slept before the given 1-based attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff_base * (1 << (attempt - 2).min(5))
        }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is exhausted. The closure receives the 1-based attempt
    /// number.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, PipelineError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let mut attempt = 1;
        loop {
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        what,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
