//! Retry logic with exponential backoff for transient failures

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use squadnet_core::RetryPolicy;
use squadnet_telemetry::{NetEvent, TelemetryCollector};

/// Errors that can tell the retry engine whether another attempt is
/// worthwhile
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

/// Terminal outcome of a retried operation
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The operation failed on its last permitted attempt, or failed
    /// with a non-retryable error
    #[error("{0}")]
    Operation(E),

    /// Cancellation was observed before the next attempt
    #[error("Operation cancelled during retry")]
    Cancelled,
}

impl<E> RetryError<E> {
    /// The underlying operation error, if any
    pub fn into_operation(self) -> Option<E> {
        match self {
            Self::Operation(err) => Some(err),
            Self::Cancelled => None,
        }
    }
}

/// Drives an operation through bounded retries with jittered backoff
///
/// Only errors whose `is_retryable()` returns true trigger another
/// attempt; everything else propagates immediately. Sleeps are
/// cooperative and abort on cancellation.
#[derive(Clone)]
pub struct RetryEngine {
    policy: RetryPolicy,
    collector: Option<TelemetryCollector>,
}

impl RetryEngine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            collector: None,
        }
    }

    /// Attach a telemetry collector for `retry.attempt` events
    pub fn with_events(mut self, collector: TelemetryCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Backoff delay before retry `attempt` (1-indexed), without jitter
    pub fn base_delay(&self, attempt: usize) -> Duration {
        let exp = self.policy.base.powi(attempt.saturating_sub(1) as i32);
        let delay = self.policy.initial_delay().mul_f64(exp);
        delay.min(self.policy.max_delay())
    }

    fn jittered_delay(&self, attempt: usize) -> Duration {
        let delay = self.base_delay(attempt);
        if self.policy.jitter {
            let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }

    /// Run `operation` until it succeeds, exhausts its attempts, fails
    /// with a non-retryable error, or is cancelled
    pub async fn run<T, E, F, Fut>(
        &self,
        operation_name: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        E: RetryableError + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => {
                    tracing::debug!(
                        operation = operation_name,
                        %err,
                        "error is not retryable, propagating"
                    );
                    return Err(RetryError::Operation(err));
                }
                Err(err) if attempt == max_attempts => {
                    tracing::error!(
                        operation = operation_name,
                        attempts = max_attempts,
                        %err,
                        "operation failed after final attempt"
                    );
                    return Err(RetryError::Operation(err));
                }
                Err(err) => {
                    let delay = self.jittered_delay(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        %err,
                        "operation failed, retrying"
                    );
                    if let Some(collector) = &self.collector {
                        collector.emit(NetEvent::retry_attempted(
                            operation_name,
                            attempt,
                            delay.as_millis() as u64,
                        ));
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        // max_attempts >= 1, so the loop always returns
        unreachable!("retry loop exited without a result")
    }
}
