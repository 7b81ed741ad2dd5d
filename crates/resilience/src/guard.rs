use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::{CircuitBreaker, CircuitBreakerConfig, CircuitState, IsTransient, RetryPolicy};

/// Policy for one collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardConfig {
    pub breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
    /// Bound on a single attempt; an attempt that runs over counts as a failure.
    pub call_timeout: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            breaker: CircuitBreakerConfig::default(),
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(2),
        }
    }
}

/// Why a guarded call did not produce a value.
#[derive(Debug, Error)]
pub enum GuardError<E> {
    /// The breaker refused the call.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The last attempt ran over the call timeout.
    #[error("call timed out after {timeout:?} ({attempts} attempts)")]
    Timeout { timeout: Duration, attempts: u32 },

    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// The collaborator gave a definitive answer.
    #[error("{0}")]
    Rejected(E),
}

impl<E> GuardError<E> {
    /// True when the collaborator could not be reached in time, as opposed
    /// to answering with an error of its own.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, GuardError::Rejected(_))
    }
}

enum Failure<E> {
    Error(E),
    Timeout,
}

/// Circuit breaker, retry and timeout applied together around one collaborator.
///
/// Retry is the outer loop: every attempt asks the breaker for admission, so
/// a breaker that opens mid-retry stops the remaining attempts.
#[derive(Clone)]
pub struct Guard {
    name: Arc<str>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl Guard {
    pub fn new(name: impl Into<Arc<str>>, config: GuardConfig) -> Self {
        let name = name.into();
        Self {
            breaker: CircuitBreaker::new(Arc::clone(&name), config.breaker),
            name,
            retry: config.retry,
            call_timeout: config.call_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Runs `attempt` under the guard, building a fresh future per attempt.
    pub async fn call<T, E, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: IsTransient + std::fmt::Display,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let Some(permit) = self.breaker.try_acquire() else {
                tracing::debug!(breaker = %self.name, operation, "call short-circuited");
                metrics::counter!(
                    "circuit_breaker_short_circuits_total",
                    "breaker" => self.name.to_string()
                )
                .increment(1);
                return Err(GuardError::CircuitOpen);
            };

            let failure = match tokio::time::timeout(self.call_timeout, attempt()).await {
                Ok(Ok(value)) => {
                    permit.success();
                    return Ok(value);
                }
                Ok(Err(err)) if !err.is_transient() => {
                    // A definitive answer means the collaborator is healthy.
                    permit.success();
                    return Err(GuardError::Rejected(err));
                }
                Ok(Err(err)) => {
                    permit.failure();
                    Failure::Error(err)
                }
                Err(_) => {
                    permit.failure();
                    Failure::Timeout
                }
            };

            if attempts >= self.retry.max_attempts {
                tracing::warn!(breaker = %self.name, operation, attempts, "retries exhausted");
                return Err(match failure {
                    Failure::Error(last_error) => GuardError::Exhausted {
                        attempts,
                        last_error,
                    },
                    Failure::Timeout => GuardError::Timeout {
                        timeout: self.call_timeout,
                        attempts,
                    },
                });
            }

            let delay = self.retry.delay_for_attempt(attempts);
            match &failure {
                Failure::Error(err) => tracing::warn!(
                    breaker = %self.name,
                    operation,
                    attempt = attempts,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying"
                ),
                Failure::Timeout => tracing::warn!(
                    breaker = %self.name,
                    operation,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "attempt timed out, retrying"
                ),
            }
            metrics::counter!(
                "collaborator_retries_total",
                "breaker" => self.name.to_string(),
                "operation" => operation
            )
            .increment(1);

            tokio::time::sleep(delay).await;
        }
    }
}
