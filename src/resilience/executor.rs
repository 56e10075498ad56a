//! Resilient executor.
//!
//! Runs one logical `url -> body` call through three stages, outermost first:
//!
//! ```text
//! breaker gate  → fail fast while open, no retry consumed
//!   retry loop  → up to 1 + max_retries attempts, exponential backoff
//!     timeout   → every raw attempt bounded by request_timeout
//! ```
//!
//! The breaker is consulted and updated once per raw attempt, so failed
//! attempts inside a retry sequence advance its failure counter. After a
//! successful call the rate-limit delay runs once before the body is returned.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ExecutorConfig;
use crate::error::{Error, Result, TransportError};
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::transport::{Response, Transport};
use crate::telemetry::{Telemetry, TelemetryEvent, TracingTelemetry};

/// Classifies a response the upstream actually returned.
pub type ResponsePredicate = Arc<dyn Fn(&Response) -> bool + Send + Sync>;

/// Retry + circuit breaker around a [`Transport`].
pub struct ResilientExecutor {
    config: ExecutorConfig,
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
    is_success: ResponsePredicate,
    is_breaker_failure: ResponsePredicate,
}

/// Builder for [`ResilientExecutor`].
pub struct ExecutorBuilder {
    config: ExecutorConfig,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
    is_success: ResponsePredicate,
    is_breaker_failure: ResponsePredicate,
}

impl ExecutorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Which responses end the retry loop successfully. Default: 2xx.
    pub fn success_predicate(
        mut self,
        predicate: impl Fn(&Response) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_success = Arc::new(predicate);
        self
    }

    /// Which responses count against the breaker. Default: 5xx.
    ///
    /// Transport errors and timeouts always count. Responses not matched here
    /// are recorded as successes by the breaker, even if the retry loop
    /// rejects them.
    pub fn breaker_failure_predicate(
        mut self,
        predicate: impl Fn(&Response) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_breaker_failure = Arc::new(predicate);
        self
    }

    pub fn build(self) -> Result<ResilientExecutor> {
        self.config.validate()?;
        let breaker = CircuitBreaker::new(
            self.config.failure_threshold,
            self.config.break_duration,
            Arc::clone(&self.clock),
            Arc::clone(&self.telemetry),
        )?;

        Ok(ResilientExecutor {
            config: self.config,
            transport: self.transport,
            breaker,
            clock: self.clock,
            telemetry: self.telemetry,
            is_success: self.is_success,
            is_breaker_failure: self.is_breaker_failure,
        })
    }
}

impl ResilientExecutor {
    /// Starts a builder with the system clock, tracing telemetry and default predicates.
    pub fn builder(config: ExecutorConfig, transport: Arc<dyn Transport>) -> ExecutorBuilder {
        ExecutorBuilder {
            config,
            transport,
            clock: Arc::new(SystemClock),
            telemetry: Arc::new(TracingTelemetry),
            is_success: Arc::new(Response::is_success),
            is_breaker_failure: Arc::new(Response::is_server_error),
        }
    }

    pub fn new(config: ExecutorConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::builder(config, transport).build()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Fetches `url`, returning the body of the first successful attempt.
    pub async fn execute(&self, url: &str) -> Result<String> {
        self.execute_with_cancel(url, &CancellationToken::new()).await
    }

    /// Like [`execute`](Self::execute), aborting when `cancel` fires.
    ///
    /// Cancellation is honoured before every attempt and every backoff delay,
    /// and interrupts an in-flight attempt or delay. An interrupted attempt is
    /// not reported to the breaker.
    pub async fn execute_with_cancel(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt: u32 = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let permit = self.breaker.try_acquire().inspect_err(|_| {
                warn!(url, attempt, "Circuit breaker open, request short-circuited");
            })?;

            debug!(
                url,
                attempt,
                probe = permit.is_probe(),
                "Attempting upstream request"
            );
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = self.attempt(url) => Some(outcome),
            };
            let Some(outcome) = outcome else {
                self.breaker.release(permit);
                return Err(Error::Cancelled);
            };

            match &outcome {
                Ok(response) if !(self.is_breaker_failure)(response) => {
                    self.breaker.on_success(permit)
                }
                _ => self.breaker.on_failure(permit),
            }

            let failure = match outcome {
                Ok(response) if (self.is_success)(&response) => {
                    self.rate_limit().await;
                    return Ok(response.body);
                }
                Ok(response) => TransportError::Status {
                    status: response.status,
                    body: response.body,
                },
                Err(err) => err,
            };

            if attempt >= max_attempts {
                error!(url, attempts = attempt, error = %failure, "HTTP request failed after retries");
                return Err(Error::RequestFailed {
                    attempts: attempt,
                    source: failure,
                });
            }

            debug!(url, attempt, error = %failure, "Attempt failed");

            // Don't pay for a backoff the breaker would reject anyway
            self.breaker.check()?;
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let delay = calculate_backoff(attempt, self.config.base_delay);
            self.telemetry.record(&TelemetryEvent::RetryAttempt { attempt, delay });
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = self.clock.sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    async fn attempt(&self, url: &str) -> std::result::Result<Response, TransportError> {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, self.transport.send(url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    async fn rate_limit(&self) {
        let delay = self.config.request_delay;
        if delay.is_zero() {
            return;
        }
        self.telemetry.record(&TelemetryEvent::RateLimitDelay { delay });
        self.clock.sleep(delay).await;
    }
}

impl std::fmt::Debug for ResilientExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientExecutor")
            .field("config", &self.config)
            .field("breaker", &self.breaker)
            .finish()
    }
}
