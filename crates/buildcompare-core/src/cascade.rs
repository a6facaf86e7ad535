//! Ordered fallback over upstream candidates.
//!
//! A cascade tries each candidate (a model id, a backend tier) strictly in
//! list order. Every attempt runs under the cascade's timeout; an attempt
//! that overruns is dropped and counted as a transient timeout. Transient
//! failures move on to the next candidate, a fatal failure stops the run, and
//! the first success wins.
//!
//! ```rust,ignore
//! let cascade = ProviderCascade::new(Duration::from_secs(20));
//! let success = cascade
//!     .run(&models, |model| async move {
//!         CascadeOutcome::from(provider.complete(model, &request).await)
//!     })
//!     .await?;
//! println!("answered by {}", success.candidate);
//! ```

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::circuit_breaker::BreakerRegistry;
use crate::upstream::{FailureClass, UpstreamError};

/// Result of a single attempt against one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeOutcome<T> {
    Success(T),
    TransientFailure(UpstreamError),
    FatalFailure(UpstreamError),
}

impl<T> From<Result<T, UpstreamError>> for CascadeOutcome<T> {
    fn from(result: Result<T, UpstreamError>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(error) => match error.class() {
                FailureClass::Transient => Self::TransientFailure(error),
                FailureClass::Fatal => Self::FatalFailure(error),
            },
        }
    }
}

/// One failed attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeFailure {
    pub candidate: String,
    pub error: UpstreamError,
}

/// Successful cascade run.
#[derive(Debug, Clone)]
pub struct CascadeSuccess<T> {
    pub payload: T,
    pub candidate: String,
    /// Failures observed before the winning candidate, in order.
    pub failures: Vec<CascadeFailure>,
    pub latency_ms: u64,
}

impl<T> CascadeSuccess<T> {
    pub fn fell_back(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Error)]
pub enum CascadeError {
    /// A candidate failed in a way no other candidate can fix.
    #[error("candidate '{candidate}' failed fatally: {error}")]
    Fatal {
        candidate: String,
        error: UpstreamError,
        failures: Vec<CascadeFailure>,
    },

    /// Every candidate failed transiently.
    #[error("all {} candidate(s) failed", .failures.len())]
    Exhausted {
        failures: Vec<CascadeFailure>,
        last: Option<UpstreamError>,
    },
}

impl CascadeError {
    pub fn failures(&self) -> &[CascadeFailure] {
        match self {
            Self::Fatal { failures, .. } | Self::Exhausted { failures, .. } => failures,
        }
    }

    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    /// The error that ended the run.
    pub fn last_error(&self) -> Option<&UpstreamError> {
        match self {
            Self::Fatal { error, .. } => Some(error),
            Self::Exhausted { last, .. } => last.as_ref(),
        }
    }
}

/// Sequential fallback executor with a per-attempt timeout.
#[derive(Debug, Clone)]
pub struct ProviderCascade {
    attempt_timeout: Duration,
    breakers: Option<Arc<BreakerRegistry>>,
}

impl ProviderCascade {
    pub fn new(attempt_timeout: Duration) -> Self {
        Self {
            attempt_timeout,
            breakers: None,
        }
    }

    /// Skips candidates whose breaker is open. Off unless set.
    pub fn with_breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    pub const fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Runs `attempt` against each candidate in order until one succeeds.
    pub async fn run<C, T, F, Fut>(
        &self,
        candidates: &[C],
        mut attempt: F,
    ) -> Result<CascadeSuccess<T>, CascadeError>
    where
        C: Display,
        F: FnMut(&C) -> Fut,
        Fut: Future<Output = CascadeOutcome<T>>,
    {
        let started = Instant::now();
        let mut failures: Vec<CascadeFailure> = Vec::new();

        for candidate in candidates {
            let name = candidate.to_string();
            let breaker = self.breakers.as_ref().map(|registry| registry.breaker(&name));

            if breaker.as_ref().is_some_and(|breaker| !breaker.allow_request()) {
                tracing::debug!(candidate = %name, "circuit open, skipping candidate");
                failures.push(CascadeFailure {
                    candidate: name,
                    error: UpstreamError::unavailable("circuit open"),
                });
                continue;
            }

            let outcome = match tokio::time::timeout(self.attempt_timeout, attempt(candidate)).await {
                Ok(outcome) => outcome,
                Err(_) => CascadeOutcome::TransientFailure(UpstreamError::timeout("timeout")),
            };

            match outcome {
                CascadeOutcome::Success(payload) => {
                    if let Some(breaker) = &breaker {
                        breaker.record_success();
                    }
                    if !failures.is_empty() {
                        tracing::info!(
                            candidate = %name,
                            failed_attempts = failures.len(),
                            "cascade fallback succeeded"
                        );
                    }
                    return Ok(CascadeSuccess {
                        payload,
                        candidate: name,
                        failures,
                        latency_ms: elapsed_ms(started),
                    });
                }
                CascadeOutcome::TransientFailure(error) => {
                    if let Some(breaker) = &breaker {
                        breaker.record_failure();
                    }
                    tracing::warn!(candidate = %name, error = %error, "candidate failed, trying next");
                    failures.push(CascadeFailure {
                        candidate: name,
                        error,
                    });
                }
                CascadeOutcome::FatalFailure(error) => {
                    if let Some(breaker) = &breaker {
                        breaker.record_failure();
                    }
                    tracing::warn!(candidate = %name, error = %error, "candidate failed fatally, aborting cascade");
                    return Err(CascadeError::Fatal {
                        candidate: name,
                        error,
                        failures,
                    });
                }
            }
        }

        let last = failures.last().map(|failure| failure.error.clone());
        Err(CascadeError::Exhausted { failures, last })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
