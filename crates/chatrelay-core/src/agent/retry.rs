//! Bounded retry policy for agent runs.
//!
//! Each attempt reports an [`AttemptError`] on failure. `Transient` and
//! `Validation` failures are retried after an exponential backoff; `Fatal`
//! failures are returned immediately. Attempts run strictly one after another
//! and the wait suspends the task with `tokio::time::sleep`.
//!
//! ```ignore
//! let mut retry = policy.start();
//! loop {
//!     match attempt().await {
//!         Ok(value) => return Ok((value, retry.retries())),
//!         Err(err) => retry.on_failure(err).await?,
//!     }
//! }
//! ```

use std::time::Duration;

use chatrelay_types::config::RetryConfig;
use chatrelay_types::error::AgentError;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a single attempt failed, and therefore whether it may be retried.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Rate limited, transiently absent, or a remote HTTP failure.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The reply was structurally wrong (e.g. authored by another agent).
    #[error("validation failure: {0}")]
    Validation(String),

    /// Anything else; never retried.
    #[error(transparent)]
    Fatal(AgentError),
}

/// Attempt cap and exponential backoff bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: f64,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            multiplier: 1.0,
            min_wait: Duration::from_secs(6),
            max_wait: Duration::from_secs(10),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let defaults = RetryPolicy::default();
        Self {
            max_attempts: config.max_attempts.max(1),
            multiplier: config.multiplier,
            min_wait: Duration::try_from_secs_f64(config.min_wait_secs).unwrap_or(defaults.min_wait),
            max_wait: Duration::try_from_secs_f64(config.max_wait_secs).unwrap_or(defaults.max_wait),
        }
    }
}

impl RetryPolicy {
    /// Wait after the 1-based `attempt` failed:
    /// `multiplier * 2^(attempt-1)` seconds, clamped to `[min_wait, max_wait]`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = (self.multiplier * 2f64.powi(exponent))
            .min(self.max_wait.as_secs_f64())
            .max(self.min_wait.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_wait)
    }

    /// Begin a fresh sequence of attempts.
    pub fn start(&self) -> Retrying {
        Retrying {
            policy: self.clone(),
            attempt: 1,
        }
    }
}

/// Attempt counter for one retried operation.
#[derive(Debug)]
pub struct Retrying {
    policy: RetryPolicy,
    attempt: u32,
}

impl Retrying {
    /// The current attempt, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Attempts consumed before the current one.
    pub fn retries(&self) -> u32 {
        self.attempt - 1
    }

    /// Record a failed attempt.
    ///
    /// Returns `Ok(())` after sleeping when another attempt is allowed.
    /// Returns the fatal error unchanged, or `RetriesExhausted` once the
    /// attempt cap is reached.
    pub async fn on_failure(&mut self, error: AttemptError) -> Result<(), AgentError> {
        let reason = match error {
            AttemptError::Fatal(err) => return Err(err),
            retryable => retryable.to_string(),
        };

        if self.attempt >= self.policy.max_attempts.max(1) {
            warn!(attempts = self.attempt, error = %reason, "retry attempts exhausted");
            return Err(AgentError::RetriesExhausted {
                attempts: self.attempt,
                last_error: reason,
            });
        }

        let wait = self.policy.backoff(self.attempt);
        debug!(
            attempt = self.attempt,
            wait_ms = wait.as_millis() as u64,
            error = %reason,
            "attempt failed, backing off"
        );
        tokio::time::sleep(wait).await;
        self.attempt += 1;
        Ok(())
    }
}
