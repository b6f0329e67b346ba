//! Retry policy for the remote storage steps.
//!
//! Directory creation and upload must succeed before the sweep moves on.
//! The policy decides how long to keep trying; the sweep never advances
//! past a step that did not succeed.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::cancel::Cancellation;
use crate::error::{Result, SweepError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// `None` keeps trying until success or cancellation.
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Failed attempts after which each further failure is logged as an error.
    pub escalate_after: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: Some(20),
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            escalate_after: 5,
        }
    }
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        RetryPolicy {
            max_attempts: None,
            ..Self::default()
        }
    }

    /// Delay before the attempt following failure number `failures` (1-based).
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(63) as i32;
        let millis = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        Duration::from_millis(millis.min(self.max_delay_ms as f64) as u64)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_attempts == Some(0) {
            return Err("retry.max_attempts must be at least 1 (omit it for unbounded)".into());
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.multiplier
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err("retry.max_delay_ms must not be below retry.initial_delay_ms".into());
        }
        Ok(())
    }
}

/// Run `op` until it reports success.
///
/// `op` returns `Ok(true)` on success and `Ok(false)` for a retryable failure.
/// An `Err` is not retried. Cancellation during an attempt or while waiting
/// between attempts stops the loop with [`SweepError::Interrupted`].
pub async fn retry_until_success<F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    cancel: &Cancellation,
    mut op: F,
) -> Result<u32>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        if cancel.guard(operation, op(attempt)).await? {
            if attempt > 1 {
                tracing::info!("{} succeeded on attempt {}", operation, attempt);
            }
            return Ok(attempt);
        }

        if let Some(max) = policy.max_attempts {
            if attempt >= max {
                tracing::error!(
                    "{} failed {} time(s), giving up; operator attention needed",
                    operation,
                    attempt
                );
                return Err(SweepError::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                });
            }
        }

        let delay = policy.delay_after(attempt);
        if attempt >= policy.escalate_after {
            tracing::error!(
                "{} still failing after {} attempt(s), retrying in {:?}",
                operation,
                attempt,
                delay
            );
        } else {
            tracing::warn!(
                "{} failed (attempt {}), retrying in {:?}",
                operation,
                attempt,
                delay
            );
        }

        cancel
            .guard(operation, async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
    }
}
