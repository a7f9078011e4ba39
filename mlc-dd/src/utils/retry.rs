//! Bounded retry for external API calls
//!
//! Implements exponential backoff for transient failures (timeouts, transport
//! errors, 5xx responses) against the media library and record database.
//! Permanent failures (rejected requests, parse errors) fail immediately.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Classifies an error as worth retrying
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Retry budget for one external call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Retry an operation with exponential backoff until the attempt budget is spent
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If successful, return result
/// 3. If the error is transient and attempts remain: log WARN, backoff, retry
/// 4. Otherwise return the error
///
/// **Backoff Strategy:**
/// - Initial delay: `policy.initial_backoff`
/// - Multiplier: 2.0, capped at `policy.max_backoff`
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "update_tags", "move_to_trash")
/// * `policy` - Attempt budget and backoff bounds
/// * `operation` - Async closure performing one attempt
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut attempt = 0u32;
    let mut backoff = policy.initial_backoff;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying API call");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "API call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_transient() {
                    return Err(err);
                }

                if attempt >= policy.max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        error = %err,
                        "API call failed: retry budget exhausted"
                    );
                    return Err(err);
                }

                let wait = backoff.min(policy.max_backoff);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = wait.as_millis() as u64,
                    error = %err,
                    "Transient API failure, will retry after backoff"
                );

                tokio::time::sleep(wait).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
        }
    }
}
