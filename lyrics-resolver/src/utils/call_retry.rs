//! Transient-failure retry for outbound calls
//!
//! **Algorithm:**
//! 1. Attempt the call
//! 2. Success, confirmed absence or a non-transient error: return it
//! 3. Transient error (network fault, per-call timeout) with retries left:
//!    sleep `backoff × attempt` (linear), then retry
//! 4. The request scope bounds everything: no retry starts, and no backoff
//!    outlives, a cancelled or expired scope

use crate::types::FetchOutcome;
use crate::utils::RequestScope;
use std::future::Future;
use std::time::Duration;

/// Retry `operation` on transient failure
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "repository[ttml]")
/// * `max_retries` - Extra attempts after the first
/// * `backoff` - Linear backoff step
/// * `scope` - Request scope; retries never extend past it
/// * `operation` - Closure performing one attempt
pub async fn retry_transient<F, Fut>(
    operation_name: &str,
    max_retries: u32,
    backoff: Duration,
    scope: &RequestScope,
    mut operation: F,
) -> FetchOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchOutcome>,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying outbound call");
        }

        let outcome = operation().await;

        if !outcome.is_transient_error() || attempt > max_retries || scope.is_done() {
            if attempt > 1 && outcome.is_found() {
                tracing::debug!(
                    operation = operation_name,
                    attempt,
                    "Outbound call succeeded after retry"
                );
            }
            return outcome;
        }

        let delay = backoff.saturating_mul(attempt);
        if let FetchOutcome::Error(failure) = &outcome {
            tracing::warn!(
                operation = operation_name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure.error,
                "Transient failure, backing off"
            );
        }

        tokio::select! {
            biased;
            _ = scope.done() => return outcome,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
