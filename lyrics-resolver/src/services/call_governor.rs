//! Concurrency and timeout governor for outbound calls
//!
//! Every adapter call made by the resolver passes through
//! [`CallGovernor::call`], which layers:
//! 1. an optional admission wait (upstream quota), outside the permit pool
//! 2. a process-wide permit pool bounding simultaneous in-flight calls
//! 3. a per-call timeout chosen by [`CallKind`]
//! 4. one bounded retry with linear backoff on transient failure
//! 5. the request scope (global deadline + cancellation)
//!
//! A call cut short by any of these resolves to an `Error` outcome; it
//! never hangs and never surfaces as a panic.

use crate::error::SourceError;
use crate::formats::LyricFormat;
use crate::types::FetchOutcome;
use crate::utils::request_scope::ScopeEnd;
use crate::utils::{retry_transient, RequestScope};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

/// Limits applied to outbound calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernorPolicy {
    /// Whole-request budget
    pub deadline: Duration,
    /// Per-call timeout for repository probes
    pub repository_timeout: Duration,
    /// Per-call timeout for external probes
    pub external_timeout: Duration,
    /// Retries on transient failure
    pub max_retries: u32,
    /// Linear backoff step
    pub retry_backoff: Duration,
    /// Simultaneous in-flight calls, process-wide
    pub max_in_flight: usize,
}

impl Default for GovernorPolicy {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(6),
            repository_timeout: Duration::from_secs(3),
            external_timeout: Duration::from_secs(5),
            max_retries: 1,
            retry_backoff: Duration::from_millis(250),
            max_in_flight: 16,
        }
    }
}

/// Kind of outbound call, selecting its timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    RepositoryProbe,
    ExternalProbe,
}

/// Shared outbound call governor
#[derive(Debug)]
pub struct CallGovernor {
    policy: GovernorPolicy,
    permits: Arc<Semaphore>,
}

impl CallGovernor {
    pub fn new(policy: GovernorPolicy) -> Self {
        let permits = Arc::new(Semaphore::new(policy.max_in_flight.max(1)));
        Self { policy, permits }
    }

    pub fn policy(&self) -> &GovernorPolicy {
        &self.policy
    }

    /// Permits currently free in the outbound pool
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// New request scope bounded by the global deadline
    pub fn request_scope(&self) -> RequestScope {
        RequestScope::new(self.policy.deadline)
    }

    fn timeout_for(&self, kind: CallKind) -> Duration {
        match kind {
            CallKind::RepositoryProbe => self.policy.repository_timeout,
            CallKind::ExternalProbe => self.policy.external_timeout,
        }
    }

    /// Run one governed call
    ///
    /// # Arguments
    /// * `label` - Name for logging (e.g., "repository[lrc]")
    /// * `kind` - Selects the per-call timeout
    /// * `format` - Format attached to synthesized error outcomes
    /// * `scope` - Request scope bounding the call and its retry
    /// * `operation` - Closure issuing the adapter call
    pub async fn call<F, Fut>(
        &self,
        label: &str,
        kind: CallKind,
        format: Option<LyricFormat>,
        scope: &RequestScope,
        operation: F,
    ) -> FetchOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        self.call_admitted(label, kind, format, scope, || async {}, operation)
            .await
    }

    /// [`call`](Self::call) with an admission wait before every attempt
    ///
    /// `admit` (e.g. an upstream quota) is awaited under the request scope
    /// only, before a permit is taken: it holds no outbound slot and does
    /// not count against the per-call timeout.
    pub async fn call_admitted<A, AFut, F, Fut>(
        &self,
        label: &str,
        kind: CallKind,
        format: Option<LyricFormat>,
        scope: &RequestScope,
        mut admit: A,
        mut operation: F,
    ) -> FetchOutcome
    where
        A: FnMut() -> AFut,
        AFut: Future<Output = ()>,
        F: FnMut() -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        let timeout = self.timeout_for(kind);
        let max_retries = self.policy.max_retries;
        let backoff = self.policy.retry_backoff;

        retry_transient(label, max_retries, backoff, scope, || {
            let admission = admit();
            let attempt = operation();
            async move {
                tokio::select! {
                    biased;
                    end = scope.done() => return scope_outcome(format, end),
                    _ = admission => {}
                }

                let _permit = tokio::select! {
                    biased;
                    end = scope.done() => return scope_outcome(format, end),
                    permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(e) => {
                            warn!(operation = label, error = %e, "Outbound permit pool closed");
                            return FetchOutcome::error(format, SourceError::Worker(e.to_string()));
                        }
                    },
                };

                tokio::select! {
                    biased;
                    end = scope.done() => scope_outcome(format, end),
                    result = tokio::time::timeout(timeout, attempt) => match result {
                        Ok(outcome) => outcome,
                        Err(_) => FetchOutcome::error(format, SourceError::Timeout(timeout)),
                    },
                }
            }
        })
        .await
    }
}

fn scope_outcome(format: Option<LyricFormat>, end: ScopeEnd) -> FetchOutcome {
    let error = match end {
        ScopeEnd::DeadlineExceeded => SourceError::DeadlineExceeded,
        ScopeEnd::Cancelled => SourceError::Cancelled,
    };
    FetchOutcome::error(format, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FetchOutcome, LyricHit, SourceFailure};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn policy() -> GovernorPolicy {
        GovernorPolicy {
            deadline: Duration::from_secs(6),
            repository_timeout: Duration::from_secs(2),
            external_timeout: Duration::from_secs(5),
            max_retries: 1,
            retry_backoff: Duration::from_millis(100),
            max_in_flight: 2,
        }
    }

    fn found() -> FetchOutcome {
        FetchOutcome::Found(LyricHit::repository(LyricFormat::Ttml, "<tt/>"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_passes_through_found() {
        let governor = CallGovernor::new(policy());
        let scope = governor.request_scope();

        let outcome = governor
            .call("repository[ttml]", CallKind::RepositoryProbe, Some(LyricFormat::Ttml), &scope, || async {
                found()
            })
            .await;

        assert!(outcome.is_found());
        assert_eq!(governor.available_permits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_call_timeout_retried_once() {
        let governor = CallGovernor::new(policy());
        let scope = governor.request_scope();
        let calls = AtomicUsize::new(0);

        let outcome = governor
            .call("repository[lrc]", CallKind::RepositoryProbe, Some(LyricFormat::Lrc), &scope, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    found()
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            outcome,
            FetchOutcome::Error(SourceFailure {
                format: Some(LyricFormat::Lrc),
                error: SourceError::Timeout(Duration::from_secs(2)),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_call() {
        let mut policy = policy();
        policy.deadline = Duration::from_secs(1);
        let governor = CallGovernor::new(policy);
        let scope = governor.request_scope();
        let start = Instant::now();

        let outcome = governor
            .call("external", CallKind::ExternalProbe, None, &scope, || async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                found()
            })
            .await;

        assert_eq!(
            outcome,
            FetchOutcome::error(None, SourceError::DeadlineExceeded)
        );
        assert!(start.elapsed() <= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_scope() {
        let governor = CallGovernor::new(policy());
        let scope = governor.request_scope();
        scope.cancel();

        let outcome = governor
            .call("external", CallKind::ExternalProbe, None, &scope, || async { found() })
            .await;

        assert_eq!(outcome, FetchOutcome::error(None, SourceError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_wait_holds_no_permit_and_no_timeout() {
        let owned = CallGovernor::new(policy());
        let governor = &owned;
        let scope = governor.request_scope();

        // Admission outlasts the 2s per-call timeout
        let outcome = governor
            .call_admitted(
                "external",
                CallKind::RepositoryProbe,
                None,
                &scope,
                move || async move {
                    assert_eq!(governor.available_permits(), 2);
                    tokio::time::sleep(Duration::from_secs(3)).await;
                },
                || async { found() },
            )
            .await;

        assert!(outcome.is_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_bounded_by_deadline() {
        let mut policy = policy();
        policy.deadline = Duration::from_secs(1);
        let governor = CallGovernor::new(policy);
        let scope = governor.request_scope();

        let outcome = governor
            .call_admitted(
                "external",
                CallKind::ExternalProbe,
                None,
                &scope,
                || tokio::time::sleep(Duration::from_secs(30)),
                || async { found() },
            )
            .await;

        assert_eq!(outcome, FetchOutcome::error(None, SourceError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_pool_bounds_in_flight() {
        let governor = Arc::new(CallGovernor::new(policy()));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let governor = Arc::clone(&governor);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let scope = governor.request_scope();
                governor
                    .call("repository", CallKind::RepositoryProbe, None, &scope, || {
                        let in_flight = Arc::clone(&in_flight);
                        let peak = Arc::clone(&peak);
                        async move {
                            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                            found()
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_found());
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }
}
