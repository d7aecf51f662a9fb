//! Per-request cancellation scope
//!
//! Couples a cooperative cancellation token with the request's absolute
//! deadline. Every outbound call selects on [`RequestScope::done`], so a
//! cancelled or expired request stops consuming resources promptly.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Why a scope ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEnd {
    DeadlineExceeded,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RequestScope {
    token: CancellationToken,
    deadline: Instant,
}

impl RequestScope {
    /// Scope expiring `budget` from now
    pub fn new(budget: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now() + budget,
        }
    }

    /// Branch scope: cancelled with its parent, or on its own
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Scope already ended, by cancellation or deadline
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || Instant::now() >= self.deadline
    }

    /// Resolves once the scope is cancelled or its deadline passes
    pub async fn done(&self) -> ScopeEnd {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => ScopeEnd::Cancelled,
            _ = sleep_until(self.deadline) => ScopeEnd::DeadlineExceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_ends_scope() {
        let scope = RequestScope::new(Duration::from_secs(6));
        assert!(!scope.is_done());

        let end = scope.done().await;
        assert_eq!(end, ScopeEnd::DeadlineExceeded);
        assert!(scope.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_reaches_child() {
        let parent = RequestScope::new(Duration::from_secs(60));
        let child = parent.child();

        parent.cancel();
        assert_eq!(child.done().await, ScopeEnd::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_cancel_leaves_parent() {
        let parent = RequestScope::new(Duration::from_secs(60));
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
