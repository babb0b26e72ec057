//! Execution context
//!
//! [`Context`] carries cooperative cancellation and an optional deadline into
//! executors and action bodies. Deriving a [`Context::child`] creates a new
//! cancellation scope: cancelling the parent cancels every child, cancelling
//! a child never touches the parent.

use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::{ExecutorError, Result};

/// Cancellable, deadline-aware execution context
///
/// Cloning a `Context` yields a handle to the same scope.
#[derive(Clone, Debug, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Create a new root context with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a child scope sharing this context's deadline
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child scope that expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child scope that expires at `deadline`, or at the parent's
    /// deadline if that one is earlier
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancel this scope and every scope derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The effective deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once the scope is cancelled or its deadline passed
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// The reason this scope is done, if it is
    ///
    /// An elapsed deadline wins over cancellation.
    pub fn err(&self) -> Option<ExecutorError> {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(ExecutorError::DeadlineExceeded)
        } else if self.token.is_cancelled() {
            Some(ExecutorError::Cancelled)
        } else {
            None
        }
    }

    /// `Err` with the reason this scope is done, `Ok` otherwise
    pub fn check(&self) -> Result<()> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Wait until the scope is cancelled or its deadline passes
    ///
    /// Cancel-safe; usable as a `tokio::select!` branch.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Error to report after [`Context::done`] resolved
    pub(crate) fn done_err(&self) -> ExecutorError {
        self.err().unwrap_or(ExecutorError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_child_cancellation_does_not_propagate_up() {
        let parent = Context::new();
        let child = parent.child();

        child.cancel();

        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[tokio::test]
    async fn test_parent_cancellation_propagates_down() {
        let parent = Context::new();
        let child = parent.child();

        parent.cancel();
        child.done().await;

        assert!(matches!(child.err(), Some(ExecutorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_deadline() {
        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        assert!(ctx.check().is_ok());

        ctx.done().await;
        assert!(matches!(ctx.err(), Some(ExecutorError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_child_keeps_earlier_deadline() {
        let parent = Context::new().with_timeout(Duration::from_millis(5));
        let child = parent.with_timeout(Duration::from_secs(60));

        assert_eq!(child.deadline(), parent.deadline());
    }
}
