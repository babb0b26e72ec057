//! Execution strategies
//!
//! An [`Executor`] runs a batch of actions and reports one aggregate outcome.
//! Every implementation, base strategy or decorator, honors the same contract:
//!
//! - make a best-effort attempt to stop outstanding work once the context is
//!   cancelled or its deadline passes;
//! - return the context's error when that is the effective cause of
//!   non-completion;
//! - treat an empty batch as trivially successful.
//!
//! Already-started action bodies are never rolled back; cancellation only
//! guarantees that executors stop waiting, admitting and queueing promptly.

use std::sync::Arc;

use async_trait::async_trait;

use crate::action::ActionRef;
use crate::context::Context;
use crate::Result;

pub mod parallel;
pub mod pool;
pub mod sequential;

pub use parallel::Parallel;
pub use pool::{Pool, PoolCloser};
pub use sequential::Sequential;

/// A policy for running a batch of actions
#[async_trait]
pub trait Executor: Send + Sync {
    /// Perform all provided actions, returning the first representative
    /// failure or `Ok(())` if every action succeeded
    async fn execute(&self, ctx: &Context, actions: Vec<ActionRef>) -> Result<()>;
}

/// Shared handle to an executor
pub type ExecutorRef = Arc<dyn Executor>;

#[async_trait]
impl<E: Executor + ?Sized> Executor for Arc<E> {
    async fn execute(&self, ctx: &Context, actions: Vec<ActionRef>) -> Result<()> {
        (**self).execute(ctx, actions).await
    }
}

#[async_trait]
impl<E: Executor + ?Sized> Executor for Box<E> {
    async fn execute(&self, ctx: &Context, actions: Vec<ActionRef>) -> Result<()> {
        (**self).execute(ctx, actions).await
    }
}
