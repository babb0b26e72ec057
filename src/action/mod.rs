//! Action contract
//!
//! An [`Action`] performs a single arbitrary unit of work against a
//! [`Context`]. Actions have no intrinsic identity; [`NamedAction`] adds a
//! `(type, id)` pair used for grouping and deduplication.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::Result;

pub mod named;

pub use named::{named, Named, NamedAction};

/// A single unit of work
///
/// Implementations should make a best effort to return early once `ctx` is
/// cancelled or its deadline passes.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use actionflow::{Action, Context};
///
/// struct Ping;
///
/// #[async_trait]
/// impl Action for Ping {
///     async fn execute(&self, ctx: Context) -> actionflow::Result<()> {
///         ctx.check()?;
///         // do work...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Action: Send + Sync + 'static {
    /// Perform the work of this action
    async fn execute(&self, ctx: Context) -> Result<()>;

    /// The `(type, id)` identity of this action, if it has one
    ///
    /// Wrappers forward this so identity survives decoration.
    fn as_named(&self) -> Option<&dyn NamedAction> {
        None
    }
}

/// Shared handle to an action
pub type ActionRef = Arc<dyn Action>;

/// Function-backed action
///
/// Wraps a closure that creates a fresh future per execution.
pub struct ActionFn<F> {
    f: F,
}

impl<F> ActionFn<F> {
    /// Wrap a closure as an action
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for ActionFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> Action for ActionFn<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn execute(&self, ctx: Context) -> Result<()> {
        (self.f)(ctx).await
    }
}

/// Create a shared, unnamed action from a closure
pub fn action_fn<F, Fut>(f: F) -> ActionRef
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(ActionFn::new(f))
}
