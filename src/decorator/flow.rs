//! Flow control
//!
//! Two-tier admission control in front of any executor: a "calls" gate bounds
//! how many `execute` invocations may be in flight, an "actions" gate bounds
//! the total number of in-flight actions across all invocations.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};

use crate::action::ActionRef;
use crate::context::Context;
use crate::executor::Executor;
use crate::{ExecutorError, Result};

/// Largest gate size a [`ControlFlow`] accepts
///
/// `tokio` semaphores cap their permit count and batch acquisitions take a
/// `u32`; larger limits are clamped to this value and behave as unlimited.
pub const MAX_GATE_SIZE: usize = {
    let cap = Semaphore::MAX_PERMITS;
    if cap < u32::MAX as usize {
        cap
    } else {
        u32::MAX as usize
    }
};

/// Decorates an executor, limiting concurrent calls and concurrent actions
pub struct ControlFlow<E> {
    inner: E,
    max_actions: usize,
    calls: Arc<Semaphore>,
    actions: Arc<Semaphore>,
}

impl<E: Executor> ControlFlow<E> {
    /// Wrap `inner` with the given limits
    ///
    /// Both limits should be positive; a limit of zero admits nothing.
    /// Unlimited is expressed with a sufficiently large value.
    pub fn new(inner: E, max_calls: usize, max_actions: usize) -> Self {
        let max_calls = max_calls.min(MAX_GATE_SIZE);
        let max_actions = max_actions.min(MAX_GATE_SIZE);

        Self {
            inner,
            max_actions,
            calls: Arc::new(Semaphore::new(max_calls)),
            actions: Arc::new(Semaphore::new(max_actions)),
        }
    }

    /// Calls that could be admitted right now
    pub fn available_calls(&self) -> usize {
        self.calls.available_permits()
    }

    /// Actions that could be admitted right now
    pub fn available_actions(&self) -> usize {
        self.actions.available_permits()
    }
}

impl<E> std::fmt::Debug for ControlFlow<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlFlow")
            .field("max_actions", &self.max_actions)
            .field("available_calls", &self.calls.available_permits())
            .field("available_actions", &self.actions.available_permits())
            .finish_non_exhaustive()
    }
}

/// Acquire `n` permits from `gate`, giving up once `ctx` is done.
async fn admit(ctx: &Context, gate: &Arc<Semaphore>, n: u32) -> Result<OwnedSemaphorePermit> {
    tokio::select! {
        biased;
        _ = ctx.done() => Err(ctx.done_err()),
        permit = Arc::clone(gate).acquire_many_owned(n) => {
            permit.map_err(|_| ExecutorError::GateClosed)
        }
    }
}

#[async_trait]
impl<E: Executor> Executor for ControlFlow<E> {
    /// Acquire one call permit and one action permit per action before
    /// delegating. Permits are released on every exit path. A batch larger
    /// than `max_actions` is rejected without blocking.
    #[instrument(name = "control_flow", skip_all, fields(actions = actions.len()))]
    async fn execute(&self, ctx: &Context, actions: Vec<ActionRef>) -> Result<()> {
        let qty = actions.len();

        if qty > self.max_actions {
            warn!(max = self.max_actions, requested = qty, "batch too large for gate");
            return Err(ExecutorError::TooManyActions {
                max: self.max_actions,
                requested: qty,
            });
        }

        let _call = admit(ctx, &self.calls, 1).await?;
        // qty <= max_actions <= u32::MAX
        let _actions = admit(ctx, &self.actions, qty as u32).await?;
        debug!(qty, "batch admitted");

        self.inner.execute(ctx, actions).await
    }
}
