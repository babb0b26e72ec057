//! Parallel execution
//!
//! Pure fan-out: one spawned task per action, no queueing and no concurrency
//! bound. All tasks share one derived context; the first failure cancels it
//! so cancellation-aware siblings can exit early.

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{instrument, warn};

use super::Executor;
use crate::action::ActionRef;
use crate::context::Context;
use crate::{ExecutorError, Result};

/// Executes every action concurrently, failing closed on the first error
///
/// Which failure is reported when several actions fail at nearly the same
/// time is unspecified; exactly one of them is returned.
///
/// When every action succeeds, the batch still fails with the context's error
/// if the context ended before the last action returned. The context is
/// sampled as each action returns, so a deadline passing after the final
/// action but before the join does not turn a completed batch into a failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parallel;

#[async_trait]
impl Executor for Parallel {
    #[instrument(name = "parallel", skip_all, fields(actions = actions.len()))]
    async fn execute(&self, ctx: &Context, actions: Vec<ActionRef>) -> Result<()> {
        ctx.check()?;

        let scope = ctx.child();
        let mut tasks = JoinSet::new();

        for action in actions {
            let scope = scope.clone();
            tasks.spawn(async move {
                let res = action.execute(scope.clone()).await;
                (res, scope.err())
            });
        }

        let mut first_err: Option<ExecutorError> = None;
        let mut ended_early: Option<ExecutorError> = None;

        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok((res, ctx_err)) => {
                    if ended_early.is_none() {
                        ended_early = ctx_err;
                    }
                    res
                }
                Err(join_err) if join_err.is_panic() => {
                    Err(ExecutorError::panicked(join_err.into_panic()))
                }
                Err(_) => Err(ExecutorError::Cancelled),
            };

            if let Err(err) = outcome {
                if first_err.is_none() {
                    warn!(error = %err, "action failed, cancelling batch");
                    scope.cancel();
                    first_err = Some(err);
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => ended_early.map_or(Ok(()), Err),
        }
    }
}
