//! Sequential execution
//!
//! Runs every action in submission order on the calling task.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::Executor;
use crate::action::ActionRef;
use crate::context::Context;
use crate::Result;

/// Executes actions one at a time, in order
///
/// Stops at the first failure (later actions are never started) and checks
/// for cancellation before starting each action.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

#[async_trait]
impl Executor for Sequential {
    #[instrument(name = "sequential", skip_all, fields(actions = actions.len()))]
    async fn execute(&self, ctx: &Context, actions: Vec<ActionRef>) -> Result<()> {
        for (idx, action) in actions.into_iter().enumerate() {
            if let Err(err) = ctx.check() {
                debug!(index = idx, "context done before action start");
                return Err(err);
            }
            action.execute(ctx.clone()).await?;
        }

        Ok(())
    }
}
