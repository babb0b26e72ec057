//! Metrics
//!
//! Instruments every action passing through the decorator with a latency
//! timer and success/error counters, both in the aggregate `all_actions`
//! scope and, for named actions, in a scope named after the action type.
//! Instrumentation never changes control flow or outcome.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::instrument;

use crate::action::{Action, ActionRef, NamedAction};
use crate::context::Context;
use crate::executor::Executor;
use crate::stats::{LockedStatCache, StatCache, StatSet, StatSource};
use crate::Result;

/// Scope covering every action executed through one [`Metrics`] decorator
pub const ALL_ACTIONS: &str = "all_actions";

/// Decorates an executor, emitting stats for every executed action
pub struct Metrics<E> {
    inner: E,
    cache: Arc<dyn StatCache>,
}

impl<E: Executor> Metrics<E> {
    /// Wrap `inner`, resolving stat handles from `src` through a
    /// [`LockedStatCache`]
    pub fn new(inner: E, src: Arc<dyn StatSource>) -> Self {
        Self::with_cache(inner, Arc::new(LockedStatCache::new(src)))
    }

    /// Wrap `inner`, resolving stat handles through `cache`
    pub fn with_cache(inner: E, cache: Arc<dyn StatCache>) -> Self {
        Self { inner, cache }
    }
}

impl<E> std::fmt::Debug for Metrics<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

#[async_trait]
impl<E: Executor> Executor for Metrics<E> {
    #[instrument(name = "metrics", skip_all, fields(actions = actions.len()))]
    async fn execute(&self, ctx: &Context, actions: Vec<ActionRef>) -> Result<()> {
        let global = self.cache.get(ALL_ACTIONS);

        let wrapped = actions
            .into_iter()
            .map(|action| {
                let scoped = action.as_named().map(|n| self.cache.get(n.action_type()));
                Arc::new(StatAction {
                    inner: action,
                    global: Arc::clone(&global),
                    scoped,
                }) as ActionRef
            })
            .collect();

        self.inner.execute(ctx, wrapped).await
    }
}

/// Instrumentation wrapper around one action
struct StatAction {
    inner: ActionRef,
    global: Arc<StatSet>,
    scoped: Option<Arc<StatSet>>,
}

#[async_trait]
impl Action for StatAction {
    async fn execute(&self, ctx: Context) -> Result<()> {
        let start = Instant::now();
        let res = self.inner.execute(ctx).await;
        let elapsed = start.elapsed();

        let succeeded = res.is_ok();
        self.global.record(elapsed, succeeded);
        if let Some(scoped) = &self.scoped {
            scoped.record(elapsed, succeeded);
        }

        res
    }

    fn as_named(&self) -> Option<&dyn NamedAction> {
        self.inner.as_named()
    }
}
