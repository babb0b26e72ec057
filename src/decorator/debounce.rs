//! Debounce
//!
//! Coalesces concurrently submitted named actions that share a `(type, id)`
//! pair into one underlying execution, even across concurrent `execute`
//! calls. All overlapping callers receive the single outcome. Once that
//! execution finishes the key is released, so a later call starts fresh:
//! outcomes are shared, never cached.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::action::{Action, ActionRef, NamedAction};
use crate::context::Context;
use crate::executor::Executor;
use crate::{ExecutorError, Result};

type FlightKey = (String, String);
type Outcome = Shared<BoxFuture<'static, Result<()>>>;

/// An in-flight execution registered under a key
struct Flight {
    generation: u64,
    outcome: WeakShared<BoxFuture<'static, Result<()>>>,
}

/// Single-flight registry shared by every action wrapped by one [`Debounce`]
#[derive(Default)]
struct FlightGroup {
    flights: Arc<Mutex<HashMap<FlightKey, Flight>>>,
    generation: AtomicU64,
}

/// Removes its key from the registry when the execution it belongs to ends,
/// whether it completed, panicked, or was abandoned by every waiter.
struct FlightGuard {
    flights: Arc<Mutex<HashMap<FlightKey, Flight>>>,
    key: FlightKey,
    generation: u64,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut flights = self.flights.lock();
        if flights.get(&self.key).map(|f| f.generation) == Some(self.generation) {
            flights.remove(&self.key);
        }
    }
}

impl FlightGroup {
    /// Join the in-flight execution for `key`, or start one with `action`.
    fn join(&self, key: FlightKey, ctx: &Context, action: &ActionRef) -> Outcome {
        let mut flights = self.flights.lock();

        if let Some(outcome) = flights.get(&key).and_then(|f| f.outcome.upgrade()) {
            debug!(action_type = %key.0, id = %key.1, "joining in-flight action");
            return outcome;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let guard = FlightGuard {
            flights: Arc::clone(&self.flights),
            key: key.clone(),
            generation,
        };
        let action = Arc::clone(action);
        let ctx = ctx.clone();

        let outcome = async move {
            let _guard = guard;
            AssertUnwindSafe(action.execute(ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(ExecutorError::panicked(payload)))
        }
        .boxed()
        .shared();

        if let Some(weak) = outcome.downgrade() {
            flights.insert(
                key,
                Flight {
                    generation,
                    outcome: weak,
                },
            );
        }
        outcome
    }
}

/// Decorates an executor, preventing duplicate named actions from running
/// concurrently
///
/// Unnamed actions pass through untouched.
pub struct Debounce<E> {
    inner: E,
    group: Arc<FlightGroup>,
}

impl<E: Executor> Debounce<E> {
    /// Wrap `inner`
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            group: Arc::new(FlightGroup::default()),
        }
    }

    /// Number of keys with an execution currently in flight
    pub fn in_flight(&self) -> usize {
        self.group.flights.lock().len()
    }
}

impl<E> std::fmt::Debug for Debounce<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debounce")
            .field("in_flight", &self.group.flights.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<E: Executor> Executor for Debounce<E> {
    #[instrument(name = "debounce", skip_all, fields(actions = actions.len()))]
    async fn execute(&self, ctx: &Context, actions: Vec<ActionRef>) -> Result<()> {
        let wrapped = actions
            .into_iter()
            .map(|action| match action.as_named() {
                Some(named) => {
                    let key = (named.action_type().to_string(), named.id().to_string());
                    Arc::new(DebouncedAction {
                        inner: Arc::clone(&action),
                        key,
                        group: Arc::clone(&self.group),
                    }) as ActionRef
                }
                None => action,
            })
            .collect();

        self.inner.execute(ctx, wrapped).await
    }
}

/// Coalescing wrapper around one named action
struct DebouncedAction {
    inner: ActionRef,
    key: FlightKey,
    group: Arc<FlightGroup>,
}

#[async_trait]
impl Action for DebouncedAction {
    async fn execute(&self, ctx: Context) -> Result<()> {
        let outcome = self.group.join(self.key.clone(), &ctx, &self.inner);

        tokio::select! {
            biased;
            res = outcome => res,
            _ = ctx.done() => Err(ctx.done_err()),
        }
    }

    fn as_named(&self) -> Option<&dyn NamedAction> {
        self.inner.as_named()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{action_fn, named};
    use crate::executor::{Parallel, Sequential};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn adder(ct: &Arc<AtomicUsize>, id: &str) -> ActionRef {
        let ct = Arc::clone(ct);
        named("add", id, move |_ctx| {
            let ct = Arc::clone(&ct);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ct.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_coalesces_within_batch() {
        let exec = Debounce::new(Parallel);
        let ct = Arc::new(AtomicUsize::new(0));

        let unnamed = {
            let ct = Arc::clone(&ct);
            action_fn(move |_ctx| {
                let ct = Arc::clone(&ct);
                async move {
                    ct.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };

        exec.execute(
            &Context::new(),
            vec![
                adder(&ct, "+1"),
                adder(&ct, "+1"),
                adder(&ct, "add one"),
                unnamed,
                action_fn(|_ctx| async { Ok(()) }),
            ],
        )
        .await
        .unwrap();

        assert_eq!(ct.load(Ordering::SeqCst), 3);
        assert_eq!(exec.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_no_stale_results() {
        let exec = Debounce::new(Sequential);
        let ct = Arc::new(AtomicUsize::new(0));

        exec.execute(&Context::new(), vec![adder(&ct, "x")]).await.unwrap();
        exec.execute(&Context::new(), vec![adder(&ct, "x")]).await.unwrap();

        assert_eq!(ct.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shared_failure() {
        let exec = Arc::new(Debounce::new(Parallel));
        let runs = Arc::new(AtomicUsize::new(0));

        let failing = |runs: &Arc<AtomicUsize>| {
            let runs = Arc::clone(runs);
            named("fail", "1", move |_ctx| {
                let runs = Arc::clone(&runs);
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(ExecutorError::action(anyhow::anyhow!("shared failure")))
                }
            })
        };

        let (ctx_a, ctx_b) = (Context::new(), Context::new());
        let (a, b) = tokio::join!(
            exec.execute(&ctx_a, vec![failing(&runs)]),
            exec.execute(&ctx_b, vec![failing(&runs)]),
        );

        assert_eq!(a.unwrap_err().to_string(), "shared failure");
        assert_eq!(b.unwrap_err().to_string(), "shared failure");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_follower_observes_own_cancellation() {
        let exec = Arc::new(Debounce::new(Parallel));
        let slow = || {
            named("slow", "1", |_ctx| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
        };

        let leader = {
            let exec = Arc::clone(&exec);
            let act = slow();
            tokio::spawn(async move { exec.execute(&Context::new(), vec![act]).await })
        };
        while exec.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        let res = exec.execute(&ctx, vec![slow()]).await;
        assert!(matches!(res, Err(ExecutorError::DeadlineExceeded)));

        leader.await.unwrap().unwrap();
        assert_eq!(exec.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_identity_is_forwarded() {
        let group = Arc::new(FlightGroup::default());
        let wrapped = DebouncedAction {
            inner: named("t", "i", |_ctx| async { Ok(()) }),
            key: ("t".to_string(), "i".to_string()),
            group,
        };

        let identity = wrapped.as_named().expect("named");
        assert_eq!(identity.action_type(), "t");
        assert_eq!(identity.id(), "i");
    }
}
