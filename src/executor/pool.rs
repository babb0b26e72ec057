//! Worker-pool execution
//!
//! A fixed set of long-lived workers reads from one bounded queue shared by
//! every concurrent `execute` call on the same pool.
//!
//! ```text
//!  execute() ──enqueue──► [ queue (cap = n) ] ──► worker 1..n
//!      ▲                                            │
//!      └────────────── per-call result channel ◄────┘
//! ```
//!
//! Enqueueing applies backpressure: a full queue blocks the caller until a
//! worker frees a slot, the caller's context is done, or the pool closes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::Executor;
use crate::action::ActionRef;
use crate::context::Context;
use crate::{ExecutorError, Result};

/// An action's outcome paired with its context's error at the moment it
/// returned
type Finished = (Result<()>, Option<ExecutorError>);

/// A queued unit of work
struct PoolJob {
    ctx: Context,
    action: ActionRef,
    result: mpsc::Sender<Finished>,
}

/// Executor backed by a fixed-size worker pool
///
/// Cloning a `Pool` yields another handle to the same workers and queue.
#[derive(Clone)]
pub struct Pool {
    queue: mpsc::Sender<PoolJob>,
    closed: CancellationToken,
    workers: usize,
}

/// Release capability returned by [`Pool::new`]
///
/// [`PoolCloser::close`] consumes the closer, so the pool can be released
/// only once. Dropping the closer releases the pool as well.
#[must_use = "dropping the closer immediately closes the pool"]
#[derive(Debug)]
pub struct PoolCloser {
    closed: CancellationToken,
}

impl PoolCloser {
    /// Signal every worker to stop; later `execute` calls fail with
    /// [`ExecutorError::PoolClosed`]
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for PoolCloser {
    fn drop(&mut self) {
        if !self.closed.is_cancelled() {
            debug!("closing worker pool");
            self.closed.cancel();
        }
    }
}

impl Pool {
    /// Start a pool of `n` workers
    ///
    /// A value of zero uses the number of available CPUs. Must be called
    /// from within a Tokio runtime.
    pub fn new(n: usize) -> (Self, PoolCloser) {
        let workers = if n == 0 { num_cpus::get().max(1) } else { n };

        let (tx, rx) = mpsc::channel(workers);
        let rx = Arc::new(Mutex::new(rx));
        let closed = CancellationToken::new();

        for id in 0..workers {
            tokio::spawn(work(id, Arc::clone(&rx), closed.clone()));
        }
        debug!(workers, "worker pool started");

        let pool = Self {
            queue: tx,
            closed: closed.clone(),
            workers,
        };
        (pool, PoolCloser { closed })
    }

    /// Number of workers in this pool
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns `true` once the pool has been released
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("workers", &self.workers)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl Executor for Pool {
    /// Enqueue every action on the pool, failing closed on the first error or
    /// if `ctx` is done. Blocks until every enqueued action has returned; in
    /// the event of an error not every action may run. A batch whose actions
    /// all succeed still reports the context's error if it ended before the
    /// last of them returned.
    #[instrument(name = "pool", skip_all, fields(actions = actions.len(), workers = self.workers))]
    async fn execute(&self, ctx: &Context, actions: Vec<ActionRef>) -> Result<()> {
        let qty = actions.len();
        if qty == 0 {
            return Ok(());
        }

        let scope = ctx.child();
        let (res_tx, mut res_rx) = mpsc::channel(qty);

        let mut first_err: Option<ExecutorError> = None;
        let mut ended_early: Option<ExecutorError> = None;
        let mut queued = 0usize;

        for action in actions {
            let job = PoolJob {
                ctx: scope.clone(),
                action,
                result: res_tx.clone(),
            };

            tokio::select! {
                biased;
                _ = self.closed.cancelled() => {
                    scope.cancel();
                    return Err(ExecutorError::PoolClosed);
                }
                _ = ctx.done() => {
                    debug!(queued, "context done while enqueueing");
                    first_err = Some(ctx.done_err());
                    break;
                }
                sent = self.queue.send(job) => {
                    if sent.is_err() {
                        scope.cancel();
                        return Err(ExecutorError::PoolClosed);
                    }
                    queued += 1;
                }
            }
        }
        drop(res_tx);

        for _ in 0..queued {
            match res_rx.recv().await {
                Some((Ok(()), ctx_err)) => {
                    if ended_early.is_none() {
                        ended_early = ctx_err;
                    }
                }
                Some((Err(err), _)) => {
                    if first_err.is_none() {
                        warn!(error = %err, "action failed, cancelling batch");
                        scope.cancel();
                        first_err = Some(err);
                    }
                }
                None => {
                    // Every outstanding job was dropped with the closed pool.
                    first_err.get_or_insert(ExecutorError::PoolClosed);
                    break;
                }
            }
        }

        match first_err.or(ended_early) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Worker loop: wait for the pool to close or for the next queued job.
async fn work(id: usize, queue: Arc<Mutex<mpsc::Receiver<PoolJob>>>, closed: CancellationToken) {
    loop {
        let next = tokio::select! {
            biased;
            _ = closed.cancelled() => None,
            job = async { queue.lock().await.recv().await } => job,
        };

        let Some(job) = next else {
            debug!(worker = id, "worker stopped");
            return;
        };

        let outcome = run_job(&job).await;
        let ctx_err = job.ctx.err();
        // The caller may have given up on this batch.
        let _ = job.result.send((outcome, ctx_err)).await;
    }
}

/// Execute a job on a separate task so a panicking action cannot take the
/// worker down with it.
async fn run_job(job: &PoolJob) -> Result<()> {
    let action = Arc::clone(&job.action);
    let ctx = job.ctx.clone();

    match tokio::spawn(async move { action.execute(ctx).await }).await {
        Ok(res) => res,
        Err(join_err) if join_err.is_panic() => {
            Err(ExecutorError::panicked(join_err.into_panic()))
        }
        Err(_) => Err(ExecutorError::Cancelled),
    }
}
