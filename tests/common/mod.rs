//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actionflow::{action_fn, named, ActionRef, Context, ExecutorError};
use parking_lot::Mutex;

/// Action incrementing `ct` once per execution
pub fn counter(ct: &Arc<AtomicUsize>) -> ActionRef {
    let ct = Arc::clone(ct);
    action_fn(move |_ctx| {
        let ct = Arc::clone(&ct);
        async move {
            ct.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// Named action incrementing `ct` after staying in flight for `hold`
pub fn named_counter(ct: &Arc<AtomicUsize>, action_type: &str, id: &str, hold: Duration) -> ActionRef {
    let ct = Arc::clone(ct);
    named(action_type, id, move |_ctx| {
        let ct = Arc::clone(&ct);
        async move {
            tokio::time::sleep(hold).await;
            ct.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// Action appending `i` to `log`
pub fn recorder(log: &Arc<Mutex<Vec<usize>>>, i: usize) -> ActionRef {
    let log = Arc::clone(log);
    action_fn(move |_ctx| {
        let log = Arc::clone(&log);
        async move {
            log.lock().push(i);
            Ok(())
        }
    })
}

/// Action that waits for its context and reports why it stopped
pub fn blocker() -> ActionRef {
    action_fn(|ctx: Context| async move {
        ctx.done().await;
        ctx.check()
    })
}

/// Action that waits for its context, then succeeds regardless
pub fn succeeds_when_done() -> ActionRef {
    action_fn(|ctx: Context| async move {
        ctx.done().await;
        Ok(())
    })
}

/// Action failing with `msg`
pub fn failing(msg: &'static str) -> ActionRef {
    action_fn(move |_ctx| async move { Err(ExecutorError::action(anyhow::anyhow!(msg))) })
}
