//! Runs a batch of simulated fetches through a fully decorated pool.
//!
//! ```text
//! RUST_LOG=actionflow=debug cargo run --example pipeline
//! ```

use std::sync::Arc;
use std::time::Duration;

use actionflow::decorator::{ControlFlow, Debounce, Metrics};
use actionflow::executor::Pool;
use actionflow::stats::PrometheusStatSource;
use actionflow::{action_fn, named, ActionRef, Context, Executor, ExecutorError};
use tracing_subscriber::EnvFilter;

fn fetch_user(id: u32) -> ActionRef {
    named("fetch-user", id.to_string(), move |ctx: Context| async move {
        tokio::select! {
            _ = ctx.done() => ctx.check(),
            _ = tokio::time::sleep(Duration::from_millis(20 + u64::from(id % 3) * 10)) => {
                if id == 13 {
                    return Err(ExecutorError::action(anyhow::anyhow!("user {id} not found")));
                }
                Ok(())
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let stats = Arc::new(PrometheusStatSource::new().with_namespace("demo"));
    let (pool, closer) = Pool::new(4);
    let exec = Metrics::new(
        Debounce::new(ControlFlow::new(pool, 2, 32)),
        stats.clone(),
    );

    // Duplicate ids are coalesced while in flight.
    let mut actions: Vec<ActionRef> = [1, 2, 2, 3, 3, 3, 4].into_iter().map(fetch_user).collect();
    actions.push(action_fn(|_ctx| async { Ok(()) }));

    exec.execute(&Context::new(), actions).await?;
    tracing::info!("first batch succeeded");

    let ctx = Context::new().with_timeout(Duration::from_secs(1));
    match exec.execute(&ctx, vec![fetch_user(12), fetch_user(13)]).await {
        Ok(()) => tracing::info!("second batch succeeded"),
        Err(e) => tracing::warn!(error = %e, label = e.as_label(), "second batch failed"),
    }

    println!("{}", stats.gather_text());
    closer.close();
    Ok(())
}
