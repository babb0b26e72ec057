use std::sync::Arc;

use actionflow::decorator::{ControlFlow, Debounce, Metrics};
use actionflow::executor::{Parallel, Pool, Sequential};
use actionflow::stats::MemoryStatSource;
use actionflow::{action_fn, named, ActionRef, Context, Executor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

fn noop_batch(n: usize) -> Vec<ActionRef> {
    (0..n)
        .map(|_| action_fn(|_ctx| async { Ok(()) }))
        .collect()
}

fn named_batch(n: usize, distinct: usize) -> Vec<ActionRef> {
    (0..n)
        .map(|i| named("bench", (i % distinct).to_string(), |_ctx| async { Ok(()) }))
        .collect()
}

fn bench_strategies(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("strategies");

    for size in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::new("sequential", size), &size, |b, &size| {
            b.iter(|| {
                rt.block_on(Sequential.execute(&Context::new(), black_box(noop_batch(size))))
                    .unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("parallel", size), &size, |b, &size| {
            b.iter(|| {
                rt.block_on(Parallel.execute(&Context::new(), black_box(noop_batch(size))))
                    .unwrap()
            });
        });

        let (pool, _closer) = rt.block_on(async { Pool::new(0) });
        group.bench_with_input(BenchmarkId::new("pool", size), &size, |b, &size| {
            b.iter(|| {
                rt.block_on(pool.execute(&Context::new(), black_box(noop_batch(size))))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_decorated_stack(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (pool, _closer) = rt.block_on(async { Pool::new(0) });
    let exec = Arc::new(Metrics::new(
        Debounce::new(ControlFlow::new(pool, 64, 4096)),
        Arc::new(MemoryStatSource::new()),
    ));

    c.bench_function("full_stack_256_named", |b| {
        b.iter(|| {
            rt.block_on(exec.execute(&Context::new(), black_box(named_batch(256, 32))))
                .unwrap()
        });
    });
}

criterion_group!(benches, bench_strategies, bench_decorated_stack);
criterion_main!(benches);
