//! Round-trip cost of submit -> run -> callback

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use handoff::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn bench_round_trip(c: &mut Criterion) {
    let (executor, mut main_loop) = Executor::new(Config::default()).unwrap();
    let sink = Arc::new(AtomicU64::new(0));

    c.bench_function("single_round_trip", |b| {
        b.iter(|| {
            let sink = sink.clone();
            executor
                .submit(
                    Job::new(|_| Ok::<_, BoxError>(black_box(7u64)))
                        .on_success(move |v| {
                            sink.fetch_add(v, Ordering::Relaxed);
                        }),
                )
                .unwrap();
            main_loop.run_until_idle();
        });
    });

    executor.shutdown();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_round_trip");

    for threads in [1usize, 2, 4] {
        let config = Config::builder().num_threads(threads).build().unwrap();
        let (executor, mut main_loop) = Executor::new(config).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| {
                for i in 0..1_000u64 {
                    executor
                        .submit(Job::new(move |_| Ok::<_, BoxError>(black_box(i * i))))
                        .unwrap();
                }
                main_loop.run_until_idle();
            });
        });

        executor.shutdown();
    }

    group.finish();
}

fn bench_failure_path(c: &mut Criterion) {
    let (executor, mut main_loop) = Executor::new(Config::default()).unwrap();

    c.bench_function("failure_round_trip", |b| {
        b.iter(|| {
            executor
                .submit(
                    Job::new(|_| Err::<(), _>("offline")).on_failure(|e| {
                        black_box(e);
                    }),
                )
                .unwrap();
            main_loop.run_until_idle();
        });
    });

    executor.shutdown();
}

criterion_group!(benches, bench_round_trip, bench_batch, bench_failure_path);
criterion_main!(benches);
