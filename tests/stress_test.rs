//! Stress tests for the executor

use handoff::prelude::*;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_small_jobs() {
    let (executor, mut main_loop) = Executor::new(Config::default()).unwrap();
    let total = Arc::new(AtomicUsize::new(0));

    for i in 0..9_000usize {
        let total = total.clone();
        executor
            .submit(Job::new(move |_| Ok::<_, BoxError>(i)).on_success(move |v| {
                total.fetch_add(v, Ordering::Relaxed);
            }))
            .unwrap();
    }

    assert_eq!(main_loop.run_until_idle(), 9_000);
    assert_eq!(total.load(Ordering::Relaxed), (0..9_000).sum::<usize>());
}

#[test]
#[ignore]
fn stress_test_submit_from_many_threads() {
    let config = Config::builder().num_threads(4).build().unwrap();
    let (executor, mut main_loop) = Executor::new(config).unwrap();
    let seen = Arc::new(Mutex::new(HashSet::new()));

    let producers: Vec<_> = (0..8)
        .map(|p| {
            let executor = executor.clone();
            let seen = seen.clone();
            thread::spawn(move || {
                for i in 0..500 {
                    let key = p * 1_000 + i;
                    let seen = seen.clone();
                    executor
                        .submit(
                            Job::new(move |_| -> std::result::Result<usize, BoxError> {
                                if key % 7 == 0 {
                                    Err(format!("{}", key).into())
                                } else {
                                    Ok(key)
                                }
                            })
                            .on_success({
                                let seen = seen.clone();
                                move |k| {
                                    assert!(seen.lock().insert(k));
                                }
                            })
                            .on_failure(move |e| {
                                let k: usize = e.to_string().trim_start_matches("task failed: ").parse().unwrap();
                                assert!(seen.lock().insert(k));
                            }),
                        )
                        .unwrap();
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }

    main_loop.run_until_idle();
    assert_eq!(seen.lock().len(), 8 * 500);
}

#[test]
#[ignore]
fn stress_test_chained_follow_ups() {
    fn chain(cx: &JobContext, remaining: usize, hits: Arc<AtomicUsize>) -> std::result::Result<(), BoxError> {
        hits.fetch_add(1, Ordering::Relaxed);
        if remaining > 0 {
            let executor = cx.executor().ok_or("executor gone")?;
            executor.submit(Job::new(move |cx: &JobContext| chain(cx, remaining - 1, hits)))?;
        }
        Ok(())
    }

    let (executor, mut main_loop) = Executor::new(Config::default()).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));

    for _ in 0..50 {
        let hits = hits.clone();
        executor
            .submit(Job::new(move |cx: &JobContext| chain(cx, 100, hits)))
            .unwrap();
    }

    main_loop.run_until_idle();
    assert_eq!(hits.load(Ordering::Relaxed), 50 * 101);
}

#[test]
#[ignore]
fn stress_test_repeated_start_shutdown() {
    for _ in 0..20 {
        let (executor, mut main_loop) = Executor::new(Config::default()).unwrap();
        for i in 0..100 {
            executor.submit(Job::new(move |_| Ok::<_, BoxError>(i))).unwrap();
        }
        executor.shutdown();
        assert_eq!(main_loop.run(), 100);
    }
}
