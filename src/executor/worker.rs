// worker thread loop
use super::priority::PriorityQueue;
use super::task::Task;
use crate::telemetry::Metrics;
use crate::util::{Backoff, BackpressureController};
use crossbeam_deque::{Injector, Steal, Stealer, Worker as WorkerQueue};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub type WorkerId = usize;

// stats for each worker
#[derive(Debug, Default)]
pub struct WorkerState {
    pub tasks_executed: AtomicU64,
    pub tasks_stolen: AtomicU64,
}

/// Queues and flags every worker in a pool shares.
#[derive(Debug)]
pub(crate) struct PoolQueues {
    pub injector: Injector<Task>,
    /// `Realtime` and `High`, taken before the injector.
    pub urgent: PriorityQueue,
    /// `Low` and `Background`, taken only when nothing else is runnable.
    pub deferred: PriorityQueue,
    pub shutdown: AtomicBool,
    pub backpressure: BackpressureController,
    pub metrics: Arc<Metrics>,
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub local_queue: WorkerQueue<Task>,
    pub state: Arc<WorkerState>,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            local_queue: WorkerQueue::new_fifo(),
            state: Arc::new(WorkerState::default()),
        }
    }

    // main loop; after shutdown keeps going until nothing is left to run
    pub fn run(&self, stealers: Vec<Stealer<Task>>, queues: Arc<PoolQueues>) {
        let mut backoff = Backoff::new();

        loop {
            // Priority: local -> urgent -> global -> steal -> deferred
            if let Some(task) = self.find_task(&stealers, &queues) {
                backoff.reset();
                self.execute_task(task);
                queues.backpressure.on_complete();
                continue;
            }

            if queues.shutdown.load(Ordering::Acquire) {
                // one more look: a submit may have raced the flag
                match self.find_task(&stealers, &queues) {
                    Some(task) => {
                        self.execute_task(task);
                        queues.backpressure.on_complete();
                        continue;
                    }
                    None => break,
                }
            }

            backoff.snooze();
        }

        tracing::trace!(
            worker = self.id,
            executed = self.state.tasks_executed.load(Ordering::Relaxed),
            stolen = self.state.tasks_stolen.load(Ordering::Relaxed),
            "worker exiting"
        );
    }

    fn find_task(&self, stealers: &[Stealer<Task>], queues: &PoolQueues) -> Option<Task> {
        // 1. Check local queue first (best cache locality)
        if let Some(task) = self.local_queue.pop() {
            return Some(task);
        }

        // 2. Realtime / High
        if let Some(task) = queues.urgent.pop() {
            return Some(task);
        }

        // 3. Check global injector queue
        loop {
            match queues.injector.steal_batch_and_pop(&self.local_queue) {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        // 4. Steal from other workers
        if let Some(task) = self.try_steal_from_workers(stealers, &queues.metrics) {
            return Some(task);
        }

        // 5. Low / Background
        queues.deferred.pop()
    }

    fn try_steal_from_workers(&self, stealers: &[Stealer<Task>], metrics: &Metrics) -> Option<Task> {
        use rand::seq::SliceRandom;
        use rand::thread_rng;

        if stealers.len() <= 1 {
            return None;
        }

        let mut indices: Vec<usize> = (0..stealers.len()).collect();
        indices.shuffle(&mut thread_rng());

        for &idx in &indices {
            if idx == self.id {
                continue;
            }

            loop {
                match stealers[idx].steal_batch_and_pop(&self.local_queue) {
                    Steal::Success(task) => {
                        self.state.tasks_stolen.fetch_add(1, Ordering::Relaxed);
                        metrics.record_stolen();
                        return Some(task);
                    }
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }

        None
    }

    fn execute_task(&self, task: Task) {
        let tid = task.id;
        tracing::trace!(
            task = %tid,
            worker = self.id,
            queued_us = task.spawn_time.elapsed().as_micros() as u64,
            "picked up"
        );

        // jobs catch their own panics; this only guards the glue around them
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            task.execute();
        }));

        if result.is_err() {
            tracing::error!(task = %tid, worker = self.id, "task wrapper panicked");
        }

        self.state.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }
}
