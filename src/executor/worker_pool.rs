use super::priority::{Priority, PriorityQueue};
use super::task::Task;
use super::worker::{PoolQueues, Worker, WorkerId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::telemetry::Metrics;
use crate::util::BackpressureController;
use crossbeam_deque::Injector;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Fixed set of worker threads sharing an injector and two priority heaps.
pub struct WorkerPool {
    workers: Mutex<Vec<WorkerHandle>>,
    unparkers: Vec<thread::Thread>,
    queues: Arc<PoolQueues>,
    num_threads: usize,
    next_wake: AtomicUsize,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(config: &Config, metrics: Arc<Metrics>) -> Result<Self> {
        let num_threads = config.worker_threads();
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let queues = Arc::new(PoolQueues {
            injector: Injector::new(),
            urgent: PriorityQueue::new(),
            deferred: PriorityQueue::new(),
            shutdown: AtomicBool::new(false),
            backpressure: BackpressureController::new(config.max_pending),
            metrics,
        });

        let workers: Vec<Worker> = (0..num_threads).map(Worker::new).collect();
        let stealers: Vec<_> = workers.iter().map(|w| w.local_queue.stealer()).collect();

        let mut handles = Vec::with_capacity(num_threads);
        let mut unparkers = Vec::with_capacity(num_threads);

        for worker in workers {
            let id = worker.id;
            let stealers_clone = stealers.clone();
            let queues_clone = queues.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let spawned = builder.spawn(move || {
                worker.run(stealers_clone, queues_clone);
            });

            let thread = match spawned {
                Ok(thread) => thread,
                Err(e) => {
                    // don't leak the workers that did start
                    queues.shutdown.store(true, Ordering::Release);
                    for handle in handles.iter_mut().filter_map(|h: &mut WorkerHandle| h.thread.take()) {
                        handle.thread().unpark();
                        let _ = handle.join();
                    }
                    return Err(Error::executor(format!("spawn failed: {}", e)));
                }
            };

            unparkers.push(thread.thread().clone());
            handles.push(WorkerHandle {
                id,
                thread: Some(thread),
            });
        }

        tracing::debug!(threads = num_threads, prefix = %config.thread_name_prefix, "worker pool started");

        Ok(Self {
            workers: Mutex::new(handles),
            unparkers,
            queues,
            num_threads,
            next_wake: AtomicUsize::new(0),
        })
    }

    /// Queue a task, or reject it when `max_pending` tasks are waiting.
    pub(crate) fn submit(&self, task: Task) -> Result<()> {
        if self.queues.shutdown.load(Ordering::Acquire) {
            return Err(Error::ShutDown);
        }

        if !self.queues.backpressure.on_enqueue() {
            return Err(Error::QueueFull {
                pending: self.queues.backpressure.queue_size(),
                max: self.queues.backpressure.max_queue_size(),
            });
        }

        match task.priority {
            Priority::Realtime | Priority::High => self.queues.urgent.push(task),
            // Normal priority goes to injector for work stealing
            Priority::Normal => self.queues.injector.push(task),
            Priority::Low | Priority::Background => self.queues.deferred.push(task),
        }

        self.wake_one();
        Ok(())
    }

    fn wake_one(&self) {
        let idx = self.next_wake.fetch_add(1, Ordering::Relaxed) % self.unparkers.len();
        self.unparkers[idx].unpark();
    }

    /// Tasks admitted but not yet finished running.
    pub fn pending_tasks(&self) -> usize {
        self.queues.backpressure.queue_size()
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub(crate) fn is_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.unparkers.iter().any(|t| t.id() == current)
    }

    pub fn is_shutdown(&self) -> bool {
        self.queues.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting tasks, let workers drain what is queued, then join them.
    pub fn shutdown(&self) {
        self.queues.shutdown.store(true, Ordering::Release);

        // wake everyone up to check shutdown flag
        for unparker in &self.unparkers {
            unparker.unpark();
        }

        let current = thread::current().id();
        let mut workers = self.workers.lock();
        for worker in workers.iter_mut() {
            // shutdown from inside a job: can't join ourselves
            if worker.thread.as_ref().is_some_and(|t| t.thread().id() == current) {
                continue;
            }
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            if thread.join().is_err() {
                tracing::error!(worker = worker.id, "worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .field("pending_tasks", &self.pending_tasks())
            .field("urgent", &self.queues.urgent.len())
            .field("deferred", &self.queues.deferred.len())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
