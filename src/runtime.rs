use crate::config::Config;
use crate::context::{CancellationToken, JobContext, Lifecycle};
use crate::dispatcher::{Completion, DeliverFn, Delivery, DispatchState, DispatcherThread, MainLoop};
use crate::error::{Error, Result, TaskError};
use crate::executor::{PanicHandler, Priority, Task, TaskId, WorkerPool};
use crate::job::{BackgroundJob, Outcome};
use crate::telemetry::{Metrics, MetricsSnapshot};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

pub(crate) struct Shared {
    pool: WorkerPool,
    /// `None` once shut down; submissions hold the read lock while queueing.
    sender: RwLock<Option<Sender<Completion>>>,
    /// Held across the worker join so every `shutdown` caller returns after it.
    shutdown_lock: Mutex<()>,
    dispatch: Arc<DispatchState>,
    job_panics: Arc<PanicHandler>,
    metrics: Arc<Metrics>,
    config: Config,
}

impl Shared {
    fn shutdown(&self) {
        let _joining = if self.pool.is_worker_thread() {
            // a job can't wait for the join of its own worker
            match self.shutdown_lock.try_lock() {
                Some(guard) => guard,
                None => return,
            }
        } else {
            self.shutdown_lock.lock()
        };

        let sender = self.sender.write().take();
        if sender.is_some() {
            tracing::debug!(pending = self.pool.pending_tasks(), "executor shutting down");
        }

        // queued tasks still own sender clones, so their callbacks get through
        self.pool.shutdown();

        if let Some(sender) = sender {
            drop(sender);
            tracing::debug!(job_panics = self.job_panics.panic_count(), "executor shut down");
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to a worker pool plus the channel back to its main loop.
///
/// Cheap to clone. The pool shuts down on [`Executor::shutdown`] or when the
/// last handle is dropped.
#[derive(Clone)]
pub struct Executor {
    shared: Arc<Shared>,
}

/// Returned by a successful submission.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    token: CancellationToken,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Skip `run` if it has not started and suppress the callback.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Executor {
    /// Start the worker pool. The returned [`MainLoop`] is bound to the
    /// calling thread, which becomes the main context for callbacks.
    pub fn new(config: Config) -> Result<(Self, MainLoop)> {
        let (executor, receiver, state) = Self::build(config)?;
        Ok((executor, MainLoop::new(receiver, state)))
    }

    /// Start the worker pool plus a dedicated main thread that delivers
    /// callbacks until the executor shuts down.
    pub fn with_dispatcher_thread(config: Config) -> Result<(Self, DispatcherThread)> {
        let name = config.dispatcher_thread_name.clone();
        let (executor, receiver, state) = Self::build(config)?;
        let dispatcher = DispatcherThread::spawn(name, receiver, state)?;
        Ok((executor, dispatcher))
    }

    fn build(config: Config) -> Result<(Self, Receiver<Completion>, Arc<DispatchState>)> {
        config.validate()?;

        let metrics = Arc::new(Metrics::new());
        let pool = WorkerPool::new(&config, metrics.clone())?;
        let (sender, receiver) = unbounded();

        let state = Arc::new(DispatchState {
            in_flight: AtomicUsize::new(0),
            metrics: metrics.clone(),
            callback_panics: PanicHandler::new(config.panic_strategy),
        });

        let shared = Arc::new(Shared {
            pool,
            sender: RwLock::new(Some(sender)),
            shutdown_lock: Mutex::new(()),
            dispatch: state.clone(),
            job_panics: Arc::new(PanicHandler::new(config.panic_strategy)),
            metrics,
            config,
        });

        Ok((Self { shared }, receiver, state))
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Schedule `job`. Taking it by value is what makes a second
    /// submission of the same job impossible.
    pub fn submit<J: BackgroundJob>(&self, job: J) -> Result<TaskHandle> {
        self.submit_inner(job, Priority::Normal, CancellationToken::new())
    }

    pub fn submit_with_priority<J: BackgroundJob>(&self, job: J, priority: Priority) -> Result<TaskHandle> {
        self.submit_inner(job, priority, CancellationToken::new())
    }

    /// Schedule `job` on behalf of `owner`: once the lifecycle ends the job
    /// is skipped if not started and its callback is never delivered.
    pub fn submit_bound<J: BackgroundJob>(&self, job: J, owner: &Lifecycle) -> Result<TaskHandle> {
        self.submit_inner(job, Priority::Normal, owner.child_token())
    }

    fn submit_inner<J: BackgroundJob>(
        &self,
        job: J,
        priority: Priority,
        token: CancellationToken,
    ) -> Result<TaskHandle> {
        let guard = self.shared.sender.read();
        let Some(sender) = guard.as_ref().cloned() else {
            self.shared.metrics.record_rejected();
            return Err(Error::ShutDown);
        };

        let id = TaskId::next();
        let submitted_at = Instant::now();
        let support = RunSupport {
            executor: Arc::downgrade(&self.shared),
            panics: self.shared.job_panics.clone(),
            metrics: self.shared.metrics.clone(),
        };
        let task_token = token.clone();

        let func = move || {
            let delivery = support.execute(job, id, &task_token);
            let completion = Completion {
                id,
                token: task_token,
                submitted_at,
                delivery,
            };
            if sender.send(completion).is_err() {
                tracing::debug!(task = %id, "main loop gone, outcome dropped");
            }
        };

        let in_flight = &self.shared.dispatch.in_flight;
        in_flight.fetch_add(1, Ordering::AcqRel);

        match self.shared.pool.submit(Task::with_priority(id, token.clone(), func, priority)) {
            Ok(()) => {
                self.shared.metrics.record_submitted();
                tracing::trace!(task = %id, ?priority, "submitted");
                Ok(TaskHandle { id, token })
            }
            Err(e) => {
                in_flight.fetch_sub(1, Ordering::AcqRel);
                self.shared.metrics.record_rejected();
                if matches!(e, Error::QueueFull { .. }) {
                    tracing::warn!(task = %id, error = %e, "submission rejected");
                }
                Err(e)
            }
        }
    }

    /// Reject new submissions, finish everything already queued, and join
    /// the workers. The main loop's `run` returns once it has delivered the
    /// remaining callbacks. Idempotent.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.sender.read().is_none()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn num_threads(&self) -> usize {
        self.shared.pool.num_threads()
    }

    /// Admitted tasks whose `run` has not finished yet.
    pub fn pending_tasks(&self) -> usize {
        self.shared.pool.pending_tasks()
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("pool", &self.shared.pool)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

/// What the worker half of a submission needs besides the job itself.
struct RunSupport {
    executor: Weak<Shared>,
    panics: Arc<PanicHandler>,
    metrics: Arc<Metrics>,
}

impl RunSupport {
    fn execute<J: BackgroundJob>(self, mut job: J, id: TaskId, token: &CancellationToken) -> Delivery {
        if token.is_cancelled() {
            return Delivery::Skipped;
        }

        self.metrics.record_started();
        let cx = JobContext::new(id, token.clone(), self.executor);

        let start = Instant::now();
        let result = self.panics.execute(id, "run", || job.run(&cx));
        let elapsed = start.elapsed();

        let outcome = match result {
            Ok(Ok(value)) => {
                self.metrics.record_success(elapsed);
                Outcome::Success(value)
            }
            Ok(Err(error)) => {
                self.metrics.record_failure(elapsed);
                tracing::debug!(task = %id, error = %error, "job failed");
                Outcome::Failure(TaskError::Failed(error))
            }
            Err(panic) => {
                self.metrics.record_panic(elapsed);
                Outcome::Failure(TaskError::Panicked {
                    task: id,
                    message: panic.message,
                })
            }
        };

        let deliver: DeliverFn = Box::new(move |handler: &PanicHandler| {
            let site = outcome.callback_name();
            handler.execute(id, site, move || outcome.deliver(job))
        });
        Delivery::Ready(deliver)
    }
}

// Process-wide executor for the simple API
static GLOBAL_EXECUTOR: RwLock<Option<Executor>> = RwLock::new(None);

/// Install a global executor with the default config. The returned main
/// loop is bound to the calling thread.
pub fn init() -> Result<MainLoop> {
    init_with_config(Config::default())
}

pub fn init_with_config(config: Config) -> Result<MainLoop> {
    let mut global = GLOBAL_EXECUTOR.write();

    if global.is_some() {
        return Err(Error::AlreadyInitialized);
    }

    let (executor, main_loop) = Executor::new(config)?;
    *global = Some(executor);

    Ok(main_loop)
}

/// The global executor installed by [`init`].
pub fn current() -> Result<Executor> {
    GLOBAL_EXECUTOR.read().clone().ok_or(Error::NotInitialized)
}

/// Submit to the global executor.
pub fn submit<J: BackgroundJob>(job: J) -> Result<TaskHandle> {
    current()?.submit(job)
}

/// Remove the global executor and shut it down. No-op if none is installed.
pub fn shutdown() {
    let executor = GLOBAL_EXECUTOR.write().take();
    if let Some(executor) = executor {
        executor.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::job::Job;
    use std::sync::atomic::AtomicBool;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn executor(threads: usize) -> (Executor, MainLoop) {
        let config = Config::builder().num_threads(threads).build().unwrap();
        Executor::new(config).unwrap()
    }

    #[test]
    fn test_custom_config() {
        let (executor, _main_loop) = executor(2);
        assert_eq!(executor.num_threads(), 2);
        assert_eq!(executor.config().worker_threads(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            max_pending: 0,
            ..Config::default()
        };
        assert!(matches!(Executor::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn test_submit_and_deliver() {
        let (executor, mut main_loop) = executor(2);
        let got = Arc::new(Mutex::new(None));
        let sink = got.clone();

        let handle = executor
            .submit(Job::new(|_| Ok::<_, BoxError>(5)).on_success(move |v| *sink.lock() = Some(v)))
            .unwrap();

        assert!(!handle.is_cancelled());
        assert_eq!(main_loop.run_until_idle(), 1);
        assert_eq!(*got.lock(), Some(5));

        let snapshot = executor.metrics();
        assert_eq!(snapshot.tasks_submitted, 1);
        assert_eq!(snapshot.tasks_succeeded, 1);
        assert_eq!(snapshot.callbacks_delivered, 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (executor, mut main_loop) = executor(1);
        executor.shutdown();
        executor.shutdown();

        assert!(executor.is_shutdown());
        let err = executor.submit(Job::new(|_| Ok::<_, BoxError>(()))).unwrap_err();
        assert!(matches!(err, Error::ShutDown));
        assert_eq!(main_loop.run(), 0);
        assert_eq!(executor.metrics().tasks_rejected, 1);
    }

    #[test]
    fn test_concurrent_shutdown_waits_for_join() {
        let (executor, _main_loop) = executor(1);
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();

        executor
            .submit(Job::new(move |_| {
                thread::sleep(Duration::from_millis(100));
                flag.store(true, Ordering::SeqCst);
                Ok::<_, BoxError>(())
            }))
            .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let callers: Vec<_> = (0..2)
            .map(|_| {
                let executor = executor.clone();
                let barrier = barrier.clone();
                let done = done.clone();
                thread::spawn(move || {
                    barrier.wait();
                    executor.shutdown();
                    done.load(Ordering::SeqCst)
                })
            })
            .collect();

        for caller in callers {
            assert!(caller.join().unwrap(), "shutdown returned before the queued job finished");
        }
    }

    #[test]
    fn test_follow_up_from_context() {
        let (executor, mut main_loop) = executor(2);
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = got.clone();

        executor
            .submit(Job::new(move |cx| {
                let follow_up = cx.executor().ok_or("executor gone")?;
                follow_up.submit(Job::new(|_| Ok::<_, BoxError>("second")).on_success(move |v| sink.lock().push(v)))?;
                Ok::<_, BoxError>("first")
            }))
            .unwrap();

        main_loop.run_until_idle();
        assert_eq!(*got.lock(), vec!["second"]);
    }

    #[test]
    fn test_drop_last_handle_ends_main_loop() {
        let (executor, mut main_loop) = executor(2);
        for _ in 0..10 {
            executor.submit(Job::new(|_| Ok::<_, BoxError>(()))).unwrap();
        }
        drop(executor);

        assert_eq!(main_loop.run(), 10);
    }
}
