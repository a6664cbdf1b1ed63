//! The background job contract.
//!
//! A job does its work in [`BackgroundJob::run`] on a worker thread. Exactly
//! one of [`BackgroundJob::on_success`] / [`BackgroundJob::on_failure`] is then
//! called on the thread that owns the [`MainLoop`](crate::MainLoop), unless the
//! job was cancelled first.
//!
//! ```no_run
//! use handoff::{BackgroundJob, BoxError, Config, Executor, JobContext, TaskError};
//!
//! struct LoadReleases {
//!     repo: String,
//! }
//!
//! impl BackgroundJob for LoadReleases {
//!     type Output = Vec<String>;
//!
//!     fn run(&mut self, _cx: &JobContext) -> Result<Vec<String>, BoxError> {
//!         Ok(vec![format!("{} v1.0", self.repo)])
//!     }
//!
//!     fn on_success(self, releases: Vec<String>) {
//!         println!("{} releases", releases.len());
//!     }
//!
//!     fn on_failure(self, error: TaskError) {
//!         eprintln!("could not load {}: {}", self.repo, error);
//!     }
//! }
//!
//! let (executor, mut main_loop) = Executor::new(Config::default()).unwrap();
//! executor.submit(LoadReleases { repo: "gh4a".into() }).unwrap();
//! main_loop.run_until_idle();
//! ```

use crate::context::JobContext;
use crate::error::{BoxError, TaskError};
use std::fmt;

/// A unit of background work plus its two completion callbacks.
///
/// The job value travels to a worker for `run` and back to the main loop
/// for the callback, so it must be `Send`. Callbacks consume it.
pub trait BackgroundJob: Send + Sized + 'static {
    type Output: Send + 'static;

    /// Runs on a worker thread. Errors and panics both become
    /// `on_failure`.
    fn run(&mut self, cx: &JobContext) -> Result<Self::Output, BoxError>;

    /// Runs on the main loop's thread after `run` succeeded.
    fn on_success(self, output: Self::Output);

    /// Runs on the main loop's thread after `run` failed or panicked.
    ///
    /// The default absorbs the failure after logging it at `warn`.
    fn on_failure(self, error: TaskError) {
        log_unhandled(&error);
    }
}

fn log_unhandled(error: &TaskError) {
    tracing::warn!(error = %error, "background job failed and has no failure handler");
}

/// Result of one execution of `run`.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Failure(TaskError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn into_result(self) -> Result<T, TaskError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }

    /// Name of the callback `deliver` will invoke.
    pub(crate) fn callback_name(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "on_success",
            Outcome::Failure(_) => "on_failure",
        }
    }

    /// Hand the outcome to exactly one of the job's callbacks.
    pub(crate) fn deliver<J>(self, job: J)
    where
        J: BackgroundJob<Output = T>,
    {
        match self {
            Outcome::Success(value) => job.on_success(value),
            Outcome::Failure(error) => job.on_failure(error),
        }
    }
}

impl<T> From<Result<T, TaskError>> for Outcome<T> {
    fn from(result: Result<T, TaskError>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::Failure(error),
        }
    }
}

type RunFn<T> = Box<dyn FnOnce(&JobContext) -> Result<T, BoxError> + Send>;
type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type FailureFn = Box<dyn FnOnce(TaskError) + Send>;

/// Closure-built job for call sites that don't want a named type.
///
/// ```no_run
/// # use handoff::{Config, Executor, Job};
/// # let (executor, mut main_loop) = Executor::new(Config::default()).unwrap();
/// executor
///     .submit(
///         Job::new(|_cx| Ok::<_, std::io::Error>(21 * 2))
///             .on_success(|n| println!("got {}", n))
///             .on_failure(|e| eprintln!("failed: {}", e)),
///     )
///     .unwrap();
/// main_loop.run_until_idle();
/// ```
pub struct Job<T> {
    run: Option<RunFn<T>>,
    on_success: Option<SuccessFn<T>>,
    on_failure: Option<FailureFn>,
}

impl<T: Send + 'static> Job<T> {
    pub fn new<F, E>(run: F) -> Self
    where
        F: FnOnce(&JobContext) -> Result<T, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            run: Some(Box::new(move |cx: &JobContext| run(cx).map_err(Into::into))),
            on_success: None,
            on_failure: None,
        }
    }

    /// Without this the produced value is dropped.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Without this failures go to the logging default of
    /// [`BackgroundJob::on_failure`].
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(TaskError) + Send + 'static,
    {
        self.on_failure = Some(Box::new(f));
        self
    }
}

impl<T: Send + 'static> BackgroundJob for Job<T> {
    type Output = T;

    fn run(&mut self, cx: &JobContext) -> Result<T, BoxError> {
        let run = self.run.take().ok_or("job has already run")?;
        run(cx)
    }

    fn on_success(self, output: T) {
        if let Some(f) = self.on_success {
            f(output);
        }
    }

    fn on_failure(self, error: TaskError) {
        match self.on_failure {
            Some(f) => f(error),
            None => log_unhandled(&error),
        }
    }
}

impl<T> fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("has_run", &self.run.is_none())
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}
