use crate::executor::TaskId;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error a job's `run` may fail with; `?` converts into it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("executor error: {0}")]
    Executor(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("runtime not initialized")]
    NotInitialized,

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("executor has been shut down")]
    ShutDown,

    #[error("submission rejected: {pending} tasks pending (max {max})")]
    QueueFull { pending: usize, max: usize },

    #[error("worker panic: {0}")]
    WorkerPanic(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "telemetry")]
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

impl Error {
    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    #[cfg(feature = "telemetry")]
    pub fn telemetry<S: Into<String>>(msg: S) -> Self {
        Error::Telemetry(msg.into())
    }
}

/// Failure captured from a job's `run` and handed to `on_failure`.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// `run` returned an error.
    #[error("task failed: {0}")]
    Failed(#[source] BoxError),

    /// `run` panicked; the panic was caught on the worker.
    #[error("task {task} panicked: {message}")]
    Panicked { task: TaskId, message: String },
}

impl TaskError {
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked { .. })
    }

    /// True when `run` gave up through [`JobContext::checkpoint`](crate::JobContext::checkpoint).
    pub fn is_cancelled(&self) -> bool {
        self.downcast_ref::<Cancelled>().is_some()
    }

    /// Borrow the inner error as `E` if `run` failed with one.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            TaskError::Failed(inner) => inner.downcast_ref::<E>(),
            TaskError::Panicked { .. } => None,
        }
    }
}

/// Returned by a cancellation checkpoint once the task's token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task cancelled")]
pub struct Cancelled;
