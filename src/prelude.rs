pub use crate::config::{Config, ConfigBuilder};
pub use crate::context::{CancellationToken, JobContext, Lifecycle};
pub use crate::dispatcher::{DispatcherThread, MainLoop};
pub use crate::error::{BoxError, Error, Result, TaskError};
pub use crate::executor::Priority;
pub use crate::job::{BackgroundJob, Job, Outcome};
pub use crate::runtime::{Executor, TaskHandle};

pub use crate::telemetry::MetricsSnapshot;
