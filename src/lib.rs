//! handoff - background jobs with main-thread result delivery
//!
//! Runs a unit of work on a worker pool and hands its single outcome back
//! to one "main" dispatcher context, where exactly one of the job's
//! `on_success` / `on_failure` callbacks runs.
//!
//! # Quick Start
//!
//! ```no_run
//! use handoff::prelude::*;
//!
//! let (executor, mut main_loop) = Executor::new(Config::default()).unwrap();
//!
//! executor
//!     .submit(
//!         Job::new(|_cx| Ok::<_, BoxError>("ok"))
//!             .on_success(|v| println!("loaded: {}", v))
//!             .on_failure(|e| eprintln!("failed: {}", e)),
//!     )
//!     .unwrap();
//!
//! // callbacks run here, on this thread
//! main_loop.run_until_idle();
//! executor.shutdown();
//! ```
//!
//! # Guarantees
//!
//! - `run` executes exactly once per submitted job, never on the main loop's thread
//! - errors and panics from `run` are caught and become `on_failure`
//! - exactly one callback per job, on the main loop's thread, one at a time
//! - cancelled jobs (via [`TaskHandle::cancel`] or an ended [`Lifecycle`])
//!   deliver no callback at all

#![warn(missing_debug_implementations)]

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod job;
pub mod prelude;
pub mod runtime;
pub mod telemetry;
pub mod util;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use context::{CancellationToken, JobContext, Lifecycle};
pub use dispatcher::{DispatcherThread, MainLoop};
pub use error::{BoxError, Cancelled, Error, Result, TaskError};
pub use executor::{PanicStrategy, Priority, TaskId};
pub use job::{BackgroundJob, Job, Outcome};
pub use runtime::{current, init, init_with_config, shutdown, submit, Executor, TaskHandle};
