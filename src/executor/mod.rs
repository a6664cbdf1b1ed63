//! Worker-side execution.
//!
//! A fixed pool of worker threads pulls type-erased tasks from a
//! work-stealing injector (normal priority) and two shared heaps: one for
//! `Realtime`/`High`, checked before the injector, and one for
//! `Low`/`Background`, checked only once stealing also finds nothing.
//! Panics inside jobs are caught by the `PanicHandler`.

pub mod panic_handler;
pub mod priority;
pub mod task;
pub(crate) mod worker;
pub mod worker_pool;

pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use priority::Priority;
pub use task::TaskId;
pub use worker_pool::WorkerPool;

pub(crate) use task::Task;
