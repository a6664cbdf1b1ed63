//! Main-thread side: receives finished jobs and runs their callbacks.
//!
//! Workers send one [`Completion`] per task over an unbounded channel. The
//! single [`MainLoop`] consumer takes them one at a time, so callbacks never
//! overlap and each runs to completion before the next starts.

use crate::context::CancellationToken;
use crate::error::{Error, Result};
use crate::executor::{PanicHandler, PanicInfo, TaskId};
use crate::telemetry::Metrics;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

const IDLE_POLL: Duration = Duration::from_millis(10);

/// Runs the right callback for a finished job; built on the worker, called
/// on the main loop.
pub(crate) type DeliverFn = Box<dyn FnOnce(&PanicHandler) -> std::result::Result<(), PanicInfo> + Send>;

pub(crate) enum Delivery {
    Ready(DeliverFn),
    /// Cancelled before `run` started.
    Skipped,
}

/// One finished task on its way to the main loop.
pub(crate) struct Completion {
    pub id: TaskId,
    pub token: CancellationToken,
    pub submitted_at: Instant,
    pub delivery: Delivery,
}

/// State the executor and its main loop share.
#[derive(Debug)]
pub(crate) struct DispatchState {
    /// Submitted tasks whose completion has not been handled yet.
    pub in_flight: AtomicUsize,
    pub metrics: Arc<Metrics>,
    pub callback_panics: PanicHandler,
}

/// The main/UI context. Only the thread that created it can run callbacks.
///
/// `MainLoop` is deliberately `!Send`.
pub struct MainLoop {
    receiver: Receiver<Completion>,
    state: Arc<DispatchState>,
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl MainLoop {
    pub(crate) fn new(receiver: Receiver<Completion>, state: Arc<DispatchState>) -> Self {
        Self {
            receiver,
            state,
            thread: thread::current().id(),
            _not_send: PhantomData,
        }
    }

    /// The thread every callback runs on.
    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    /// Submitted tasks not yet handled by this loop.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::Acquire)
    }

    /// Handle every completion already waiting, without blocking.
    pub fn run_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(completion) => {
                    self.dispatch(completion);
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return handled,
            }
        }
    }

    /// Wait up to `timeout` for a completion, then drain whatever else is ready.
    pub fn run_timeout(&mut self, timeout: Duration) -> usize {
        match self.receiver.recv_timeout(timeout) {
            Ok(completion) => {
                self.dispatch(completion);
                1 + self.run_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Block until every submitted task (including ones submitted by
    /// callbacks meanwhile) has been handled.
    pub fn run_until_idle(&mut self) -> usize {
        let mut handled = 0;
        while self.in_flight() > 0 {
            match self.receiver.recv_timeout(IDLE_POLL) {
                Ok(completion) => {
                    self.dispatch(completion);
                    handled += 1;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        handled
    }

    /// Block until the executor is shut down and everything it accepted has
    /// been handled.
    pub fn run(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(completion) = self.receiver.recv() {
            self.dispatch(completion);
            handled += 1;
        }
        tracing::debug!(handled, "main loop finished");
        handled
    }

    fn dispatch(&mut self, completion: Completion) {
        let Completion {
            id,
            token,
            submitted_at,
            delivery,
        } = completion;

        match delivery {
            Delivery::Ready(deliver) if !token.is_cancelled() => {
                if deliver(&self.state.callback_panics).is_err() {
                    self.state.metrics.record_callback_panic();
                }
                self.state.metrics.record_delivered(submitted_at.elapsed());
            }
            _ => {
                tracing::debug!(task = %id, "cancelled, callback suppressed");
                self.state.metrics.record_cancelled();
            }
        }

        self.state.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for MainLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainLoop")
            .field("thread", &self.thread)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// A dedicated thread acting as the main context, running [`MainLoop::run`].
#[derive(Debug)]
pub struct DispatcherThread {
    handle: JoinHandle<usize>,
    thread: ThreadId,
}

impl DispatcherThread {
    pub(crate) fn spawn(
        name: String,
        receiver: Receiver<Completion>,
        state: Arc<DispatchState>,
    ) -> Result<Self> {
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || MainLoop::new(receiver, state).run())
            .map_err(|e| Error::executor(format!("dispatcher spawn failed: {}", e)))?;

        let thread = handle.thread().id();
        Ok(Self { handle, thread })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread
    }

    /// Wait for the loop to finish; it does once the executor is shut down.
    /// Returns the number of completions handled.
    pub fn join(self) -> Result<usize> {
        self.handle
            .join()
            .map_err(|_| Error::WorkerPanic("dispatcher thread panicked".to_string()))
    }
}
