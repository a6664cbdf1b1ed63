//! Admission control for submissions.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounds the number of admitted tasks that have not finished `run` yet.
#[derive(Debug)]
pub struct BackpressureController {
    max_queue_size: usize,
    current_queue_size: AtomicUsize,
}

impl BackpressureController {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            max_queue_size,
            current_queue_size: AtomicUsize::new(0),
        }
    }

    /// Reserve a slot for a new task. Returns false when full.
    pub fn on_enqueue(&self) -> bool {
        let max = self.max_queue_size;
        self.current_queue_size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < max).then_some(current + 1)
            })
            .is_ok()
    }

    /// Release a slot once a task has run (or was skipped).
    pub fn on_complete(&self) {
        let _ = self
            .current_queue_size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
    }

    pub fn queue_size(&self) -> usize {
        self.current_queue_size.load(Ordering::Relaxed)
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }
}
