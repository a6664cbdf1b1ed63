//! Idle backoff for worker threads with an empty queue.

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

/// Spin, then yield, then park with a timeout.
///
/// The park phase is woken early by `Thread::unpark` from a submitter, so an
/// idle pool costs almost nothing while new work still starts promptly.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
    park_timeout: Duration,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 10;

    pub fn new() -> Self {
        Self::with_park_timeout(Duration::from_millis(1))
    }

    pub fn with_park_timeout(park_timeout: Duration) -> Self {
        Self {
            step: 0,
            park_timeout,
        }
    }

    /// Reset after finding work.
    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Perform one step of backoff.
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                spin_loop();
            }
        } else if self.step <= Self::YIELD_LIMIT {
            thread::yield_now();
        } else {
            thread::park_timeout(self.park_timeout);
        }

        if self.step <= Self::YIELD_LIMIT {
            self.step += 1;
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
