//! What a running job can see: its id, its cancellation token and the
//! executor it runs on.

use crate::error::Cancelled;
use crate::executor::TaskId;
use crate::runtime::{Executor, Shared};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug)]
struct TokenState {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

/// Cooperative cancellation flag. Clones share state; a child token also
/// reports cancelled once any ancestor is.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                parent: None,
            }),
        }
    }

    /// A token cancelled by its own `cancel` or by any ancestor's.
    pub fn child(&self) -> Self {
        Self {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(token) = current {
            if token.state.cancelled.load(Ordering::Acquire) {
                return true;
            }
            current = token.state.parent.as_ref();
        }
        false
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of a group of jobs, e.g. a screen that started some loads.
///
/// Ending the lifecycle (explicitly or by dropping it) cancels every job
/// submitted with [`Executor::submit_bound`]: jobs that have not started are
/// skipped and no callback is delivered for any of them.
#[derive(Debug, Default)]
pub struct Lifecycle {
    token: CancellationToken,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn end(&self) {
        self.token.cancel();
    }

    pub fn is_ended(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn child_token(&self) -> CancellationToken {
        self.token.child()
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Handed to [`BackgroundJob::run`](crate::BackgroundJob::run) on the worker thread.
#[derive(Debug)]
pub struct JobContext {
    id: TaskId,
    token: CancellationToken,
    executor: Weak<Shared>,
}

impl JobContext {
    pub(crate) fn new(id: TaskId, token: CancellationToken, executor: Weak<Shared>) -> Self {
        Self {
            id,
            token,
            executor,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `Err(Cancelled)` once the task has been cancelled; use with `?`
    /// between steps of a long `run`.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The executor running this job, for submitting follow-up work.
    /// `None` once every `Executor` handle is gone.
    pub fn executor(&self) -> Option<Executor> {
        self.executor.upgrade().map(Executor::from_shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cancel() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CancellationToken::new();
        let child = parent.child();
        let grandchild = child.child();

        grandchild.cancel();
        assert!(!parent.is_cancelled());
        assert!(!child.is_cancelled());

        let other = child.child();
        parent.cancel();
        assert!(child.is_cancelled());
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_lifecycle_drop_cancels_children() {
        let lifecycle = Lifecycle::new();
        let token = lifecycle.child_token();
        assert!(!lifecycle.is_ended());

        drop(lifecycle);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_checkpoint() {
        let token = CancellationToken::new();
        let cx = JobContext::new(TaskId::next(), token.clone(), Weak::new());

        assert!(cx.checkpoint().is_ok());
        assert!(cx.executor().is_none());

        token.cancel();
        assert_eq!(cx.checkpoint(), Err(Cancelled));
    }
}
