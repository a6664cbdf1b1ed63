use super::task::Task;
use parking_lot::Mutex;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Priority {
    Realtime = 0,
    High = 1,
    #[default]
    Normal = 2,
    Low = 3,
    Background = 4,
}

#[derive(Debug)]
struct PriorityTask {
    task: Task,
    priority: Priority,
    seq: u64,
}

impl PartialEq for PriorityTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for PriorityTask {}

impl PartialOrd for PriorityTask {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

// max-heap: more urgent priority first, then FIFO within a level
impl Ord for PriorityTask {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Shared heap for non-`Normal` submissions. The pool keeps one for levels
/// above `Normal` and one for levels below it.
#[derive(Debug, Default)]
pub(crate) struct PriorityQueue {
    heap: Mutex<BinaryHeap<PriorityTask>>,
    next_seq: AtomicU64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: Task) {
        let priority = task.priority;
        self.heap.lock().push(PriorityTask {
            task,
            priority,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        });
    }

    pub fn pop(&self) -> Option<Task> {
        self.heap.lock().pop().map(|pt| pt.task)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    #[cfg(test)]
    pub fn peek(&self) -> Option<Priority> {
        self.heap.lock().peek().map(|pt| pt.priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;
    use crate::executor::TaskId;

    fn dummy_task(priority: Priority) -> Task {
        Task::with_priority(TaskId::next(), CancellationToken::new(), || {}, priority)
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Realtime < Priority::High);
        assert!(Priority::High < Priority::Normal);
        assert!(Priority::Normal < Priority::Low);
        assert!(Priority::Low < Priority::Background);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn test_priority_queue() {
        let queue = PriorityQueue::new();

        queue.push(dummy_task(Priority::Low));
        queue.push(dummy_task(Priority::Realtime));
        queue.push(dummy_task(Priority::Background));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek(), Some(Priority::Realtime));
        queue.pop();
        assert_eq!(queue.peek(), Some(Priority::Low));
        queue.pop();
        assert_eq!(queue.peek(), Some(Priority::Background));
        queue.pop();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_fifo_within_level() {
        let queue = PriorityQueue::new();
        let first = dummy_task(Priority::High);
        let first_id = first.id;
        queue.push(first);
        queue.push(dummy_task(Priority::High));

        assert_eq!(queue.pop().map(|t| t.id), Some(first_id));
    }
}
