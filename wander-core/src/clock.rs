//! Virtual clock and scheduled-task queue.
//!
//! Every delayed effect in the scheduler (staged lines, encounter expiry,
//! departure sweeps, response safety nets) is a task on this queue. Tasks
//! run in due-time order; tasks due at the same instant run in the order
//! they were scheduled. Nothing here reads the wall clock, so tests drive
//! time explicitly.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::SimTime;

/// Handle returned by [`TaskQueue::schedule`], used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

#[derive(Debug)]
struct Scheduled<T> {
    due: SimTime,
    id: TaskId,
    task: T,
}

// Ordering: (due ASC, id ASC). Wrapped in `Reverse` so the heap yields the
// earliest entry first.
impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .cmp(&other.due)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Monotonic simulated clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimClock {
    now: SimTime,
}

impl SimClock {
    /// Current simulated instant.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Move the clock to `to`. Never moves backwards.
    pub fn set(&mut self, to: SimTime) {
        self.now = self.now.max(to);
    }
}

/// Min-heap of tasks keyed by due time, with lazy cancellation.
#[derive(Debug)]
pub struct TaskQueue<T> {
    heap: BinaryHeap<Reverse<Scheduled<T>>>,
    cancelled: HashSet<TaskId>,
    next_id: u64,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_id: 0,
        }
    }
}

impl<T> TaskQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run at `now + delay`.
    pub fn schedule(&mut self, now: SimTime, delay: Duration, task: T) -> TaskId {
        self.schedule_at(now + delay, task)
    }

    /// Schedule `task` at an absolute instant.
    pub fn schedule_at(&mut self, due: SimTime, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.heap.push(Reverse(Scheduled { due, id, task }));
        id
    }

    /// Cancel a pending task. Cancelling a task that already ran is a no-op.
    pub fn cancel(&mut self, id: TaskId) {
        if self.heap.iter().any(|Reverse(s)| s.id == id) {
            self.cancelled.insert(id);
        }
    }

    /// Due time of the earliest live task.
    pub fn next_due(&mut self) -> Option<SimTime> {
        self.discard_cancelled_head();
        self.heap.peek().map(|Reverse(s)| s.due)
    }

    /// Pop the earliest live task if it is due at or before `now`.
    pub fn pop_due(&mut self, now: SimTime) -> Option<(SimTime, TaskId, T)> {
        self.discard_cancelled_head();
        if self.heap.peek().is_some_and(|Reverse(s)| s.due <= now) {
            self.heap.pop().map(|Reverse(s)| (s.due, s.id, s.task))
        } else {
            None
        }
    }

    /// Number of live tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap
            .iter()
            .filter(|Reverse(s)| !self.cancelled.contains(&s.id))
            .count()
    }

    /// Whether no live tasks remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn discard_cancelled_head(&mut self) {
        while let Some(id) = self.heap.peek().map(|Reverse(s)| s.id) {
            if self.cancelled.remove(&id) {
                self.heap.pop();
            } else {
                break;
            }
        }
    }
}
