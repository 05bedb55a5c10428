use crate::runtime::task::Task;

use parking_lot::Mutex;

use std::collections::VecDeque;
use std::sync::Arc;

/// A per-worker task queue.
///
/// The owning worker pushes and pops at the back (LIFO), which keeps the
/// most recently spawned work hot in cache. Other workers steal from the
/// front (FIFO).
pub(crate) struct LocalQueue {
    inner: Mutex<VecDeque<Arc<Task>>>,
}

impl LocalQueue {
    /// Creates an empty local task queue.
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn push(&self, task: Arc<Task>) {
        self.inner.lock().push_back(task);
    }

    pub(crate) fn pop(&self) -> Option<Arc<Task>> {
        self.inner.lock().pop_back()
    }

    /// Removes the oldest task, for use by other workers.
    pub(crate) fn steal(&self) -> Option<Arc<Task>> {
        self.inner.lock().pop_front()
    }

    /// Drops every queued task.
    pub(crate) fn clear(&self) {
        let tasks = std::mem::take(&mut *self.inner.lock());
        drop(tasks);
    }
}
