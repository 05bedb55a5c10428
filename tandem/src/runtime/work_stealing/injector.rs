use crate::runtime::task::Task;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shared handle to the global task injector.
pub(crate) type InjectorHandle = Arc<Injector>;

/// Longest a worker sleeps before re-checking the queues on its own.
const PARK_TIMEOUT: Duration = Duration::from_millis(1);

/// Global task queue of the work-stealing scheduler.
///
/// Tasks spawned from outside a worker, and tasks re-scheduled by a
/// wake-up, land here before a worker picks them up. The injector also
/// parks idle workers and wakes them when work arrives.
pub(crate) struct Injector {
    /// Queue holding globally injected tasks.
    queue: Mutex<VecDeque<Arc<Task>>>,

    /// Signalled whenever a task is pushed or shutdown begins.
    available: Condvar,

    /// Indicates whether the executor is shutting down.
    shutdown: AtomicBool,

    /// Every task not yet dropped, keyed by address.
    ///
    /// A task parked on a waker it owns itself (through a timer or an I/O
    /// registration) is never dropped on its own; [`release`](Self::release)
    /// breaks those cycles at shutdown.
    live: Mutex<HashMap<usize, Weak<Task>>>,
}

impl Injector {
    /// Creates a new empty injector.
    pub(crate) fn new() -> Self {
        Injector {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Signals shutdown, wakes all parked workers and drops every task
    /// still waiting in the queue.
    ///
    /// Dropping a queued task drops its awaitable, which in turn lets
    /// pending [`SharedFuture`](crate::task::SharedFuture)s resolve as
    /// cancelled instead of hanging.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);

        let abandoned = std::mem::take(&mut *self.queue.lock());
        self.available.notify_all();

        if !abandoned.is_empty() {
            debug!(tasks = abandoned.len(), "dropping queued tasks at shutdown");
        }
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called.
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Pushes a task into the global queue and wakes one parked worker.
    ///
    /// After shutdown the task is dropped immediately.
    pub(crate) fn push(&self, task: Arc<Task>) {
        if self.is_shutdown() {
            drop(task);
            return;
        }

        self.queue.lock().push_back(task);
        self.available.notify_one();
    }

    /// Parks the current worker until work arrives, shutdown begins or
    /// a short timeout elapses.
    ///
    /// The timeout bounds how long a task pushed to another worker's
    /// local queue can sit unnoticed.
    pub(crate) fn park(&self) {
        let mut queue = self.queue.lock();

        if self.is_shutdown() || !queue.is_empty() {
            return;
        }

        self.available.wait_for(&mut queue, PARK_TIMEOUT);
    }

    /// Records a newly spawned task.
    pub(crate) fn register(&self, task: &Arc<Task>) {
        self.live
            .lock()
            .insert(Arc::as_ptr(task) as usize, Arc::downgrade(task));
    }

    /// Forgets the task at `address`. Called when the task is dropped.
    pub(crate) fn unregister(&self, address: usize) {
        self.live.lock().remove(&address);
    }

    /// Drops the body of every task still alive.
    ///
    /// Must only be called once every worker thread has exited.
    pub(crate) fn release(&self) {
        let tasks: Vec<Arc<Task>> = self
            .live
            .lock()
            .drain()
            .filter_map(|(_, task)| task.upgrade())
            .collect();

        if !tasks.is_empty() {
            debug!(tasks = tasks.len(), "releasing unfinished tasks");
        }

        for task in &tasks {
            task.abandon();
        }
    }

    /// Takes the oldest task from the global queue.
    pub(crate) fn steal(&self) -> Option<Arc<Task>> {
        self.queue.lock().pop_front()
    }
}
