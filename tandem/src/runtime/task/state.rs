use std::sync::atomic::{AtomicUsize, Ordering};

/// Task is parked, waiting for a wake-up.
const IDLE: usize = 0;

/// Task sits in a run queue.
const QUEUED: usize = 1;

/// A worker is polling the task right now.
const RUNNING: usize = 2;

/// Task was woken while being polled and must be re-queued afterwards.
const NOTIFIED: usize = 3;

/// The future returned `Poll::Ready`; it is never polled again.
const COMPLETED: usize = 4;

/// Scheduling state of a task.
///
/// Only the transitions below are legal:
///
/// ```text
/// QUEUED ──run──▶ RUNNING ──pending──▶ IDLE ──wake──▶ QUEUED
///                    │  └──wake──▶ NOTIFIED ──pending──▶ QUEUED
///                    └──ready──▶ COMPLETED
/// ```
///
/// The `RUNNING` state is what grants exclusive access to the task's
/// future; every other state forbids touching it.
pub(crate) struct TaskState(AtomicUsize);

impl TaskState {
    /// A freshly spawned task is queued straight away.
    pub(crate) fn queued() -> Self {
        Self(AtomicUsize::new(QUEUED))
    }

    /// Claims the task for polling. Returns `false` if it is not queued.
    pub(crate) fn begin_run(&self) -> bool {
        self.0
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the task after a `Poll::Pending`.
    ///
    /// Returns `true` when a wake-up arrived during the poll, in which case
    /// the task has been moved back to `QUEUED` and the caller must push
    /// it onto a run queue.
    pub(crate) fn end_pending(&self) -> bool {
        match self
            .0
            .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => false,
            Err(_) => {
                self.0.store(QUEUED, Ordering::Release);
                true
            }
        }
    }

    /// Marks the task as finished.
    pub(crate) fn complete(&self) {
        self.0.store(COMPLETED, Ordering::Release);
    }

    /// Records a wake-up.
    ///
    /// Returns `true` if the caller is responsible for scheduling the task.
    pub(crate) fn wake(&self) -> bool {
        loop {
            match self.0.load(Ordering::Acquire) {
                IDLE => {
                    if self
                        .0
                        .compare_exchange(IDLE, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return true;
                    }
                }
                RUNNING => {
                    if self
                        .0
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}
