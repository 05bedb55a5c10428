use super::ReactorHandle;
use super::command::Command;
use crate::runtime::context;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use std::cmp::Ordering;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Work run on the reactor thread when a timer expires.
type Callback = Box<dyn FnOnce() + Send>;

/// An entry in the reactor timer queue.
///
/// Disarming or re-arming a timer leaves its entry in the heap. Each entry
/// carries the arming generation it was created for: a stale entry finds
/// a different generation in its slot when it pops, and the reactor purges
/// stale entries once they outnumber the live ones.
pub(crate) struct TimerEntry {
    /// The time at which the timer should fire.
    pub(crate) deadline: Instant,

    slot: Arc<TimerSlot>,
    generation: u64,
}

impl TimerEntry {
    /// Runs the slot's callback if this entry is still current.
    pub(crate) fn fire(self) {
        self.slot.fire(self.generation);
    }

    /// Whether this entry still belongs to an armed timer.
    pub(crate) fn is_current(&self) -> bool {
        let inner = self.slot.inner.lock();
        inner.generation == self.generation && matches!(inner.state, SlotState::Armed(_))
    }
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline.eq(&other.deadline)
    }
}

impl Ord for TimerEntry {
    /// Reversed, so that a `BinaryHeap<TimerEntry>` pops the earliest
    /// deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.deadline.cmp(&self.deadline)
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

enum SlotState {
    Idle,
    Armed(Callback),

    /// The callback is running on the given thread.
    Firing(ThreadId),
}

struct SlotInner {
    state: SlotState,

    /// Bumped on every arm and disarm.
    generation: u64,
}

/// State shared between a [`TimerHandle`] and its queued entries.
struct TimerSlot {
    inner: Mutex<SlotInner>,

    /// Signalled when a callback finishes running.
    fired: Condvar,
}

impl TimerSlot {
    fn fire(&self, generation: u64) {
        let callback = {
            let mut inner = self.inner.lock();

            if inner.generation != generation {
                return;
            }

            let firing = SlotState::Firing(thread::current().id());
            match std::mem::replace(&mut inner.state, firing) {
                SlotState::Armed(callback) => callback,
                other => {
                    inner.state = other;
                    return;
                }
            }
        };

        trace!(generation, "timer fired");
        callback();

        let mut inner = self.inner.lock();
        if matches!(inner.state, SlotState::Firing(_)) {
            inner.state = SlotState::Idle;
        }
        drop(inner);

        self.fired.notify_all();
    }
}

/// A re-armable one-shot timer backed by the reactor.
///
/// At most one callback is armed at a time. The three operations give the
/// guarantees the timer primitives build on:
/// - [`arm`](Self::arm) replaces any previously armed callback,
/// - [`disarm`](Self::disarm) guarantees the armed callback will not start,
/// - [`drain`](Self::drain) waits for a callback that already started.
pub(crate) struct TimerHandle {
    slot: Arc<TimerSlot>,
    reactor: ReactorHandle,
}

impl TimerHandle {
    pub(crate) fn new(reactor: ReactorHandle) -> Self {
        Self {
            slot: Arc::new(TimerSlot {
                inner: Mutex::new(SlotInner {
                    state: SlotState::Idle,
                    generation: 0,
                }),
                fired: Condvar::new(),
            }),
            reactor,
        }
    }

    /// Creates a timer on the reactor of the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside the context of a runtime.
    pub(crate) fn current() -> Self {
        Self::new(context::current_reactor())
    }

    /// Arms the timer to run `callback` on the reactor thread after
    /// `duration`.
    ///
    /// A duration too large to represent as a deadline arms a timer that
    /// never fires.
    pub(crate) fn arm(&self, duration: Duration, callback: impl FnOnce() + Send + 'static) {
        let deadline = Instant::now().checked_add(duration);

        let (generation, replaced) = {
            let mut inner = self.slot.inner.lock();
            inner.generation += 1;

            let previous = std::mem::replace(&mut inner.state, SlotState::Armed(Box::new(callback)));
            (inner.generation, previous)
        };
        drop(replaced);

        trace!(generation, ?duration, "timer armed");

        if let Some(deadline) = deadline {
            self.reactor.send(Command::SetTimer(TimerEntry {
                deadline,
                slot: self.slot.clone(),
                generation,
            }));
        }
    }

    /// Disarms the timer.
    ///
    /// Returns `true` if an armed callback was dropped without running.
    /// A callback that already started is not affected; see
    /// [`drain`](Self::drain).
    pub(crate) fn disarm(&self) -> bool {
        let dropped = {
            let mut inner = self.slot.inner.lock();

            if !matches!(inner.state, SlotState::Armed(_)) {
                return false;
            }

            inner.generation += 1;
            std::mem::replace(&mut inner.state, SlotState::Idle)
        };
        drop(dropped);

        trace!("timer disarmed");

        true
    }

    /// Blocks until a callback that is running on another thread finishes.
    ///
    /// Returns immediately when called from within the callback itself.
    pub(crate) fn drain(&self) {
        let me = thread::current().id();
        let mut inner = self.slot.inner.lock();

        while matches!(inner.state, SlotState::Firing(id) if id != me) {
            self.slot.fired.wait(&mut inner);
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.disarm();
    }
}
