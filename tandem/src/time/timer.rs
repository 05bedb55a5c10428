use crate::error::{Error, Result};
use crate::reactor::timer::TimerHandle;

use parking_lot::Mutex;
use tracing::trace;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

/// The current wait has not been resumed.
const WAITING: u8 = 0;

/// The current wait was resumed by the timer firing.
const ELAPSED: u8 = 1;

/// The current wait was resumed by [`CancellableTimer::cancel`].
const CANCELLED: u8 = 2;

struct Shared {
    /// Created on first arm, from the runtime of the waiting task.
    timer: OnceLock<TimerHandle>,

    /// A wait cycle is armed and has not completed.
    armed: AtomicBool,

    /// Set by `cancel` before it resumes the waiter.
    cancelled: AtomicBool,

    /// Who resumed the current cycle, if anyone.
    resumed: AtomicU8,

    waiter: Mutex<Option<Waker>>,
}

impl Shared {
    /// Resumes the current cycle with `outcome`, unless it already was.
    fn resume(&self, outcome: u8) -> bool {
        if self
            .resumed
            .compare_exchange(WAITING, outcome, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        if let Some(waker) = self.waiter.lock().take() {
            waker.wake();
        }

        true
    }

    fn cancel(&self) {
        if !self.armed.load(Ordering::Acquire) || self.resumed.load(Ordering::Acquire) != WAITING {
            return;
        }

        self.cancelled.store(true, Ordering::Release);

        if let Some(timer) = self.timer.get() {
            timer.disarm();
            timer.drain();
        }

        if self.resume(CANCELLED) {
            trace!("timer wait cancelled");
        } else {
            self.cancelled.store(false, Ordering::Release);
        }
    }
}

/// A single-waiter timer whose pending wait can be cancelled from any
/// thread.
///
/// Each call to [`wait`](Self::wait) starts a new cycle:
///
/// ```text
/// Idle ──wait──▶ Armed ──fires──▶ Fired      (Ok(()))
///                  └──cancel──▶ Cancelled    (Err(Error::Cancelled))
/// ```
///
/// Firing and cancelling race through a single compare-and-swap, so the
/// waiter is resumed exactly once with exactly one outcome. Cancelling an
/// idle timer, or one whose wait already completed, does nothing.
///
/// # Examples
///
/// ```rust,ignore
/// let mut timer = CancellableTimer::new();
/// let canceller = timer.canceller();
///
/// std::thread::spawn(move || canceller.cancel());
///
/// let result = timer.wait(Duration::from_secs(20 * 60)).await;
/// assert!(matches!(result, Err(Error::Cancelled)));
/// ```
pub struct CancellableTimer {
    shared: Arc<Shared>,
}

/// A cloneable handle that cancels the pending wait of a
/// [`CancellableTimer`] from another task or thread.
#[derive(Clone)]
pub struct TimerCanceller {
    shared: Arc<Shared>,
}

impl CancellableTimer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                timer: OnceLock::new(),
                armed: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                resumed: AtomicU8::new(WAITING),
                waiter: Mutex::new(None),
            }),
        }
    }

    /// Waits for `duration`.
    ///
    /// A zero duration completes immediately without suspending. The wait
    /// resolves to `Ok(())` when the timer fires and to
    /// [`Error::Cancelled`] when it is cancelled first.
    ///
    /// # Panics
    ///
    /// The returned future panics if polled outside of a running runtime.
    pub fn wait(&mut self, duration: Duration) -> TimerWait<'_> {
        TimerWait {
            shared: &self.shared,
            duration,
            armed: false,
            finished: false,
        }
    }

    /// Cancels the pending wait, if any.
    ///
    /// Waits for a timer callback that is already running to finish, then
    /// resumes the waiter with [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Returns a handle that can cancel this timer from elsewhere.
    pub fn canceller(&self) -> TimerCanceller {
        TimerCanceller {
            shared: self.shared.clone(),
        }
    }

    /// Returns `true` if the most recent wait was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellableTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerCanceller {
    /// See [`CancellableTimer::cancel`].
    pub fn cancel(&self) {
        self.shared.cancel();
    }
}

/// Future returned by [`CancellableTimer::wait`].
///
/// Dropping it before completion disarms the timer.
pub struct TimerWait<'a> {
    shared: &'a Arc<Shared>,
    duration: Duration,
    armed: bool,
    finished: bool,
}

impl TimerWait<'_> {
    fn arm(&mut self) {
        let shared = self.shared;

        shared.cancelled.store(false, Ordering::Release);
        shared.resumed.store(WAITING, Ordering::Release);
        shared.armed.store(true, Ordering::Release);

        let weak = Arc::downgrade(shared);
        shared.timer.get_or_init(TimerHandle::current).arm(self.duration, move || {
            if let Some(shared) = weak.upgrade() {
                shared.resume(ELAPSED);
            }
        });

        self.armed = true;
    }

    fn finish(&mut self, outcome: u8) -> Poll<Result<()>> {
        self.finished = true;
        self.shared.armed.store(false, Ordering::Release);

        match outcome {
            CANCELLED => Poll::Ready(Err(Error::Cancelled)),
            _ => Poll::Ready(Ok(())),
        }
    }
}

impl Future for TimerWait<'_> {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.duration.is_zero() {
            return Poll::Ready(Ok(()));
        }

        *this.shared.waiter.lock() = Some(cx.waker().clone());

        if !this.armed {
            this.arm();
            return Poll::Pending;
        }

        match this.shared.resumed.load(Ordering::Acquire) {
            WAITING => Poll::Pending,
            outcome => this.finish(outcome),
        }
    }
}

impl Drop for TimerWait<'_> {
    fn drop(&mut self) {
        if self.armed && !self.finished {
            if let Some(timer) = self.shared.timer.get() {
                timer.disarm();
            }

            self.shared.armed.store(false, Ordering::Release);
        }
    }
}
