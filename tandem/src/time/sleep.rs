use crate::reactor::timer::TimerHandle;

use parking_lot::Mutex;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

/// Creates a future that completes after the given duration.
///
/// The timer is registered with the current runtime's reactor on first
/// poll. A zero duration completes on first poll without touching the
/// reactor.
///
/// # Panics
///
/// Panics if polled outside of a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// sleep(Duration::from_millis(10)).await;
/// ```
pub fn sleep(duration: Duration) -> Sleep {
    Sleep::new(duration)
}

/// State shared with the reactor callback.
struct Alarm {
    rang: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl Alarm {
    fn ring(&self) {
        self.rang.store(true, Ordering::Release);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }
}

/// Future returned by [`sleep`].
///
/// Dropping a `Sleep` before it completes disarms its timer.
pub struct Sleep {
    /// `None` when the duration does not fit in an [`Instant`].
    deadline: Option<Instant>,

    duration: Duration,

    /// Armed on first poll.
    timer: Option<TimerHandle>,

    alarm: Arc<Alarm>,
}

impl Sleep {
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now().checked_add(duration),
            duration,
            timer: None,
            alarm: Arc::new(Alarm {
                rang: AtomicBool::new(false),
                waker: Mutex::new(None),
            }),
        }
    }

    fn elapsed(&self) -> bool {
        self.alarm.rang.load(Ordering::Acquire)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.duration.is_zero() || this.elapsed() {
            return Poll::Ready(());
        }

        *this.alarm.waker.lock() = Some(cx.waker().clone());

        if this.timer.is_none() {
            let remaining = match this.deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => this.duration,
            };

            let timer = TimerHandle::current();
            let alarm = Arc::downgrade(&this.alarm);

            timer.arm(remaining, move || {
                if let Some(alarm) = alarm.upgrade() {
                    alarm.ring();
                }
            });

            this.timer = Some(timer);
        }

        // The alarm may have rung between the first check and the waker
        // being stored.
        if this.elapsed() {
            return Poll::Ready(());
        }

        Poll::Pending
    }
}
