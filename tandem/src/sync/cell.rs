use crate::error::Result;

use parking_lot::Mutex;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// Lifecycle of the value held by a [`CompletionCell`].
enum State<T> {
    /// No producer has completed the cell yet.
    Pending,

    /// The outcome is stored and waiting to be taken.
    Ready(Result<T>),

    /// The outcome has been handed to the consumer.
    Consumed,
}

struct Inner<T> {
    state: State<T>,

    /// The single registered consumer, if any.
    waiter: Option<Waker>,
}

/// A one-shot, thread-safe slot bridging one producer to one consumer.
///
/// A cell starts out pending. The first call to [`complete`](Self::complete)
/// stores an outcome and wakes the registered waiter; every later call is
/// rejected. The consumer observes the outcome exactly once through
/// [`poll_take`](Self::poll_take) or [`wait`](Self::wait).
///
/// Registration and completion are serialized by one lock, so a waiter
/// can never be registered "just after" the producer looked for it and
/// miss its wake-up.
///
/// # Examples
///
/// ```rust,ignore
/// let cell = Arc::new(CompletionCell::new());
///
/// let producer = cell.clone();
/// std::thread::spawn(move || producer.complete(Ok(7)));
///
/// assert_eq!(cell.wait().await.unwrap(), 7);
/// ```
pub struct CompletionCell<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> CompletionCell<T> {
    /// Creates an empty, pending cell.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Pending,
                waiter: None,
            }),
        }
    }

    /// Returns `true` once an outcome has been stored (or already taken).
    pub fn is_ready(&self) -> bool {
        !matches!(self.inner.lock().state, State::Pending)
    }

    /// Stores `outcome` and wakes the waiter.
    ///
    /// Returns `false`, dropping `outcome`, if the cell was already
    /// completed. The waker is invoked after the lock is released.
    pub fn complete(&self, outcome: Result<T>) -> bool {
        let waiter = {
            let mut inner = self.inner.lock();

            if !matches!(inner.state, State::Pending) {
                return false;
            }

            inner.state = State::Ready(outcome);
            inner.waiter.take()
        };

        if let Some(waker) = waiter {
            waker.wake();
        }

        true
    }

    /// Takes the outcome if it is available, otherwise registers the
    /// waker from `cx`, replacing any previously registered one.
    ///
    /// # Panics
    ///
    /// Panics if the outcome was already taken.
    pub fn poll_take(&self, cx: &mut Context<'_>) -> Poll<Result<T>> {
        let mut inner = self.inner.lock();

        match std::mem::replace(&mut inner.state, State::Consumed) {
            State::Ready(outcome) => Poll::Ready(outcome),
            State::Pending => {
                inner.state = State::Pending;

                let stale = match &inner.waiter {
                    Some(waker) => !waker.will_wake(cx.waker()),
                    None => true,
                };

                if stale {
                    inner.waiter = Some(cx.waker().clone());
                }

                Poll::Pending
            }
            State::Consumed => panic!("CompletionCell outcome already taken"),
        }
    }

    /// Drops the registered waiter without completing the cell.
    ///
    /// Used when the consumer abandons interest: the producer's later
    /// completion then finds nobody to wake.
    pub fn forget_waiter(&self) {
        self.inner.lock().waiter = None;
    }

    /// Returns a future resolving to the cell's outcome.
    pub fn wait(&self) -> Wait<'_, T> {
        Wait { cell: self }
    }
}

impl<T> Default for CompletionCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`CompletionCell::wait`].
pub struct Wait<'a, T> {
    cell: &'a CompletionCell<T>,
}

impl<T> Future for Wait<'_, T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.cell.poll_take(cx)
    }
}
