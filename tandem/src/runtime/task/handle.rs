use crate::error::{Error, Result};
use crate::utils::Slab;

use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

struct Inner<T> {
    /// Outcome of the bridged awaitable.
    ///
    /// Stays `None` after resolution only if every handle was gone by then.
    outcome: Option<Result<T>>,

    /// Set once the producer has delivered (or discarded) the outcome.
    resolved: bool,

    /// Task wakers of handles currently awaiting resolution.
    waiters: Slab<Waker>,

    /// Number of live [`SharedFuture`] handles.
    handles: usize,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,

    /// Signalled on resolution, for threads blocked in `wait`.
    resolved: Condvar,
}

/// A cloneable, multi-consumer handle to the outcome of an awaitable
/// running on the runtime.
///
/// Every clone observes the same outcome. A handle can be:
/// - blocked on from any thread with [`wait`](Self::wait) or
///   [`wait_timeout`](Self::wait_timeout),
/// - read with [`get`](Self::get),
/// - awaited from another task, yielding a clone of the outcome.
///
/// The bridge's shared state lives as long as either side holds it. When
/// the last handle is dropped before the awaitable finishes, the outcome
/// is discarded on arrival instead of being stored.
pub struct SharedFuture<T> {
    shared: Arc<Shared<T>>,

    /// This handle's entry in the waiter registry, if registered.
    key: Option<usize>,
}

/// Producing side of a [`SharedFuture`].
///
/// Dropping a resolver that never resolved completes the handles with
/// [`Error::Cancelled`], which happens when the runtime shuts down with the
/// producing task still pending.
pub(crate) struct Resolver<T> {
    shared: Arc<Shared<T>>,
    resolved: bool,
}

impl<T> Resolver<T> {
    /// Creates a connected resolver/handle pair.
    pub(crate) fn new() -> (Self, SharedFuture<T>) {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                outcome: None,
                resolved: false,
                waiters: Slab::new(),
                handles: 1,
            }),
            resolved: Condvar::new(),
        });

        let resolver = Self {
            shared: shared.clone(),
            resolved: false,
        };

        (resolver, SharedFuture { shared, key: None })
    }

    /// Publishes `outcome` to every handle.
    pub(crate) fn resolve(mut self, outcome: Result<T>) {
        self.publish(outcome);
    }

    fn publish(&mut self, outcome: Result<T>) {
        self.resolved = true;

        let (waiters, discarded) = {
            let mut inner = self.shared.inner.lock();
            inner.resolved = true;

            if inner.handles == 0 {
                (Vec::new(), Some(outcome))
            } else {
                inner.outcome = Some(outcome);
                (inner.waiters.drain().collect::<Vec<_>>(), None)
            }
        };

        self.shared.resolved.notify_all();

        if discarded.is_some() {
            trace!("outcome discarded, no handle left");
        }
        drop(discarded);

        for waker in waiters {
            waker.wake();
        }
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        if !self.resolved {
            warn!("producer dropped before resolving, cancelling shared future");
            self.publish(Err(Error::Cancelled));
        }
    }
}

impl<T> SharedFuture<T> {
    /// Returns `true` once the outcome is available.
    pub fn is_ready(&self) -> bool {
        self.shared.inner.lock().resolved
    }

    /// Blocks the calling thread until the outcome is available.
    ///
    /// Must not be called from a runtime worker while the producing task
    /// can only make progress on that same worker.
    pub fn wait(&self) {
        let mut inner = self.shared.inner.lock();

        while !inner.resolved {
            self.shared.resolved.wait(&mut inner);
        }
    }

    /// Blocks until the outcome is available or `timeout` elapses.
    ///
    /// Returns `true` if the outcome is available.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };

        let mut inner = self.shared.inner.lock();

        while !inner.resolved {
            if self
                .shared
                .resolved
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return inner.resolved;
            }
        }

        true
    }

    /// Number of live handles sharing this outcome.
    pub fn handle_count(&self) -> usize {
        self.shared.inner.lock().handles
    }

    /// Blocks until resolution and moves the outcome out.
    ///
    /// Later readers of the same state observe [`Error::Cancelled`].
    pub(crate) fn into_outcome(self) -> Result<T> {
        self.wait();

        self.shared
            .inner
            .lock()
            .outcome
            .take()
            .unwrap_or(Err(Error::Cancelled))
    }
}

impl<T: Clone> SharedFuture<T> {
    /// Blocks until the outcome is available and returns a copy of it.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let handle = runtime.start_async(async { Ok(5) });
    /// assert_eq!(handle.get().unwrap(), 5);
    /// ```
    pub fn get(&self) -> Result<T> {
        self.wait();

        match &self.shared.inner.lock().outcome {
            Some(outcome) => outcome.clone(),
            None => Err(Error::Cancelled),
        }
    }
}

impl<T> Clone for SharedFuture<T> {
    fn clone(&self) -> Self {
        self.shared.inner.lock().handles += 1;

        Self {
            shared: self.shared.clone(),
            key: None,
        }
    }
}

impl<T> Drop for SharedFuture<T> {
    fn drop(&mut self) {
        let released = {
            let mut inner = self.shared.inner.lock();

            let waker = self.key.take().and_then(|key| inner.waiters.remove(key));

            inner.handles -= 1;

            // A resolved outcome nobody can read anymore goes away now
            // rather than with the last reference to the shared state.
            let outcome = if inner.handles == 0 {
                inner.outcome.take()
            } else {
                None
            };

            (waker, outcome)
        };

        drop(released);
    }
}

impl<T: Clone> Future for SharedFuture<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut inner = this.shared.inner.lock();

        if inner.resolved {
            if let Some(key) = this.key.take() {
                inner.waiters.remove(key);
            }

            return Poll::Ready(match &inner.outcome {
                Some(outcome) => outcome.clone(),
                None => Err(Error::Cancelled),
            });
        }

        if let Some(key) = this.key {
            if let Some(waker) = inner.waiters.get_mut(key) {
                if !waker.will_wake(cx.waker()) {
                    *waker = cx.waker().clone();
                }

                return Poll::Pending;
            }
        }

        this.key = Some(inner.waiters.insert(cx.waker().clone()));
        Poll::Pending
    }
}
