use super::BoxAwaitable;
use crate::error::{Error, Result};
use crate::runtime::task;
use crate::sync::CompletionCell;

use tracing::{trace, warn};

use std::cell::UnsafeCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll, ready};

struct FanInShared {
    count: usize,

    /// Producers that have not reported yet.
    remaining: AtomicUsize,

    /// First reported failure; later ones are dropped.
    failure: OnceLock<Error>,

    /// Completed by the producer that brings `remaining` to zero.
    done: CompletionCell<()>,
}

impl FanInShared {
    fn notify(&self, index: usize) {
        let before = self.remaining.fetch_sub(1, Ordering::AcqRel);
        trace!(index, remaining = before - 1, "fan-in notified");

        if before == 1 {
            self.done.complete(Ok(()));
        }
    }

    fn record_failure(&self, index: usize, error: Error) {
        if let Err(error) = self.failure.set(error) {
            trace!(index, %error, "later failure swallowed");
        }
    }
}

/// Storage for one positional value.
struct SlotCell<T> {
    value: UnsafeCell<Option<T>>,
}

// Safety: the value is written once by the owning `Producer` before it
// decrements the fan-in counter, and read once through `Slot::take`, which
// requires the `Completed` token only handed out after the counter hit zero.
// The counter's acquire/release ordering publishes the write.
unsafe impl<T: Send> Sync for SlotCell<T> {}

/// Waits for a fixed number of producers, each of which reports exactly
/// once.
///
/// `FanIn` is the low-level engine behind [`when_all`] and the `when_all!`
/// macro. A fan-in is sized at construction; producers are then issued in
/// positional order, and awaiting the fan-in yields a [`Completed`] token
/// once every producer has reported, or the first failure.
///
/// # Examples
///
/// ```rust,ignore
/// let mut fan_in = FanIn::new(2)?;
/// let name = fan_in.attach(async { Ok("ferris") });
/// let age = fan_in.attach(async { Ok(8) });
///
/// let done = fan_in.await?;
/// assert_eq!((name.take(&done), age.take(&done)), ("ferris", 8));
/// ```
pub struct FanIn {
    shared: Arc<FanInShared>,

    /// Number of producers issued so far.
    issued: usize,
}

/// Proof that a [`FanIn`] completed without failure.
///
/// Required by [`Slot::take`].
pub struct Completed {
    shared: Arc<FanInShared>,
}

/// The reporting side of one position of a [`FanIn`].
///
/// Every way of finishing consumes the producer, so a position reports at
/// most once. A producer dropped without reporting counts as a failure
/// with [`Error::Cancelled`], so the consumer is never left waiting.
pub struct Producer<T> {
    shared: Arc<FanInShared>,
    cell: Arc<SlotCell<T>>,
    index: usize,
    reported: bool,
}

/// The consuming side of one position of a [`FanIn`].
pub struct Slot<T> {
    owner: Arc<FanInShared>,
    cell: Arc<SlotCell<T>>,
}

impl FanIn {
    /// Creates a fan-in waiting for `count` producers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] if `count` is zero.
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::Construction("a fan-in needs at least one producer"));
        }

        Ok(Self {
            shared: Arc::new(FanInShared {
                count,
                remaining: AtomicUsize::new(count),
                failure: OnceLock::new(),
                done: CompletionCell::new(),
            }),
            issued: 0,
        })
    }

    /// Issues the producer and slot of the next position.
    ///
    /// # Panics
    ///
    /// Panics if every position has already been issued.
    pub fn producer<T>(&mut self) -> (Producer<T>, Slot<T>) {
        assert!(
            self.issued < self.shared.count,
            "fan-in sized for {} producers, cannot issue another",
            self.shared.count
        );

        let index = self.issued;
        self.issued += 1;

        let cell = Arc::new(SlotCell {
            value: UnsafeCell::new(None),
        });

        let producer = Producer {
            shared: self.shared.clone(),
            cell: cell.clone(),
            index,
            reported: false,
        };

        let slot = Slot {
            owner: self.shared.clone(),
            cell,
        };

        (producer, slot)
    }

    /// Spawns `awaitable` on the current runtime as the next position.
    ///
    /// # Panics
    ///
    /// Panics if every position has already been issued, or if called
    /// outside the context of a runtime.
    pub fn attach<F, T>(&mut self, awaitable: F) -> Slot<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (producer, slot) = self.producer();
        task::detach(awaitable, move |outcome| producer.complete(outcome));
        slot
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.shared.count
    }

    /// Always `false`: a fan-in has at least one position.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Future for FanIn {
    type Output = Result<Completed>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.issued < this.shared.count {
            return Poll::Ready(Err(Error::Construction(
                "fan-in awaited before every producer was issued",
            )));
        }

        ready!(this.shared.done.poll_take(cx))?;

        match this.shared.failure.get() {
            Some(error) => Poll::Ready(Err(error.clone())),
            None => Poll::Ready(Ok(Completed {
                shared: this.shared.clone(),
            })),
        }
    }
}

impl Drop for FanIn {
    fn drop(&mut self) {
        self.shared.done.forget_waiter();
    }
}

impl<T> Producer<T> {
    /// Position of this producer.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Reports a value for this position.
    pub fn succeed(mut self, value: T) {
        // Safety: see `SlotCell`. This producer is the only writer.
        unsafe { *self.cell.value.get() = Some(value) };
        self.report();
    }

    /// Reports a failure for this position.
    pub fn fail(mut self, error: Error) {
        self.shared.record_failure(self.index, error);
        self.report();
    }

    /// Reports `outcome` for this position.
    pub fn complete(self, outcome: Result<T>) {
        match outcome {
            Ok(value) => self.succeed(value),
            Err(error) => self.fail(error),
        }
    }

    fn report(&mut self) {
        self.reported = true;
        self.shared.notify(self.index);
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        if !self.reported {
            warn!(index = self.index, "fan-in producer dropped without reporting");
            self.shared.record_failure(self.index, Error::Cancelled);
            self.report();
        }
    }
}

impl<T> Slot<T> {
    /// Moves the value out of the slot.
    ///
    /// # Panics
    ///
    /// Panics if `done` belongs to a different fan-in.
    pub fn take(self, done: &Completed) -> T {
        assert!(
            Arc::ptr_eq(&self.owner, &done.shared),
            "slot taken with the completion token of another fan-in"
        );

        // Safety: `done` proves every producer of this fan-in reported and
        // none failed, so the value was written and no writer remains.
        let value = unsafe { (*self.cell.value.get()).take() };

        value.expect("successful fan-in left a slot empty")
    }
}

/// Waits for every awaitable and collects their values in input order.
///
/// The awaitables are spawned when the returned future is first polled.
/// If any of them fails, the first failure to be reported is returned and
/// every value is discarded; the other awaitables are not cancelled.
///
/// # Errors
///
/// Returns [`Error::Construction`] right away, before anything is spawned,
/// if `awaitables` is empty.
///
/// # Examples
///
/// ```rust,ignore
/// let values = when_all(vec![boxed(fetch(1)), boxed(fetch(2))])?.await?;
/// ```
pub fn when_all<I, F, T>(awaitables: I) -> Result<WhenAll<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let pending: Vec<BoxAwaitable<T>> = awaitables
        .into_iter()
        .map(|awaitable| Box::pin(awaitable) as BoxAwaitable<T>)
        .collect();

    if pending.is_empty() {
        return Err(Error::Construction("when_all requires at least one awaitable"));
    }

    let fan_in = FanIn::new(pending.len())?;

    Ok(WhenAll {
        slots: Vec::with_capacity(pending.len()),
        pending,
        fan_in,
    })
}

/// Future returned by [`when_all`].
pub struct WhenAll<T> {
    /// Awaitables not spawned yet.
    pending: Vec<BoxAwaitable<T>>,

    fan_in: FanIn,
    slots: Vec<Slot<T>>,
}

impl<T: Send + 'static> Future for WhenAll<T> {
    type Output = Result<Vec<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        for awaitable in this.pending.drain(..) {
            this.slots.push(this.fan_in.attach(awaitable));
        }

        let done = ready!(Pin::new(&mut this.fan_in).poll(cx))?;

        Poll::Ready(Ok(this.slots.drain(..).map(|slot| slot.take(&done)).collect()))
    }
}
