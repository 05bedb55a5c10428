use super::BoxAwaitable;
use crate::error::{Error, Result};
use crate::runtime::task;
use crate::sync::CompletionCell;

use tracing::trace;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};

struct RaceShared<T> {
    count: usize,

    /// Resumption token, taken by the first racer to finish.
    claimed: AtomicBool,

    /// Racers not dropped yet.
    live: AtomicUsize,

    outcome: CompletionCell<(T, usize)>,
}

impl<T> RaceShared<T> {
    /// Takes the resumption token. Only one caller ever gets `true`.
    fn claim(&self) -> bool {
        // Losers usually see the token gone without contending for it.
        !self.claimed.load(Ordering::Acquire) && !self.claimed.swap(true, Ordering::AcqRel)
    }
}

/// Resolves with the first of a fixed number of racers to finish.
///
/// `Race` is the low-level engine behind [`when_any`] and the `when_any!`
/// macro. Every racer produces the same type `T`; the race resolves with
/// the winner's value and position, or with the winner's failure. Later
/// finishers are ignored and their values dropped.
pub struct Race<T> {
    shared: Arc<RaceShared<T>>,

    /// Number of racers issued so far.
    issued: usize,
}

/// One contestant of a [`Race`].
///
/// If every racer is dropped without finishing, the race resolves with
/// [`Error::Cancelled`].
pub struct Racer<T> {
    shared: Arc<RaceShared<T>>,
    index: usize,
}

impl<T> Race<T> {
    /// Creates a race between `count` racers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Construction`] if `count` is zero.
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::Construction("a race needs at least one racer"));
        }

        Ok(Self::sized(count))
    }

    fn sized(count: usize) -> Self {
        Self {
            shared: Arc::new(RaceShared {
                count,
                claimed: AtomicBool::new(false),
                live: AtomicUsize::new(count),
                outcome: CompletionCell::new(),
            }),
            issued: 0,
        }
    }

    /// Issues the racer of the next position.
    ///
    /// # Panics
    ///
    /// Panics if every position has already been issued.
    pub fn racer(&mut self) -> Racer<T> {
        assert!(
            self.issued < self.shared.count,
            "race sized for {} racers, cannot issue another",
            self.shared.count
        );

        let index = self.issued;
        self.issued += 1;

        Racer {
            shared: self.shared.clone(),
            index,
        }
    }

    /// Spawns `awaitable` on the current runtime as the next racer.
    ///
    /// # Panics
    ///
    /// Panics if every position has already been issued, or if called
    /// outside the context of a runtime.
    pub fn attach<F>(&mut self, awaitable: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let racer = self.racer();
        task::detach(awaitable, move |outcome| {
            racer.finish(outcome);
        });
    }
}

impl<T> Future for Race<T> {
    type Output = Result<(T, usize)>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.issued < this.shared.count {
            return Poll::Ready(Err(Error::Construction(
                "race awaited before every racer was issued",
            )));
        }

        this.shared.outcome.poll_take(cx)
    }
}

impl<T> Drop for Race<T> {
    fn drop(&mut self) {
        self.shared.outcome.forget_waiter();
    }
}

impl<T> Racer<T> {
    /// Position of this racer.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Reports this racer's outcome.
    ///
    /// Returns `true` if this racer won. A losing outcome is dropped.
    pub fn finish(self, outcome: Result<T>) -> bool {
        if !self.shared.claim() {
            trace!(index = self.index, "race already decided, outcome dropped");
            return false;
        }

        trace!(index = self.index, ok = outcome.is_ok(), "race won");

        let index = self.index;
        self.shared.outcome.complete(outcome.map(|value| (value, index)));

        true
    }
}

impl<T> Drop for Racer<T> {
    fn drop(&mut self) {
        let last = self.shared.live.fetch_sub(1, Ordering::AcqRel) == 1;

        if last && self.shared.claim() {
            trace!("every racer dropped without finishing");
            self.shared.outcome.complete(Err(Error::Cancelled));
        }
    }
}

/// Resolves with whichever awaitable finishes first.
///
/// The output is the winner's value together with its position in
/// `awaitables`, or the winner's failure. The awaitables are spawned when
/// the returned future is first polled. Losers keep running in the
/// background; their outcomes are discarded.
///
/// All awaitables must produce the same type. Differently-typed futures
/// can be combined after [`boxed`](super::boxed).
///
/// # Errors
///
/// Returns [`Error::Construction`] right away, before anything is spawned,
/// if `awaitables` is empty.
pub fn when_any<I, F, T>(awaitables: I) -> Result<WhenAny<T>>
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
        return Err(Error::Construction("when_any requires at least one awaitable"));
    }

    Ok(WhenAny::sized(pending))
}

/// Future returned by [`when_any`].
pub struct WhenAny<T> {
    /// Awaitables not spawned yet.
    pending: Vec<BoxAwaitable<T>>,

    race: Race<T>,
}

impl<T> WhenAny<T> {
    /// Builds a race over a non-empty list of awaitables.
    pub(crate) fn sized(pending: Vec<BoxAwaitable<T>>) -> Self {
        debug_assert!(!pending.is_empty());

        Self {
            race: Race::sized(pending.len()),
            pending,
        }
    }
}

impl<T: Send + 'static> Future for WhenAny<T> {
    type Output = Result<(T, usize)>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        for awaitable in this.pending.drain(..) {
            this.race.attach(awaitable);
        }

        Pin::new(&mut this.race).poll(cx)
    }
}
