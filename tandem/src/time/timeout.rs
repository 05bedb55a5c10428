use crate::combinator::{BoxAwaitable, WhenAny};
use crate::error::{Error, Result};
use crate::time::sleep::{Sleep, sleep};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

/// Bounds `awaitable` with a deadline.
///
/// The awaitable and a timer race each other as two independent tasks.
/// If the awaitable finishes first, its own outcome (value or failure) is
/// returned. If `duration` elapses first, the result is
/// [`Error::Cancelled`].
///
/// The timed-out awaitable is not stopped: it keeps running to completion
/// in the background and its late outcome is discarded. Use [`timeout`]
/// to drop the future instead.
///
/// # Examples
///
/// ```rust,ignore
/// let slow = async {
///     sleep(Duration::from_secs(8)).await;
///     Ok(1)
/// };
///
/// let result = execute_with_timeout(slow, Duration::from_secs(3)).await;
/// assert!(matches!(result, Err(Error::Cancelled)));
/// ```
pub fn execute_with_timeout<F, T>(awaitable: F, duration: Duration) -> WithTimeout<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let contestants: Vec<BoxAwaitable<T>> = vec![Box::pin(awaitable), Box::pin(expire(duration))];

    WithTimeout {
        race: WhenAny::sized(contestants),
    }
}

async fn expire<T>(duration: Duration) -> Result<T> {
    sleep(duration).await;
    Err(Error::Cancelled)
}

/// Future returned by [`execute_with_timeout`].
pub struct WithTimeout<T> {
    race: WhenAny<T>,
}

impl<T: Send + 'static> Future for WithTimeout<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let (value, _) = ready!(Pin::new(&mut self.race).poll(cx))?;
        Poll::Ready(Ok(value))
    }
}

/// Runs `future` in place with a deadline.
///
/// Unlike [`execute_with_timeout`] nothing is spawned: the future is
/// polled by the caller's task, may be `!Send`, and is dropped together
/// with the returned [`Timeout`] when the deadline wins.
///
/// Resolves to `Ok(output)` or, on expiry, to [`Error::Cancelled`].
pub fn timeout<F>(duration: Duration, future: F) -> Timeout<F>
where
    F: Future,
{
    Timeout {
        future,
        sleep: sleep(duration),
    }
}

/// Future returned by [`timeout`].
pub struct Timeout<F> {
    future: F,
    sleep: Sleep,
}

impl<F: Future> Future for Timeout<F> {
    type Output = Result<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Safety: `future` is structurally pinned and never moved; `sleep`
        // is `Unpin`.
        let this = unsafe { self.get_unchecked_mut() };
        let future = unsafe { Pin::new_unchecked(&mut this.future) };

        if let Poll::Ready(output) = future.poll(cx) {
            return Poll::Ready(Ok(output));
        }

        if Pin::new(&mut this.sleep).poll(cx).is_ready() {
            return Poll::Ready(Err(Error::Cancelled));
        }

        Poll::Pending
    }
}
