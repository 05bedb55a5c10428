use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future returned by [`yield_now`].
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.yielded {
            return Poll::Ready(());
        }

        // Rescheduled through the injector, behind whatever is already queued.
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Lets other tasks run before the current one continues.
///
/// Useful inside long loops that never await anything else, such as a
/// producer reporting many fan-in positions in a row.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}
