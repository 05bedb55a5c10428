use super::source::{Completer, CompletionSource, IoOutcome, IoStatus, RequestId};
use crate::error::{Error, Result};
use crate::reactor::timer::TimerHandle;
use crate::sync::CompletionCell;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

struct Progress {
    /// `CompletionSource::start` has not returned yet.
    starting: bool,

    /// The completer was dropped unused while starting.
    orphaned: bool,

    /// The source reported the end of the operation.
    completed: bool,

    /// The deadline passed while the operation was in flight.
    timed_out: bool,
}

/// Shared state of one in-flight operation.
pub(crate) struct RequestState<O> {
    id: RequestId,

    /// Decides which of completion and expiry happened first.
    progress: Mutex<Progress>,

    /// Private deadline timer.
    timer: TimerHandle,

    outcome: CompletionCell<IoOutcome<O>>,
}

impl<O> RequestState<O> {
    fn new(id: RequestId, timer: TimerHandle) -> Self {
        Self {
            id,
            progress: Mutex::new(Progress {
                starting: true,
                orphaned: false,
                completed: false,
                timed_out: false,
            }),
            timer,
            outcome: CompletionCell::new(),
        }
    }

    /// Records the source's report and resumes the waiter.
    ///
    /// Only the first report counts. The deadline timer is disarmed, and a
    /// deadline callback already running is waited for, before the outcome
    /// is published.
    pub(crate) fn finish(&self, status: IoStatus, bytes: usize, output: Option<O>) {
        let timed_out = {
            let mut progress = self.progress.lock();

            if progress.completed {
                trace!(request = %self.id, ?status, "late completion ignored");
                return;
            }

            progress.completed = true;
            progress.timed_out
        };

        self.timer.disarm();
        self.timer.drain();

        let outcome = match (status, output) {
            (IoStatus::Success | IoStatus::EndOfStream, Some(output)) => Ok(IoOutcome {
                output,
                bytes,
                end_of_stream: status == IoStatus::EndOfStream,
            }),
            (IoStatus::Success | IoStatus::EndOfStream, None) => Err(Error::Cancelled),
            (IoStatus::Aborted, _) if timed_out => Err(Error::Timeout),
            (IoStatus::Aborted, _) => Err(Error::Cancelled),
            (IoStatus::Failed(code), _) => Err(io::Error::from_raw_os_error(code).into()),
        };

        trace!(request = %self.id, ?status, bytes, timed_out, "operation completed");

        self.outcome.complete(outcome);
    }

    /// Called when a completer is dropped without reporting anything.
    ///
    /// While the source is still starting, the verdict waits for
    /// [`started`](Self::started): a failed start is reported through its
    /// error, not as an abort.
    pub(crate) fn orphan(&self) {
        {
            let mut progress = self.progress.lock();

            if progress.completed {
                return;
            }

            if progress.starting {
                progress.orphaned = true;
                return;
            }
        }

        warn!(request = %self.id, "completer dropped without completing, reporting abort");
        self.finish(IoStatus::Aborted, 0, None);
    }

    /// Records that `start` returned. `ok` is whether it succeeded.
    fn started(&self, ok: bool) {
        let orphaned = {
            let mut progress = self.progress.lock();
            progress.starting = false;

            if !ok {
                progress.completed = true;
            }

            ok && progress.orphaned
        };

        if orphaned {
            warn!(request = %self.id, "completer dropped without completing, reporting abort");
            self.finish(IoStatus::Aborted, 0, None);
        }
    }

    /// Arms the deadline, unless the operation already completed.
    fn arm_deadline<S>(self: &Arc<Self>, source: &Arc<S>, timeout: Duration)
    where
        S: CompletionSource<Output = O>,
        O: Send + 'static,
    {
        let progress = self.progress.lock();

        if progress.completed {
            return;
        }

        let state = Arc::downgrade(self);
        let source = source.clone();

        self.timer.arm(timeout, move || {
            if let Some(state) = state.upgrade() {
                state.expire(&*source);
            }
        });
    }

    /// Deadline callback: marks the request timed out and asks the source
    /// to abort it.
    fn expire<S: CompletionSource>(&self, source: &S) {
        {
            let mut progress = self.progress.lock();

            if progress.completed {
                return;
            }

            progress.timed_out = true;
        }

        debug!(request = %self.id, "deadline passed, aborting operation");
        source.cancel(self.id);
    }

    /// Gives up on the operation. Returns `true` if it was still in flight.
    fn abandon(&self) -> bool {
        let progress = self.progress.lock();

        if progress.completed {
            return false;
        }

        self.timer.disarm();
        true
    }
}

/// Wraps a [`CompletionSource`] so that every operation carries its own
/// deadline.
///
/// # Examples
///
/// ```rust,ignore
/// let (reader, writer) = tandem::io::pipe()?;
/// let io = TimedIo::new(reader);
///
/// match io.submit(4096, Duration::from_millis(50)).await {
///     Ok(outcome) => println!("read {} bytes", outcome.bytes),
///     Err(err) if err.is_timeout() => println!("nothing to read"),
///     Err(err) => return Err(err),
/// }
/// ```
pub struct TimedIo<S> {
    source: Arc<S>,
    next_id: AtomicU64,
}

impl<S: CompletionSource> TimedIo<S> {
    pub fn new(source: S) -> Self {
        Self::from_arc(Arc::new(source))
    }

    /// Wraps a source that is shared with other code.
    pub fn from_arc(source: Arc<S>) -> Self {
        Self {
            source,
            next_id: AtomicU64::new(0),
        }
    }

    /// The wrapped source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Prepares `operation` with a deadline of `timeout`.
    ///
    /// Nothing happens until the returned request is first polled: the
    /// operation is then started and, unless it failed to start or already
    /// completed, the deadline is armed.
    ///
    /// The request resolves with:
    /// - the [`IoOutcome`] on success or end of stream,
    /// - the error returned by [`CompletionSource::start`],
    /// - [`Error::Timeout`] if the deadline aborted the operation,
    /// - [`Error::Cancelled`] if it was aborted for any other reason,
    /// - [`Error::Operation`] wrapping the OS error of a failed operation.
    pub fn submit(&self, operation: S::Operation, timeout: Duration) -> IoRequest<S> {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));

        IoRequest {
            source: self.source.clone(),
            id,
            operation: Some(operation),
            timeout,
            state: None,
        }
    }
}

/// Future returned by [`TimedIo::submit`].
///
/// Dropping an unfinished request disarms its deadline and asks the
/// source to abort the operation.
pub struct IoRequest<S: CompletionSource> {
    source: Arc<S>,
    id: RequestId,

    /// Taken when the operation starts.
    operation: Option<S::Operation>,

    timeout: Duration,

    /// Present while the operation is in flight.
    state: Option<Arc<RequestState<S::Output>>>,
}

// The operation is moved out before use and never pinned.
impl<S: CompletionSource> Unpin for IoRequest<S> {}

impl<S: CompletionSource> IoRequest<S> {
    /// Id of this request.
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl<S: CompletionSource> Future for IoRequest<S> {
    type Output = Result<IoOutcome<S::Output>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(operation) = this.operation.take() {
            let state = Arc::new(RequestState::new(this.id, TimerHandle::current()));
            let completer = Completer::new(this.id, state.clone());

            trace!(request = %this.id, timeout = ?this.timeout, "starting operation");

            let started = this.source.start(this.id, operation, completer);
            state.started(started.is_ok());

            if let Err(err) = started {
                debug!(request = %this.id, error = %err, "operation failed to start");
                return Poll::Ready(Err(err.into()));
            }

            state.arm_deadline(&this.source, this.timeout);
            this.state = Some(state);
        }

        let Some(state) = this.state.as_ref() else {
            panic!("IoRequest polled after completion");
        };

        let outcome = std::task::ready!(state.outcome.poll_take(cx));
        this.state = None;

        Poll::Ready(outcome)
    }
}

impl<S: CompletionSource> Drop for IoRequest<S> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            if state.abandon() {
                debug!(request = %self.id, "request dropped in flight, aborting operation");
                self.source.cancel(self.id);
            }
        }
    }
}
