use super::timed::RequestState;

use std::fmt;
use std::io;
use std::sync::Arc;

/// Identifies one operation submitted to a [`CompletionSource`].
///
/// Ids are unique per [`TimedIo`](super::TimedIo) wrapper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub(crate) u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Terminal status of an operation, as reported by its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoStatus {
    Success,

    /// The operation reached the end of the stream. Not a failure.
    EndOfStream,

    /// The operation was aborted before it finished.
    Aborted,

    /// The operation failed with the given OS error code.
    Failed(i32),
}

/// Result of a successfully completed operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IoOutcome<O> {
    pub output: O,

    /// Bytes transferred.
    pub bytes: usize,

    /// Set when the source reported [`IoStatus::EndOfStream`].
    pub end_of_stream: bool,
}

/// A handle-based source of asynchronous operations.
///
/// The source starts an operation in [`start`](Self::start) and reports
/// its end through the [`Completer`] it was given, from any thread and at
/// any later time (or before `start` returns). [`cancel`](Self::cancel)
/// asks for an in-flight operation to be aborted; the source then
/// completes it with [`IoStatus::Aborted`].
pub trait CompletionSource: Send + Sync + 'static {
    /// Description of the operation to perform.
    type Operation: Send + 'static;

    /// What a successful operation produces.
    type Output: Send + 'static;

    /// Starts `operation`.
    ///
    /// # Errors
    ///
    /// An error means the operation failed synchronously and will never
    /// complete; `completer` must be dropped without being used.
    fn start(
        &self,
        id: RequestId,
        operation: Self::Operation,
        completer: Completer<Self::Output>,
    ) -> io::Result<()>;

    /// Requests the abortion of the operation `id`.
    ///
    /// Unknown or already completed ids are ignored.
    fn cancel(&self, id: RequestId);
}

/// Reports the end of one operation.
///
/// Consumed by [`complete`](Self::complete). A completer dropped without
/// being completed reports [`IoStatus::Aborted`], unless it was dropped by
/// a [`start`](CompletionSource::start) that returned an error.
pub struct Completer<O> {
    id: RequestId,
    state: Option<Arc<RequestState<O>>>,
}

impl<O> Completer<O> {
    pub(crate) fn new(id: RequestId, state: Arc<RequestState<O>>) -> Self {
        Self {
            id,
            state: Some(state),
        }
    }

    /// The id of the operation this completer belongs to.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Reports the operation's status, transferred byte count and output.
    ///
    /// For [`IoStatus::Aborted`] and [`IoStatus::Failed`] the output is
    /// dropped.
    pub fn complete(mut self, status: IoStatus, bytes: usize, output: O) {
        if let Some(state) = self.state.take() {
            state.finish(status, bytes, Some(output));
        }
    }
}

impl<O> Drop for Completer<O> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.orphan();
        }
    }
}

impl<O> fmt::Debug for Completer<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer").field("id", &self.id()).finish()
    }
}
