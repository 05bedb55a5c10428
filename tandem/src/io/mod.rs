//! Timed I/O over completion-based sources.
//!
//! A [`CompletionSource`] starts operations that later complete from some
//! other thread, identified by a [`RequestId`]. [`TimedIo`] wraps a source
//! and turns each operation into an awaitable with its own deadline:
//! - natural completion resolves with an [`IoOutcome`],
//! - the deadline passing aborts the operation and resolves with
//!   [`Error::Timeout`](crate::Error::Timeout),
//! - an abort requested by someone else resolves with
//!   [`Error::Cancelled`](crate::Error::Cancelled).
//!
//! [`FdReader`] is a reactor-backed source reading from a non-blocking
//! descriptor; [`pipe`] creates one connected to a writable end.

mod fd;
mod source;
mod timed;

pub use fd::{FdReader, pipe};
pub use source::{Completer, CompletionSource, IoOutcome, IoStatus, RequestId};
pub use timed::{IoRequest, TimedIo};
