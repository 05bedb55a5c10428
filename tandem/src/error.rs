//! Error types shared by every combinator.
//!
//! A single [`Error`] flows through the whole crate so that a failure
//! raised deep inside one awaitable can be handed, unchanged, to whoever
//! observes the aggregate: a [`when_all`](crate::combinator::when_all)
//! waiter, a [`SharedFuture`](crate::task::SharedFuture) clone, or a timed
//! I/O caller.

use std::any::Any;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure reported by an awaitable or by the engine itself.
///
/// `Error` is cheap to clone: the original cause of an
/// [`Operation`](Error::Operation) failure is reference-counted, which lets
/// the same failure be observed by several handles.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The operation itself failed. The cause is carried verbatim.
    #[error("operation failed: {0}")]
    Operation(#[source] Arc<dyn std::error::Error + Send + Sync + 'static>),

    /// A timer or a timeout elapsed before a real result arrived, or the
    /// producer of a result went away without reporting one.
    #[error("operation cancelled")]
    Cancelled,

    /// An I/O request was aborted because its own deadline elapsed.
    ///
    /// This is a specific kind of cancellation; [`Error::is_cancelled`]
    /// returns `true` for it as well.
    #[error("operation timed out")]
    Timeout,

    /// A combinator was built from invalid arguments.
    #[error("invalid combinator arguments: {0}")]
    Construction(&'static str),

    /// The task driving an awaitable panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl Error {
    /// Wraps an arbitrary error as an [`Error::Operation`].
    pub fn operation<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Operation(Arc::new(error))
    }

    /// Returns `true` for [`Cancelled`](Error::Cancelled) and
    /// [`Timeout`](Error::Timeout).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled | Error::Timeout)
    }

    /// Returns `true` only for [`Timeout`](Error::Timeout).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Builds a [`Panicked`](Error::Panicked) error from a panic payload.
    pub(crate) fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("non-string panic payload")
        };

        Error::Panicked(message)
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::operation(error)
    }
}
