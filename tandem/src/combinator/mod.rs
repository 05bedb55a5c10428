//! Composition of independently running awaitables.
//!
//! Both combinators fan out by spawning every awaitable as its own task
//! and fan in through shared state that wakes the single consumer exactly
//! once:
//! - [`when_all`] / [`FanIn`] wait for every awaitable and collect the
//!   values positionally, failing with the first failure,
//! - [`when_any`] / [`Race`] resolve with whichever awaitable finishes
//!   first, together with its position.
//!
//! The `when_all!` and `when_any!` macros build the same machinery for a
//! fixed list of expressions.

mod all;
mod any;

pub use all::{Completed, FanIn, Producer, Slot, WhenAll, when_all};
pub use any::{Race, Racer, WhenAny, when_any};

use crate::error::Result;

use std::future::Future;
use std::pin::Pin;

/// A type-erased awaitable yielding `T`.
pub type BoxAwaitable<T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'static>>;

/// Erases the type of `awaitable`.
///
/// Mostly useful to put differently-typed futures with the same output
/// into one collection for [`when_any`] or [`when_all`].
pub fn boxed<F, T>(awaitable: F) -> BoxAwaitable<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
{
    Box::pin(awaitable)
}
