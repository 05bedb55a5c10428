//! Asynchronous task primitives.
//!
//! This module defines how the runtime represents, schedules and observes
//! spawned work.
//!
//! It includes:
//! - the scheduling state machine and the non-generic [`Task`] container,
//! - the raw waker that re-queues a task on wake-up,
//! - panic capture, so a panicking awaitable still reports an outcome,
//! - [`SharedFuture`], the multi-consumer bridge to an awaitable's outcome.
//!
//! Most users interact with this module through [`spawn`] and
//! [`start_async`].

pub(crate) mod handle;
pub(crate) mod state;
pub(crate) mod unwind;
pub(crate) mod waker;

mod core;

pub(crate) use self::core::{Task, detach, spawn_on, start_async_on};
pub use self::core::{spawn, start_async};
pub use handle::SharedFuture;
