//! Reactor core and event handling.
//!
//! The reactor runs on its own thread, independently from the executor,
//! and is responsible for:
//! - firing timer callbacks at their deadlines,
//! - watching descriptors for readiness,
//! - aborting outstanding registrations at shutdown.
//!
//! It is an internal component used by the timer primitives and the
//! timed I/O wrapper.

mod core;
mod event;

pub(crate) mod command;
pub(crate) mod io;
pub(crate) mod poller;
pub(crate) mod timer;

pub(crate) use self::core::{Reactor, ReactorHandle};
