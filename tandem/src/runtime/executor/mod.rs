//! Task executor implementation.
//!
//! - [`core`]: worker thread lifecycle and shutdown,
//! - [`worker`]: the per-thread loop that runs tasks using work-stealing.

pub(crate) mod core;
pub(crate) mod worker;
