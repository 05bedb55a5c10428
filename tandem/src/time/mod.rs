//! Timers.
//!
//! This module provides time-related asynchronous utilities that
//! integrate with the runtime reactor:
//! - [`sleep`] for suspending a task,
//! - [`execute_with_timeout`] for bounding a spawned awaitable,
//! - [`timeout`] for bounding a future in place,
//! - [`CancellableTimer`] for a wait another thread can cut short.

mod sleep;
mod timeout;
mod timer;

#[doc(inline)]
pub use sleep::{Sleep, sleep};

#[doc(inline)]
pub use timeout::{Timeout, WithTimeout, execute_with_timeout, timeout};

#[doc(inline)]
pub use timer::{CancellableTimer, TimerCanceller, TimerWait};
