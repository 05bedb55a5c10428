//! Core runtime components.
//!
//! This module contains the work-stealing executor that drives every
//! awaitable spawned by the combinators, together with the task type,
//! the per-thread context and cooperative yielding.
//!
//! Most users only touch [`Runtime`], [`RuntimeBuilder`](builder::RuntimeBuilder)
//! and [`task::spawn`]; the combinators spawn their children through the
//! same path.

mod core;
mod executor;
mod work_stealing;

pub(crate) mod builder;
pub(crate) mod context;
pub(crate) mod yield_now;

pub mod task;

pub use self::core::Runtime;
