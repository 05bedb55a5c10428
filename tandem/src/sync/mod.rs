//! Completion primitives.
//!
//! This module holds the leaf building block every combinator funnels its
//! completions into:
//! - [`CompletionCell`]: a one-shot slot holding "pending", "ready with a
//!   value" or "ready with a failure", with room for exactly one waiter.
//!
//! The cell never blocks a thread. Producers complete it from whatever
//! thread they finish on; the single consumer is woken through its
//! [`Waker`](std::task::Waker).

mod cell;

pub use cell::{CompletionCell, Wait};
