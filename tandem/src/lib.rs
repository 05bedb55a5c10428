//! # Tandem
//!
//! **Tandem** is a small engine for composing asynchronous tasks by their
//! completions. Every awaitable runs as its own task on a work-stealing
//! runtime; combinators wait on the results through one-shot completion
//! cells that wake their consumer exactly once.
//!
//! It provides:
//!
//! - **`when_all` / `when_any`** to wait for every awaitable or for the first one
//! - A **multi-consumer bridge** ([`task::SharedFuture`]) from awaitables to blocking callers
//! - **Timeouts**, both as a race against a timer and in place on any future
//! - A **cancellable timer** whose wait can be cut short from another thread
//! - **Timed I/O**, giving each operation of a completion-based source its own deadline
//! - **Ergonomic macros** like `#[tandem::main]`, `#[tandem::test]`, `when_all!` and `when_any!`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tandem::time::sleep;
//!
//! async fn after(ms: u64, label: &'static str) -> tandem::Result<&'static str> {
//!     sleep(Duration::from_millis(ms)).await;
//!     Ok(label)
//! }
//!
//! #[tandem::main]
//! async fn main() -> tandem::Result<()> {
//!     let (fast, slow) = tandem::when_all!(after(10, "fast"), after(30, "slow")).await?;
//!     println!("{fast} then {slow}");
//!
//!     let (winner, index) = tandem::when_any!(after(30, "slow"), after(10, "fast")).await?;
//!     println!("{winner} won at position {index}");
//!
//!     Ok(())
//! }
//! ```
//!
//! `when_any!` needs every branch to produce the same type:
//!
//! ```rust,compile_fail
//! #[tandem::main]
//! async fn main() {
//!     let _ = tandem::when_any!(async { Ok(1u32) }, async { Ok("one") }).await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`combinator`]: `when_all`, `when_any` and their low-level engines
//! - [`time`]: sleep, timeouts and the cancellable timer
//! - [`io`]: completion sources and the timed I/O wrapper
//! - [`sync`]: the completion cell
//!
//! Only Linux is supported: the reactor is built on epoll.

mod reactor;
mod runtime;
mod utils;

pub mod combinator;
pub mod error;
pub mod io;
pub mod sync;
pub mod time;

pub use error::{Error, Result};
pub use runtime::Runtime;
pub use runtime::builder::RuntimeBuilder;
pub use runtime::task;
pub use runtime::yield_now::yield_now;

pub use tandem_macros::{main, test, when_all, when_any};
