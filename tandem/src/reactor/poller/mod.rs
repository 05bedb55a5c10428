//! Platform I/O poller.
//!
//! The reactor uses the poller to:
//! - wait for I/O readiness events,
//! - bound that wait by the next timer deadline,
//! - be interrupted when new commands arrive.
//!
//! Only the Linux `epoll` backend exists for now.

#[cfg(not(target_os = "linux"))]
compile_error!("tandem's reactor currently supports Linux (epoll) only");

pub(crate) mod common;

pub(crate) use common::{Interest, Waker};

mod epoll;

pub(crate) type Poller = epoll::EpollPoller;

pub(crate) mod unix;
