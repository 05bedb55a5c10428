use super::io::Readiness;
use super::poller::Interest;
use super::timer::TimerEntry;

use std::os::fd::RawFd;

/// A request sent to the reactor thread.
pub(crate) enum Command {
    /// Watch `fd` and drive `handler` on readiness.
    Register {
        token: u64,
        fd: RawFd,
        interest: Interest,
        handler: Box<dyn Readiness>,
    },

    /// Stop watching the registration and abort its handler.
    Cancel { token: u64 },

    /// Queue a timer expiration.
    SetTimer(TimerEntry),

    Shutdown,
}
