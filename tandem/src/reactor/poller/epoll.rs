//! Linux `epoll` poller.
//!
//! Responsibilities:
//! - Register file descriptors with read/write interests
//! - Block waiting for I/O readiness, bounded by the next timer deadline
//! - Wake the reactor when new commands are submitted

use super::common::{Interest, Waker};
use crate::reactor::event::Event;

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLLERR, EPOLLHUP, EPOLLIN, EPOLLOUT,
    epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

/// Reserved token of the wake-up eventfd.
///
/// Registration tokens come from a counter starting at zero, so they
/// never reach this value.
const WAKE_TOKEN: u64 = u64::MAX;

/// Maximum number of events collected per `epoll_wait`.
const EVENT_CAPACITY: usize = 64;

/// Linux `epoll` poller.
pub(crate) struct EpollPoller {
    /// Epoll file descriptor.
    epoll: OwnedFd,

    /// Reusable buffer for epoll events.
    events: Vec<epoll_event>,

    /// Waker wrapping the internal eventfd.
    waker: Arc<Waker>,
}

fn cvt(rc: libc::c_int) -> io::Result<libc::c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

impl EpollPoller {
    /// Creates the epoll instance and registers its wake-up eventfd.
    pub(crate) fn new() -> io::Result<Self> {
        // Safety: plain syscalls; the returned descriptors are owned below.
        let epoll = unsafe { OwnedFd::from_raw_fd(cvt(epoll_create1(EPOLL_CLOEXEC))?) };
        let eventfd = unsafe {
            OwnedFd::from_raw_fd(cvt(libc::eventfd(
                0,
                libc::EFD_NONBLOCK | libc::EFD_CLOEXEC,
            ))?)
        };

        let mut event = epoll_event {
            events: EPOLLIN as u32,
            u64: WAKE_TOKEN,
        };

        // Safety: both descriptors are open and `event` outlives the call.
        cvt(unsafe {
            epoll_ctl(
                epoll.as_raw_fd(),
                EPOLL_CTL_ADD,
                eventfd.as_raw_fd(),
                &mut event,
            )
        })?;

        Ok(Self {
            epoll,
            events: Vec::with_capacity(EVENT_CAPACITY),
            waker: Arc::new(Waker(eventfd)),
        })
    }

    /// Returns the poller waker.
    pub(crate) fn waker(&self) -> Arc<Waker> {
        self.waker.clone()
    }

    /// Registers `fd` under `token`.
    ///
    /// Fails with `EPERM` for descriptors epoll cannot watch, such as
    /// regular files.
    pub(crate) fn register(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        let mut flags = 0;

        if interest.read {
            flags |= EPOLLIN;
        }
        if interest.write {
            flags |= EPOLLOUT;
        }

        let mut event = epoll_event {
            events: flags as u32,
            u64: token,
        };

        // Safety: `event` outlives the call; a stale `fd` yields an error.
        cvt(unsafe { epoll_ctl(self.epoll.as_raw_fd(), EPOLL_CTL_ADD, fd, &mut event) })?;

        Ok(())
    }

    /// Removes `fd` from the interest list.
    pub(crate) fn deregister(&self, fd: RawFd) {
        // Safety: a stale `fd` only makes the call fail, which is ignored.
        unsafe {
            epoll_ctl(
                self.epoll.as_raw_fd(),
                EPOLL_CTL_DEL,
                fd,
                std::ptr::null_mut(),
            );
        }
    }

    /// Waits for readiness events and appends them to `events`.
    ///
    /// `timeout` is rounded up to whole milliseconds so a timer is never
    /// observed as not-yet-expired right after the wait returns.
    pub(crate) fn poll(&mut self, events: &mut Vec<Event>, timeout: Option<Duration>) -> io::Result<()> {
        let timeout_ms = match timeout {
            Some(timeout) => {
                let mut ms = timeout.as_millis();
                if Duration::from_millis(ms as u64) < timeout {
                    ms += 1;
                }
                ms.min(i32::MAX as u128) as i32
            }
            None => -1,
        };

        self.events.clear();

        // Safety: the buffer has room for `capacity` entries, which is what
        // the kernel is told it may fill.
        let n = unsafe {
            epoll_wait(
                self.epoll.as_raw_fd(),
                self.events.as_mut_ptr(),
                self.events.capacity() as i32,
                timeout_ms,
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(());
            }
            return Err(err);
        }

        // Safety: the kernel initialized the first `n` entries.
        unsafe {
            self.events.set_len(n as usize);
        }

        for ev in &self.events {
            let token = ev.u64;
            let flags = ev.events;

            if token == WAKE_TOKEN {
                self.waker.reset()?;
                continue;
            }

            events.push(Event {
                token,
                readable: flags & ((EPOLLIN | EPOLLERR | EPOLLHUP) as u32) != 0,
                writable: flags & (EPOLLOUT as u32) != 0,
            });
        }

        Ok(())
    }
}
