use std::io;
use std::os::fd::{AsRawFd, OwnedFd};

/// Readiness a registration is interested in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Interest {
    pub(crate) read: bool,
    pub(crate) write: bool,
}

impl Interest {
    pub(crate) const READABLE: Interest = Interest {
        read: true,
        write: false,
    };
}

/// Interrupts a blocking poll from another thread.
///
/// Wraps the `eventfd` the poller keeps registered under its reserved
/// wake token.
pub(crate) struct Waker(pub(crate) OwnedFd);

impl Waker {
    /// Wakes the poller.
    ///
    /// Writing to a saturated eventfd fails with `EAGAIN`, which still
    /// leaves the poller readable, so the error is ignored.
    pub(crate) fn wake(&self) {
        let buf: u64 = 1;

        // Safety: `buf` is valid for 8 bytes and the fd is owned by `self`.
        unsafe {
            libc::write(self.0.as_raw_fd(), (&buf as *const u64).cast(), 8);
        }
    }

    /// Resets the eventfd counter after a wake-up was observed.
    pub(crate) fn reset(&self) -> io::Result<()> {
        let mut buf = 0u64;

        // Safety: `buf` is valid for 8 bytes and the fd is owned by `self`.
        let n = unsafe { libc::read(self.0.as_raw_fd(), (&mut buf as *mut u64).cast(), 8) };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
        }

        Ok(())
    }
}
