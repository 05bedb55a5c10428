use libc::{F_GETFL, F_SETFL, O_CLOEXEC, O_NONBLOCK, fcntl, pipe2, read};

use std::io;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

/// Reads from a non-blocking descriptor.
///
/// `Ok(0)` means end of stream unless `buffer` is empty.
pub(crate) fn sys_read(fd: RawFd, buffer: &mut [u8]) -> io::Result<usize> {
    // Safety: `buffer` is valid for `buffer.len()` writable bytes.
    let n = unsafe { read(fd, buffer.as_mut_ptr().cast(), buffer.len()) };

    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Sets a file descriptor to non-blocking mode.
pub(crate) fn sys_set_nonblocking(fd: RawFd) -> io::Result<()> {
    // Safety: fcntl on an arbitrary fd at worst fails with EBADF.
    let flags = unsafe { fcntl(fd, F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    // Safety: as above.
    let rc = unsafe { fcntl(fd, F_SETFL, flags | O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Creates a close-on-exec pipe, returning `(read end, write end)`.
///
/// Both ends are blocking; callers flip the ones they drive through the
/// reactor.
pub(crate) fn sys_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as RawFd; 2];

    // Safety: `fds` has room for the two descriptors pipe2 writes.
    if unsafe { pipe2(fds.as_mut_ptr(), O_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }

    // Safety: pipe2 succeeded, so both descriptors are open and unowned.
    unsafe { Ok((OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1]))) }
}
