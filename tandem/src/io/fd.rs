use super::source::{Completer, CompletionSource, IoStatus, RequestId};
use crate::reactor::ReactorHandle;
use crate::reactor::command::Command;
use crate::reactor::io::Readiness;
use crate::reactor::poller::Interest;
use crate::reactor::poller::unix::{sys_pipe, sys_read, sys_set_nonblocking};
use crate::runtime::context;

use parking_lot::Mutex;
use tracing::trace;

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;

/// The read currently parked on the reactor.
struct InFlight {
    id: RequestId,
    token: u64,
    reactor: ReactorHandle,
}

struct ReaderInner {
    fd: OwnedFd,
    in_flight: Mutex<Option<InFlight>>,
}

impl ReaderInner {
    fn clear(&self, id: RequestId) {
        let mut in_flight = self.in_flight.lock();

        if in_flight.as_ref().is_some_and(|read| read.id == id) {
            *in_flight = None;
        }
    }
}

/// A [`CompletionSource`] reading from a non-blocking file descriptor.
///
/// Each operation reads at most the requested number of bytes. When data
/// is available right away the read completes inside
/// [`start`](CompletionSource::start); otherwise it waits on the runtime's
/// reactor for readiness. A read of zero bytes on a non-empty request
/// completes with [`IoStatus::EndOfStream`].
///
/// Works with pipes, sockets and terminals, not with regular files. One
/// read may be in flight at a time.
pub struct FdReader {
    inner: Arc<ReaderInner>,
}

impl FdReader {
    /// Takes ownership of `fd` and switches it to non-blocking mode.
    pub fn new(fd: OwnedFd) -> io::Result<Self> {
        sys_set_nonblocking(fd.as_raw_fd())?;

        Ok(Self {
            inner: Arc::new(ReaderInner {
                fd,
                in_flight: Mutex::new(None),
            }),
        })
    }
}

impl AsRawFd for FdReader {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.fd.as_raw_fd()
    }
}

/// Creates a pipe, returning a reader for the read end and the write end.
///
/// The write end stays blocking and can be wrapped in a
/// [`File`](std::fs::File) to write into the pipe.
pub fn pipe() -> io::Result<(FdReader, OwnedFd)> {
    let (read, write) = sys_pipe()?;
    Ok((FdReader::new(read)?, write))
}

/// Reads once, retrying on `EINTR`.
fn read_once(fd: RawFd, buffer: &mut [u8]) -> io::Result<usize> {
    loop {
        match sys_read(fd, buffer) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn status_of(read: usize, requested: usize) -> IoStatus {
    if read == 0 && requested > 0 {
        IoStatus::EndOfStream
    } else {
        IoStatus::Success
    }
}

fn os_code(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(libc::EIO)
}

impl CompletionSource for FdReader {
    /// Maximum number of bytes to read.
    type Operation = usize;

    /// The bytes read.
    type Output = Vec<u8>;

    fn start(&self, id: RequestId, len: usize, completer: Completer<Vec<u8>>) -> io::Result<()> {
        let mut in_flight = self.inner.in_flight.lock();

        if in_flight.is_some() {
            return Err(io::Error::other("a read is already in flight on this reader"));
        }

        let fd = self.inner.fd.as_raw_fd();
        let mut buffer = vec![0u8; len];

        match read_once(fd, &mut buffer) {
            Ok(n) => {
                drop(in_flight);
                buffer.truncate(n);
                completer.complete(status_of(n, len), n, buffer);
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                let reactor = context::current_reactor();
                let token = reactor.next_token();

                *in_flight = Some(InFlight {
                    id,
                    token,
                    reactor: reactor.clone(),
                });
                drop(in_flight);

                trace!(request = %id, fd, token, "read parked on reactor");

                reactor.send(Command::Register {
                    token,
                    fd,
                    interest: Interest::READABLE,
                    handler: Box::new(PendingRead {
                        id,
                        reader: self.inner.clone(),
                        buffer,
                        completer: Some(completer),
                    }),
                });

                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn cancel(&self, id: RequestId) {
        let in_flight = self.inner.in_flight.lock();

        if let Some(read) = in_flight.as_ref().filter(|read| read.id == id) {
            trace!(request = %id, token = read.token, "cancelling parked read");
            read.reactor.send(Command::Cancel { token: read.token });
        }
    }
}

/// A read waiting for its descriptor to become readable.
struct PendingRead {
    id: RequestId,
    reader: Arc<ReaderInner>,
    buffer: Vec<u8>,
    completer: Option<Completer<Vec<u8>>>,
}

impl PendingRead {
    fn finish(&mut self, status: IoStatus, bytes: usize) {
        self.reader.clear(self.id);

        if let Some(completer) = self.completer.take() {
            let mut output = std::mem::take(&mut self.buffer);
            output.truncate(bytes);
            completer.complete(status, bytes, output);
        }
    }
}

impl Readiness for PendingRead {
    fn on_ready(&mut self) -> bool {
        let requested = self.buffer.len();

        match read_once(self.reader.fd.as_raw_fd(), &mut self.buffer) {
            Ok(n) => self.finish(status_of(n, requested), n),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return false,
            Err(err) => self.finish(IoStatus::Failed(os_code(&err)), 0),
        }

        true
    }

    fn on_abort(mut self: Box<Self>) {
        self.finish(IoStatus::Aborted, 0);
    }

    fn on_error(mut self: Box<Self>, error: io::Error) {
        self.finish(IoStatus::Failed(os_code(&error)), 0);
    }
}
