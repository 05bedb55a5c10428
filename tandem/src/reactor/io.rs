use std::io;
use std::os::fd::RawFd;

/// Callback side of an I/O registration.
///
/// The reactor drives exactly one of the three methods to the end of the
/// registration's life: `on_ready` until it returns `true`, `on_abort` when
/// the registration is cancelled or the reactor shuts down, or `on_error`
/// when the descriptor could not be registered at all.
///
/// All methods run on the reactor thread and must not block.
pub(crate) trait Readiness: Send {
    /// The descriptor became ready. Returns `true` once the registration
    /// is finished and can be dropped.
    fn on_ready(&mut self) -> bool;

    /// The registration was cancelled before it finished.
    fn on_abort(self: Box<Self>);

    /// The descriptor could not be registered with the poller.
    fn on_error(self: Box<Self>, error: io::Error);
}

/// An I/O registration owned by the reactor.
pub(crate) struct IoEntry {
    pub(crate) fd: RawFd,
    pub(crate) handler: Box<dyn Readiness>,
}
