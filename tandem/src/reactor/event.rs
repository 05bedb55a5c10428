/// Readiness reported by the poller for one registration.
pub(crate) struct Event {
    /// Token the descriptor was registered under.
    pub(crate) token: u64,

    /// Readable, hung up or in error.
    pub(crate) readable: bool,

    pub(crate) writable: bool,
}
