use super::command::Command;
use super::event::Event;
use super::io::IoEntry;
use super::poller::{Poller, Waker};
use super::timer::TimerEntry;

use tracing::{debug, error, trace};

use std::collections::{BinaryHeap, HashMap};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::Instant;

/// Heap size below which stale timer entries are left to expire.
const TIMER_PURGE_THRESHOLD: usize = 64;

/// The reactor.
///
/// The reactor runs on a dedicated thread and is responsible for:
/// - firing expired timers,
/// - polling OS readiness for registered descriptors,
/// - driving I/O handlers to completion or abortion.
///
/// It communicates with the rest of the runtime through [`Command`]
/// messages sent over a channel.
pub(crate) struct Reactor {
    /// Channel receiving commands from executor threads.
    receiver: Receiver<Command>,

    poller: Poller,

    /// Buffer used to collect I/O events from the poller.
    events: Vec<Event>,

    /// Min-heap of pending timers ordered by deadline.
    timers: BinaryHeap<TimerEntry>,

    /// Heap size that triggers the next purge of stale timers.
    purge_at: usize,

    /// Active I/O registrations by token.
    io: HashMap<u64, IoEntry>,
}

/// A handle used to communicate with the reactor thread.
#[derive(Clone)]
pub(crate) struct ReactorHandle {
    /// Sender side of the command channel.
    sender: Sender<Command>,

    /// Waker used to interrupt the poller.
    waker: Arc<Waker>,

    /// Source of I/O registration tokens.
    tokens: Arc<AtomicU64>,
}

impl ReactorHandle {
    /// Sends a command to the reactor and wakes it.
    ///
    /// Commands sent after the reactor stopped are dropped, which aborts
    /// any I/O handler they carry.
    pub(crate) fn send(&self, cmd: Command) {
        match self.sender.send(cmd) {
            Ok(()) => self.waker.wake(),
            Err(rejected) => {
                trace!("reactor stopped, command dropped");

                if let Command::Register { handler, .. } = rejected.0 {
                    handler.on_abort();
                }
            }
        }
    }

    /// Allocates a fresh I/O registration token.
    pub(crate) fn next_token(&self) -> u64 {
        self.tokens.fetch_add(1, Ordering::Relaxed)
    }
}

impl Reactor {
    fn new(receiver: Receiver<Command>, poller: Poller) -> Self {
        Self {
            receiver,
            poller,
            events: Vec::with_capacity(64),
            timers: BinaryHeap::new(),
            purge_at: TIMER_PURGE_THRESHOLD,
            io: HashMap::new(),
        }
    }

    /// Starts the reactor thread and returns a handle to it.
    pub(crate) fn start() -> io::Result<ReactorHandle> {
        let (sender, receiver) = channel();
        let poller = Poller::new()?;
        let waker = poller.waker();

        thread::Builder::new()
            .name(String::from("tandem-reactor"))
            .spawn(move || {
                let mut reactor = Reactor::new(receiver, poller);

                if let Err(err) = reactor.run() {
                    error!(error = %err, "reactor stopped on poller failure");
                }

                reactor.shutdown();
            })?;

        debug!("reactor started");

        Ok(ReactorHandle {
            sender,
            waker,
            tokens: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Main reactor event loop.
    ///
    /// Each turn:
    /// 1. Handle I/O events from the previous poll
    /// 2. Process pending commands
    /// 3. Poll the OS for new events, bounded by the next timer
    /// 4. Fire expired timers
    fn run(&mut self) -> io::Result<()> {
        loop {
            let events = std::mem::take(&mut self.events);
            for event in &events {
                self.handle_event(event);
            }
            self.events = events;
            self.events.clear();

            while let Ok(cmd) = self.receiver.try_recv() {
                if !self.handle_command(cmd) {
                    return Ok(());
                }
            }

            let timeout = self
                .timers
                .peek()
                .map(|t| t.deadline.saturating_duration_since(Instant::now()));

            self.poller.poll(&mut self.events, timeout)?;

            let now = Instant::now();
            while self.timers.peek().is_some_and(|t| t.deadline <= now) {
                if let Some(timer) = self.timers.pop() {
                    timer.fire();
                }
            }
        }
    }

    /// Applies one command. Returns `false` on shutdown.
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Register {
                token,
                fd,
                interest,
                handler,
            } => match self.poller.register(fd, token, interest) {
                Ok(()) => {
                    trace!(token, fd, "descriptor registered");
                    self.io.insert(token, IoEntry { fd, handler });
                }
                Err(err) => {
                    debug!(token, fd, error = %err, "descriptor registration failed");
                    handler.on_error(err);
                }
            },
            Command::Cancel { token } => {
                if let Some(entry) = self.io.remove(&token) {
                    trace!(token, "registration cancelled");
                    self.poller.deregister(entry.fd);
                    entry.handler.on_abort();
                }
            }
            Command::SetTimer(entry) => {
                self.timers.push(entry);

                if self.timers.len() >= self.purge_at {
                    self.purge_timers();
                }
            }
            Command::Shutdown => return false,
        }

        true
    }

    /// Drops heap entries of disarmed or re-armed timers.
    ///
    /// The next purge waits until the heap has doubled, so each entry is
    /// scanned a bounded number of times.
    fn purge_timers(&mut self) {
        let before = self.timers.len();
        self.timers.retain(TimerEntry::is_current);
        self.purge_at = (self.timers.len() * 2).max(TIMER_PURGE_THRESHOLD);

        trace!(before, after = self.timers.len(), "stale timers purged");
    }

    fn handle_event(&mut self, event: &Event) {
        if !event.readable && !event.writable {
            return;
        }

        let Some(entry) = self.io.get_mut(&event.token) else {
            return;
        };

        if entry.handler.on_ready() {
            if let Some(entry) = self.io.remove(&event.token) {
                self.poller.deregister(entry.fd);
            }
        }
    }

    /// Aborts every registration and drops every pending timer.
    fn shutdown(&mut self) {
        debug!(
            registrations = self.io.len(),
            timers = self.timers.len(),
            "reactor shutting down"
        );

        for (_, entry) in self.io.drain() {
            self.poller.deregister(entry.fd);
            entry.handler.on_abort();
        }

        self.timers.clear();

        while let Ok(cmd) = self.receiver.try_recv() {
            if let Command::Register { handler, .. } = cmd {
                handler.on_abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactor::timer::TimerHandle;

    use std::time::Duration;

    fn detached_reactor() -> (Reactor, ReactorHandle) {
        let (sender, receiver) = channel();
        let poller = Poller::new().unwrap();

        let handle = ReactorHandle {
            sender,
            waker: poller.waker(),
            tokens: Arc::new(AtomicU64::new(0)),
        };

        (Reactor::new(receiver, poller), handle)
    }

    fn apply_pending(reactor: &mut Reactor) {
        while let Ok(cmd) = reactor.receiver.try_recv() {
            assert!(reactor.handle_command(cmd));
        }
    }

    #[test]
    fn test_rearmed_timers_do_not_pile_up() {
        let (mut reactor, handle) = detached_reactor();

        let live = TimerHandle::new(handle.clone());
        live.arm(Duration::from_secs(20 * 60), || {});

        let rearmed = TimerHandle::new(handle);
        for _ in 0..1000 {
            rearmed.arm(Duration::from_secs(20 * 60), || {});
        }

        apply_pending(&mut reactor);

        assert!(reactor.timers.len() < TIMER_PURGE_THRESHOLD);
        assert_eq!(reactor.timers.iter().filter(|t| t.is_current()).count(), 2);
    }

    #[test]
    fn test_disarmed_timers_are_purged() {
        let (mut reactor, handle) = detached_reactor();

        let timers: Vec<_> = (0..TIMER_PURGE_THRESHOLD)
            .map(|_| {
                let timer = TimerHandle::new(handle.clone());
                timer.arm(Duration::from_secs(20 * 60), || {});
                timer
            })
            .collect();

        for timer in &timers[1..] {
            assert!(timer.disarm());
        }

        apply_pending(&mut reactor);

        assert_eq!(reactor.timers.len(), 1);
        assert_eq!(reactor.purge_at, TIMER_PURGE_THRESHOLD);
    }
}
