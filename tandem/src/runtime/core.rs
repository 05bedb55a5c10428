use super::executor::core::Executor;
use super::task::{self, SharedFuture};
use crate::error::{Error, Result};
use crate::reactor::command::Command;
use crate::reactor::{Reactor, ReactorHandle};

use tracing::debug;

use std::future::Future;
use std::io;

/// The main runtime handle.
///
/// `Runtime` owns:
/// - a pool of worker threads driving spawned awaitables,
/// - a reactor thread delivering timer expirations and I/O readiness,
/// - a synchronous entry point via [`block_on`](Self::block_on).
///
/// Dropping the runtime stops both, drops every task that has not
/// finished and joins all threads. Handles to unfinished work resolve as
/// cancelled.
pub struct Runtime {
    /// Task executor responsible for scheduling and running futures.
    executor: Executor,

    /// Handle to the reactor thread.
    reactor_handle: ReactorHandle,
}

impl Runtime {
    pub(crate) fn new(worker_threads: usize, thread_name: &str) -> io::Result<Self> {
        let reactor_handle = Reactor::start()?;

        let executor = match Executor::new(reactor_handle.clone(), worker_threads, thread_name) {
            Ok(executor) => executor,
            Err(err) => {
                reactor_handle.send(Command::Shutdown);
                return Err(err);
            }
        };

        Ok(Self {
            executor,
            reactor_handle,
        })
    }

    /// Spawns a future onto the runtime and returns a handle to its
    /// output.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let handle = runtime.spawn(async { 1 + 1 });
    /// assert_eq!(handle.get().unwrap(), 2);
    /// ```
    pub fn spawn<F, T>(&self, future: F) -> SharedFuture<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        task::spawn_on(self.executor.injector(), future)
    }

    /// Starts a fallible awaitable and returns a multi-consumer handle to
    /// its outcome.
    ///
    /// Works from any thread, including threads that are not part of the
    /// runtime.
    pub fn start_async<F, T>(&self, awaitable: F) -> SharedFuture<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        task::start_async_on(self.executor.injector(), awaitable)
    }

    /// Runs a future to completion, blocking the current thread.
    ///
    /// The future runs on a worker like any other task; the calling thread
    /// only waits for its output.
    ///
    /// # Panics
    ///
    /// Panics if the future panics, or if the runtime drops it before it
    /// completes.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let result = runtime.block_on(async { 42 });
    /// assert_eq!(result, 42);
    /// ```
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match self.spawn(future).into_outcome() {
            Ok(output) => output,
            Err(Error::Panicked(message)) => panic!("block_on future panicked: {message}"),
            Err(err) => panic!("block_on future did not complete: {err}"),
        }
    }
}

impl Drop for Runtime {
    /// Shuts down the runtime.
    ///
    /// 1. Stops the workers and drops queued tasks
    /// 2. Sends a shutdown command to the reactor
    /// 3. Joins all worker threads
    /// 4. Drops every task that is still parked
    fn drop(&mut self) {
        debug!("runtime shutting down");

        self.executor.shutdown();
        self.reactor_handle.send(Command::Shutdown);
        self.executor.join();
        self.executor.release();
    }
}
