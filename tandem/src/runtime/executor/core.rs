use crate::reactor::ReactorHandle;
use crate::runtime::context::enter_context;
use crate::runtime::executor::worker::Worker;
use crate::runtime::work_stealing::injector::{Injector, InjectorHandle};
use crate::runtime::work_stealing::queue::LocalQueue;

use tracing::{debug, error};

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Multi-threaded task executor.
///
/// The `Executor` owns the global injector and every worker thread. Each
/// worker runs with the runtime context installed, so code polled on it
/// can reach the reactor and spawn further tasks.
pub(crate) struct Executor {
    /// Global injector queue shared by all workers.
    injector: InjectorHandle,

    /// Join handles for worker threads.
    handles: Vec<JoinHandle<()>>,
}

impl Executor {
    /// Starts `threads` workers named `{thread_name}-{index}`.
    ///
    /// If a worker thread cannot be spawned, the ones already running are
    /// shut down and joined before the error is returned.
    pub(crate) fn new(
        reactor_handle: ReactorHandle,
        threads: usize,
        thread_name: &str,
    ) -> io::Result<Self> {
        let injector = Arc::new(Injector::new());

        let locals: Arc<Vec<Arc<LocalQueue>>> =
            Arc::new((0..threads).map(|_| Arc::new(LocalQueue::new())).collect());

        let mut executor = Self {
            injector,
            handles: Vec::with_capacity(threads),
        };

        for id in 0..threads {
            let worker = Worker::new(id, locals.clone(), executor.injector.clone());
            let reactor = reactor_handle.clone();
            let injector = executor.injector.clone();

            let spawned = thread::Builder::new()
                .name(format!("{thread_name}-{id}"))
                .spawn(move || {
                    enter_context(reactor.clone(), injector, || worker.run(reactor));
                });

            match spawned {
                Ok(handle) => executor.handles.push(handle),
                Err(err) => {
                    error!(worker = id, error = %err, "failed to spawn worker thread");
                    executor.shutdown();
                    executor.join();
                    return Err(err);
                }
            }
        }

        debug!(workers = threads, "executor started");

        Ok(executor)
    }

    /// Handle to the global injector, for spawning from outside a worker.
    pub(crate) fn injector(&self) -> &InjectorHandle {
        &self.injector
    }

    /// Signals all workers to shut down and drops queued tasks.
    pub(crate) fn shutdown(&self) {
        self.injector.shutdown();
    }

    /// Drops every unfinished task, so that handles waiting on them
    /// resolve as cancelled.
    ///
    /// Must be called after [`join`](Self::join).
    pub(crate) fn release(&self) {
        self.injector.release();
    }

    /// Waits for all worker threads to terminate.
    ///
    /// This should be called after initiating shutdown.
    pub(crate) fn join(&mut self) {
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}
