use crate::reactor::ReactorHandle;
use crate::runtime::context::{CURRENT_LOCALS, CURRENT_WORKER_ID, enter_context};
use crate::runtime::task::Task;
use crate::runtime::work_stealing::injector::InjectorHandle;
use crate::runtime::work_stealing::queue::LocalQueue;

use tracing::trace;

use std::sync::Arc;

/// A worker thread in the executor.
///
/// The lookup order for the next task is:
/// 1. Pop from the local queue
/// 2. Steal from the global injector
/// 3. Steal from other workers
/// 4. Park if no work is available
pub(crate) struct Worker {
    /// Index of this worker's queue in `locals`.
    id: usize,

    /// All local queues (one per worker).
    locals: Arc<Vec<Arc<LocalQueue>>>,

    /// Handle to the global injector queue.
    injector: InjectorHandle,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        locals: Arc<Vec<Arc<LocalQueue>>>,
        injector: InjectorHandle,
    ) -> Self {
        Self {
            id,
            locals,
            injector,
        }
    }

    /// Runs the worker loop until the injector is shut down.
    ///
    /// Tasks left in this worker's local queue at shutdown are dropped
    /// before the thread exits.
    pub(crate) fn run(&self, reactor: ReactorHandle) {
        CURRENT_WORKER_ID.with(|id| *id.borrow_mut() = Some(self.id));
        CURRENT_LOCALS.with(|locals| *locals.borrow_mut() = Some(self.locals.clone()));

        trace!(worker = self.id, "worker started");

        while !self.injector.is_shutdown() {
            match self.next_task() {
                Some(task) => {
                    enter_context(reactor.clone(), self.injector.clone(), || task.run());
                }
                None => self.injector.park(),
            }
        }

        CURRENT_LOCALS.with(|locals| *locals.borrow_mut() = None);
        CURRENT_WORKER_ID.with(|id| *id.borrow_mut() = None);

        self.locals[self.id].clear();

        trace!(worker = self.id, "worker stopped");
    }

    fn next_task(&self) -> Option<Arc<Task>> {
        self.locals[self.id]
            .pop()
            .or_else(|| self.injector.steal())
            .or_else(|| self.try_steal())
    }

    /// Attempts to steal a task from another worker's local queue.
    ///
    /// Victims are visited round-robin starting after this worker.
    fn try_steal(&self) -> Option<Arc<Task>> {
        let len = self.locals.len();

        (1..len)
            .map(|offset| (self.id + offset) % len)
            .find_map(|victim| self.locals[victim].steal())
    }
}
