use crate::reactor::ReactorHandle;
use crate::runtime::work_stealing::injector::InjectorHandle;
use crate::runtime::work_stealing::queue::LocalQueue;

use std::cell::RefCell;
use std::sync::Arc;

thread_local! {
    /// Handle to the reactor of the runtime driving this thread.
    ///
    /// Timers and I/O sources reach the reactor through it without
    /// explicit parameter passing.
    pub(crate) static CURRENT_REACTOR: RefCell<Option<ReactorHandle>> =
        const { RefCell::new(None) };

    /// Handle to the global injector of the runtime driving this thread.
    pub(crate) static CURRENT_INJECTOR: RefCell<Option<InjectorHandle>> =
        const { RefCell::new(None) };

    /// Index of the current worker, set on worker threads only.
    pub(crate) static CURRENT_WORKER_ID: RefCell<Option<usize>> =
        const { RefCell::new(None) };

    /// Every worker's local queue, set on worker threads only.
    pub(crate) static CURRENT_LOCALS: RefCell<Option<Arc<Vec<Arc<LocalQueue>>>>> =
        const { RefCell::new(None) };
}

/// Installs `reactor` and `injector` as the current runtime context for
/// the duration of `f`, restoring the previous context afterwards.
pub(crate) fn enter_context<R>(
    reactor: ReactorHandle,
    injector: InjectorHandle,
    f: impl FnOnce() -> R,
) -> R {
    let prev_reactor = CURRENT_REACTOR.with(|r| r.replace(Some(reactor)));
    let prev_injector = CURRENT_INJECTOR.with(|i| i.replace(Some(injector)));

    let out = f();

    CURRENT_INJECTOR.with(|i| i.replace(prev_injector));
    CURRENT_REACTOR.with(|r| r.replace(prev_reactor));

    out
}

/// Returns the injector of the runtime driving this thread.
///
/// # Panics
///
/// Panics if called outside the context of a runtime.
pub(crate) fn current_injector() -> InjectorHandle {
    CURRENT_INJECTOR.with(|cell| {
        cell.borrow()
            .as_ref()
            .expect("must be called within the context of a tandem runtime")
            .clone()
    })
}

/// Returns the reactor of the runtime driving this thread.
///
/// # Panics
///
/// Panics if called outside the context of a runtime.
pub(crate) fn current_reactor() -> ReactorHandle {
    CURRENT_REACTOR.with(|cell| {
        cell.borrow()
            .as_ref()
            .expect("timers and I/O must be used within the context of a tandem runtime")
            .clone()
    })
}
