use super::handle::{Resolver, SharedFuture};
use super::state::TaskState;
use super::unwind::CatchUnwind;
use super::waker::make_waker;
use crate::error::{Error, Result};
use crate::runtime::context::{self, CURRENT_INJECTOR, CURRENT_LOCALS, CURRENT_WORKER_ID};
use crate::runtime::work_stealing::injector::InjectorHandle;

use std::cell::UnsafeCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tracing::{error, trace};

/// Type-erased body of a task.
///
/// Whatever the awaitable produces has already been handed to its sink by
/// the time this future returns `Poll::Ready`.
type Body = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A spawned unit of work managed by the runtime.
///
/// `Task` is not generic: the awaitable and the place its outcome goes
/// are fused into a single [`Body`] at spawn time, so every queue and
/// every waker deals with plain `Arc<Task>`.
pub(crate) struct Task {
    /// The body, dropped as soon as it completes.
    ///
    /// Only accessed while [`TaskState`] is `RUNNING`.
    body: UnsafeCell<Option<Body>>,

    /// Scheduling state.
    state: TaskState,

    /// Global injector used for re-scheduling on wake-up.
    injector: InjectorHandle,
}

// Safety: `body` is only touched by the thread that won the
// `QUEUED -> RUNNING` transition, which serializes all access.
unsafe impl Send for Task {}
unsafe impl Sync for Task {}

impl Task {
    fn new(body: Body, injector: InjectorHandle) -> Self {
        Self {
            body: UnsafeCell::new(Some(body)),
            state: TaskState::queued(),
            injector,
        }
    }

    /// Polls the task once.
    ///
    /// Called by worker threads only. A task that is not queued (already
    /// running elsewhere or completed) is ignored.
    pub(crate) fn run(self: Arc<Self>) {
        if !self.state.begin_run() {
            return;
        }

        let waker = make_waker(self.clone());
        let mut cx = Context::from_waker(&waker);

        // Safety: the RUNNING state grants exclusive access to `body`.
        let body = unsafe { &mut *self.body.get() };

        let Some(future) = body.as_mut() else {
            self.state.complete();
            return;
        };

        match future.as_mut().poll(&mut cx) {
            Poll::Pending => {
                if self.state.end_pending() {
                    self.injector.push(self.clone());
                }
            }
            Poll::Ready(()) => {
                *body = None;
                self.state.complete();
                trace!(task = ?Arc::as_ptr(&self), "task completed");
            }
        }
    }

    /// Schedules the task again after a wake-up.
    pub(crate) fn wake(self: Arc<Self>) {
        if self.state.wake() {
            let injector = self.injector.clone();
            injector.push(self);
        }
    }

    /// Drops the body without completing it.
    ///
    /// Only called at shutdown, once no worker can run the task anymore.
    pub(crate) fn abandon(&self) {
        // Safety: every worker has exited, so nothing else touches `body`.
        let body = unsafe { (*self.body.get()).take() };

        if body.is_some() {
            trace!(task = ?std::ptr::from_ref(self), "task abandoned");
        }

        drop(body);
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.injector.unregister(std::ptr::from_ref(self) as usize);
    }
}

/// Pushes a new task to the current worker's local queue if this thread
/// is a worker of the same runtime, otherwise to the global injector.
fn schedule(task: Arc<Task>, injector: &InjectorHandle) {
    let same_runtime = CURRENT_INJECTOR.with(|current| {
        current
            .borrow()
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, injector))
    });

    if !same_runtime {
        injector.push(task);
        return;
    }

    let pushed_locally = CURRENT_WORKER_ID.with(|id| {
        let Some(id) = *id.borrow() else {
            return false;
        };

        CURRENT_LOCALS.with(|locals| match locals.borrow().as_ref() {
            Some(locals) => {
                locals[id].push(task.clone());
                true
            }
            None => false,
        })
    });

    if !pushed_locally {
        injector.push(task);
    }
}

/// Spawns `awaitable` on `injector` and delivers its outcome to `sink`.
///
/// This is the single spawn path of the crate. The awaitable is polled
/// under [`CatchUnwind`], so `sink` always runs exactly once: with the
/// awaitable's own outcome, or with [`Error::Panicked`] if polling it
/// panicked. If the runtime shuts down before the task finishes, the task
/// is dropped along with `sink`; callers that need a signal in that case
/// put a drop guard inside `sink` (as [`Resolver`] does).
pub(crate) fn spawn_with<F, T, S>(injector: &InjectorHandle, awaitable: F, sink: S)
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
    S: FnOnce(Result<T>) + Send + 'static,
{
    let body = async move {
        let outcome = match CatchUnwind::new(awaitable).await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let error = Error::panicked(payload);
                error!(%error, "awaitable panicked");
                Err(error)
            }
        };

        sink(outcome);
    };

    let task = Arc::new(Task::new(Box::pin(body), injector.clone()));
    injector.register(&task);
    trace!(task = ?Arc::as_ptr(&task), "task spawned");

    schedule(task, injector);
}

/// Spawns an infallible future on `injector`.
pub(crate) fn spawn_on<F, T>(injector: &InjectorHandle, future: F) -> SharedFuture<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    start_async_on(injector, async move { Ok(future.await) })
}

/// Starts a fallible awaitable on `injector`.
pub(crate) fn start_async_on<F, T>(injector: &InjectorHandle, awaitable: F) -> SharedFuture<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let (resolver, shared) = Resolver::new();
    spawn_with(injector, awaitable, move |outcome| resolver.resolve(outcome));
    shared
}

/// Spawns `awaitable` on the current runtime, handing its outcome to `sink`.
///
/// # Panics
///
/// Panics if called outside the context of a runtime.
pub(crate) fn detach<F, T, S>(awaitable: F, sink: S)
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
    S: FnOnce(Result<T>) + Send + 'static,
{
    spawn_with(&context::current_injector(), awaitable, sink);
}

/// Spawns a future onto the current runtime.
///
/// The returned [`SharedFuture`] resolves to `Ok(output)`, or to
/// [`Error::Panicked`] if the future panicked. Dropping every handle does
/// not cancel the task; its output is discarded once it finishes.
///
/// # Panics
///
/// Panics if called outside the context of a runtime.
///
/// # Examples
///
/// ```rust,ignore
/// let handle = tandem::task::spawn(async { 6 * 7 });
/// assert_eq!(handle.await.unwrap(), 42);
/// ```
pub fn spawn<F, T>(future: F) -> SharedFuture<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    spawn_on(&context::current_injector(), future)
}

/// Starts a fallible awaitable and returns a multi-consumer handle to
/// its outcome.
///
/// This is the bridge from the crate's awaitables to blocking or
/// future-based consumers: the handle can be cloned freely, waited on
/// from any thread, or awaited from another task.
///
/// # Panics
///
/// Panics if called outside the context of a runtime.
pub fn start_async<F, T>(awaitable: F) -> SharedFuture<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    start_async_on(&context::current_injector(), awaitable)
}
