use crate::runtime::task::Task;

use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Vtable shared by every task waker.
///
/// The data pointer of each `RawWaker` is an `Arc<Task>` turned into a raw
/// pointer with [`Arc::into_raw`]; every function below keeps the strong
/// count balanced.
static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

/// Creates a [`Waker`] that reschedules `task` when woken.
pub(crate) fn make_waker(task: Arc<Task>) -> Waker {
    let raw = RawWaker::new(Arc::into_raw(task).cast::<()>(), &VTABLE);

    // Safety: the pointer comes from `Arc::into_raw` and the vtable
    // functions treat it as exactly that.
    unsafe { Waker::from_raw(raw) }
}

fn clone_raw(ptr: *const ()) -> RawWaker {
    // Safety: `ptr` is a live `Arc<Task>` owned by the waker being cloned.
    unsafe { Arc::increment_strong_count(ptr.cast::<Task>()) };

    RawWaker::new(ptr, &VTABLE)
}

fn wake_raw(ptr: *const ()) {
    // Safety: consumes the reference owned by this waker.
    let task = unsafe { Arc::from_raw(ptr.cast::<Task>()) };
    Task::wake(task);
}

fn wake_by_ref_raw(ptr: *const ()) {
    // Safety: borrows the reference owned by this waker without releasing it.
    let task = ManuallyDrop::new(unsafe { Arc::from_raw(ptr.cast::<Task>()) });
    Task::wake(Arc::clone(&task));
}

fn drop_raw(ptr: *const ()) {
    // Safety: releases the reference owned by this waker.
    drop(unsafe { Arc::from_raw(ptr.cast::<Task>()) });
}
