mod common;

use common::{after, fail_after, init_test_logging};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};
use tandem::time::sleep;
use tandem::{Error, RuntimeBuilder, task};

#[test]
fn test_start_async_from_outside_the_runtime() {
    init_test_logging();

    let rt = RuntimeBuilder::new().worker_threads(2).build();
    let handle = rt.start_async(after(10, 5));

    assert_eq!(handle.get().unwrap(), 5);
    assert!(handle.is_ready());
}

#[test]
fn test_failure_is_observed_verbatim_by_every_clone() {
    let rt = RuntimeBuilder::new().build();
    let handle = rt.start_async(fail_after::<u32>(5, "disk on fire"));
    let other = handle.clone();

    for observed in [handle.get(), other.get(), handle.get()] {
        assert_eq!(observed.unwrap_err().to_string(), "operation failed: disk on fire");
    }
}

#[test]
fn test_many_threads_wait_on_clones() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();
    let handle = rt.start_async(after(30, String::from("shared")));

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let handle = handle.clone();
            thread::spawn(move || handle.get())
        })
        .collect();

    for thread in threads {
        assert_eq!(thread.join().unwrap().unwrap(), "shared");
    }
}

#[test]
fn test_wait_timeout() {
    let rt = RuntimeBuilder::new().build();
    let handle = rt.start_async(after(200, ()));

    assert!(!handle.wait_timeout(Duration::from_millis(10)));
    assert!(!handle.is_ready());
    assert!(handle.wait_timeout(Duration::from_secs(5)));
    assert!(handle.get().is_ok());
}

#[test]
fn test_handle_count_tracks_clones() {
    let rt = RuntimeBuilder::new().build();
    let handle = rt.start_async(after(1, 1u8));
    assert_eq!(handle.handle_count(), 1);

    let clone = handle.clone();
    assert_eq!(handle.handle_count(), 2);

    drop(clone);
    assert_eq!(handle.handle_count(), 1);
}

#[test]
fn test_dropping_every_handle_does_not_stop_the_task() {
    let rt = RuntimeBuilder::new().build();
    let (tx, rx) = mpsc::channel();

    drop(rt.start_async(async move {
        sleep(Duration::from_millis(10)).await;
        tx.send(7).unwrap();
        Ok(())
    }));

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
}

#[test]
fn test_outcome_discarded_when_every_handle_is_gone() {
    let rt = RuntimeBuilder::new().build();
    let payload = Arc::new(());

    let handle = rt.start_async({
        let payload = payload.clone();
        async move {
            sleep(Duration::from_millis(20)).await;
            Ok(payload)
        }
    });
    drop(handle);

    let deadline = Instant::now() + Duration::from_secs(5);
    while Arc::strong_count(&payload) > 1 {
        assert!(Instant::now() < deadline, "outcome was never released");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_runtime_shutdown_cancels_pending_handles() {
    init_test_logging();

    let rt = RuntimeBuilder::new().build();
    let handle = rt.start_async(after(60_000, 1));

    drop(rt);

    assert!(matches!(handle.get(), Err(Error::Cancelled)));
}

#[test]
fn test_panicking_awaitable_resolves_with_panicked() {
    let rt = RuntimeBuilder::new().build();
    let handle = rt.spawn(async {
        if true {
            panic!("exploded");
        }
    });

    match handle.get() {
        Err(Error::Panicked(message)) => assert_eq!(message, "exploded"),
        other => panic!("expected a panic report, got {other:?}"),
    }
}

#[tandem::test]
async fn test_shared_future_awaited_from_several_tasks() {
    let source = task::start_async(after(20, 9u64));

    let readers: Vec<_> = (0..4)
        .map(|i| {
            let source = source.clone();
            task::spawn(async move { source.await.unwrap() + i })
        })
        .collect();

    let mut sums = Vec::new();
    for reader in readers {
        sums.push(reader.await.unwrap());
    }

    assert_eq!(sums, vec![9, 10, 11, 12]);
    assert_eq!(source.await.unwrap(), 9);
}
