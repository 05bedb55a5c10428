mod common;

use common::init_test_logging;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tandem::task::spawn;
use tandem::{RuntimeBuilder, yield_now};

#[test]
fn test_single_worker_thread() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    assert_eq!(rt.block_on(async { 42 }), 42);
}

#[test]
fn test_worker_threads_stress() {
    init_test_logging();

    let rt = RuntimeBuilder::new().worker_threads(8).build();
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    rt.block_on(async move {
        let handles: Vec<_> = (0..100)
            .map(|_| {
                let counter = counter_clone.clone();
                spawn(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    });

    assert_eq!(counter.load(Ordering::SeqCst), 100);
}

#[test]
fn test_worker_thread_names() {
    let rt = RuntimeBuilder::new()
        .worker_threads(3)
        .thread_name("fan-out")
        .build();

    let names = Arc::new(Mutex::new(HashSet::new()));
    let names_clone = names.clone();

    rt.block_on(async move {
        let handles: Vec<_> = (0..30)
            .map(|_| {
                let names = names_clone.clone();
                spawn(async move {
                    let name = thread::current().name().map(str::to_owned);
                    names.lock().unwrap().insert(name);
                    yield_now().await;
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    });

    for name in names.lock().unwrap().iter() {
        let name = name.as_deref().unwrap_or_default();
        assert!(name.starts_with("fan-out-"), "unexpected worker name {name:?}");
    }
}

#[test]
#[should_panic(expected = "worker_threads must be > 0")]
fn test_worker_threads_zero_panics() {
    let _ = RuntimeBuilder::new().worker_threads(0).build();
}

#[test]
fn test_sequential_runtimes() {
    for n in 1..=4 {
        let rt = RuntimeBuilder::new().worker_threads(n).build();
        assert_eq!(rt.block_on(async move { n * 10 }), n * 10);
    }
}

#[test]
fn test_nested_spawns() {
    let rt = RuntimeBuilder::new().worker_threads(4).build();

    let total = rt.block_on(async {
        let outer: Vec<_> = (0..4u32)
            .map(|i| {
                spawn(async move {
                    let inner: Vec<_> = (0..5u32).map(|j| spawn(async move { i * 10 + j })).collect();

                    let mut sum = 0;
                    for handle in inner {
                        sum += handle.await.unwrap();
                    }
                    sum
                })
            })
            .collect();

        let mut total = 0;
        for handle in outer {
            total += handle.await.unwrap();
        }
        total
    });

    assert_eq!(total, (0..4u32).flat_map(|i| (0..5u32).map(move |j| i * 10 + j)).sum::<u32>());
}

#[test]
#[should_panic(expected = "block_on future panicked: inner")]
fn test_block_on_propagates_panics() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    rt.block_on(async {
        if true {
            panic!("inner");
        }
    });
}

#[tandem::test(worker_threads = 2)]
async fn test_attribute_configures_the_runtime() {
    let handle = spawn(async { thread::current().name().map(str::to_owned) });
    let name = handle.await.unwrap().unwrap_or_default();

    assert!(name == "tandem-worker-0" || name == "tandem-worker-1");
}
