mod common;

use common::{after, fail_after, init_test_logging};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tandem::Error;
use tandem::time::{execute_with_timeout, sleep, timeout};

#[tandem::test]
async fn test_execute_with_timeout_completes_before_deadline() {
    init_test_logging();

    let result = execute_with_timeout(after(10, 123), Duration::from_millis(200)).await;
    assert_eq!(result.unwrap(), 123);
}

#[tandem::test]
async fn test_execute_with_timeout_expires() {
    let start = Instant::now();
    let result = execute_with_timeout(after(500, 456), Duration::from_millis(20)).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(start.elapsed() < Duration::from_millis(400));
}

#[tandem::test]
async fn test_execute_with_timeout_propagates_failure() {
    let result = execute_with_timeout(fail_after::<u8>(5, "refused"), Duration::from_millis(200)).await;
    assert_eq!(result.unwrap_err().to_string(), "operation failed: refused");
}

#[tandem::test]
async fn test_execute_with_timeout_lets_the_awaitable_finish() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();

    let slow = async move {
        sleep(Duration::from_millis(40)).await;
        flag.store(true, Ordering::SeqCst);
        Ok::<_, Error>(())
    };

    let result = execute_with_timeout(slow, Duration::from_millis(5)).await;
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(!finished.load(Ordering::SeqCst));

    sleep(Duration::from_millis(100)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tandem::test]
async fn test_timeout_completes_before_deadline() {
    let result = timeout(Duration::from_millis(100), async {
        sleep(Duration::from_millis(10)).await;
        7
    })
    .await;

    assert_eq!(result.unwrap(), 7);
}

#[tandem::test]
async fn test_timeout_expires_and_drops_the_future() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = finished.clone();

    let result = timeout(Duration::from_millis(10), async move {
        sleep(Duration::from_millis(40)).await;
        flag.store(true, Ordering::SeqCst);
    })
    .await;

    assert!(matches!(result, Err(Error::Cancelled)));

    sleep(Duration::from_millis(80)).await;
    assert!(!finished.load(Ordering::SeqCst));
}

#[tandem::test]
async fn test_timeout_bounds_a_spawned_task() {
    let handle = tandem::task::spawn(async {
        sleep(Duration::from_millis(100)).await;
        456
    });

    let result = timeout(Duration::from_millis(20), handle).await;
    assert!(result.is_err());
}
