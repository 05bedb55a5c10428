mod common;

use common::CountingWaker;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;
use tandem::Error;
use tandem::sync::CompletionCell;

#[test]
fn test_value_available_before_wait() {
    let cell = CompletionCell::new();
    assert!(cell.complete(Ok(3)));
    assert!(cell.is_ready());

    let (counter, waker) = CountingWaker::new();
    let mut cx = Context::from_waker(&waker);

    assert!(matches!(cell.poll_take(&mut cx), Poll::Ready(Ok(3))));
    assert_eq!(counter.wakes(), 0);
}

#[test]
fn test_waiter_woken_once_on_completion() {
    let cell = Arc::new(CompletionCell::<String>::new());

    let (counter, waker) = CountingWaker::new();
    let mut cx = Context::from_waker(&waker);
    assert!(cell.poll_take(&mut cx).is_pending());
    assert!(cell.poll_take(&mut cx).is_pending());

    let producer = cell.clone();
    thread::spawn(move || producer.complete(Ok(String::from("done"))))
        .join()
        .unwrap();

    assert_eq!(counter.wakes(), 1);
    assert!(matches!(cell.poll_take(&mut cx), Poll::Ready(Ok(value)) if value == "done"));
}

#[test]
fn test_first_completion_wins() {
    let cell = Arc::new(CompletionCell::<usize>::new());

    let (counter, waker) = CountingWaker::new();
    let mut cx = Context::from_waker(&waker);
    assert!(cell.poll_take(&mut cx).is_pending());

    let accepted = (0..8)
        .map(|i| {
            let cell = cell.clone();
            thread::spawn(move || cell.complete(Ok(i)))
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|thread| thread.join().unwrap())
        .filter(|accepted| *accepted)
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(counter.wakes(), 1);
    assert!(matches!(cell.poll_take(&mut cx), Poll::Ready(Ok(_))));
}

#[test]
fn test_failure_is_stored() {
    let cell = CompletionCell::<()>::new();
    cell.complete(Err(Error::Cancelled));

    let (_, waker) = CountingWaker::new();
    let mut cx = Context::from_waker(&waker);
    assert!(matches!(cell.poll_take(&mut cx), Poll::Ready(Err(Error::Cancelled))));
}

#[test]
fn test_forgotten_waiter_is_not_woken() {
    let cell = CompletionCell::new();

    let (counter, waker) = CountingWaker::new();
    let mut cx = Context::from_waker(&waker);
    assert!(cell.poll_take(&mut cx).is_pending());

    cell.forget_waiter();
    cell.complete(Ok(1));

    assert_eq!(counter.wakes(), 0);
}

#[test]
#[should_panic(expected = "already taken")]
fn test_outcome_taken_twice_panics() {
    let cell = CompletionCell::new();
    cell.complete(Ok(1));

    let (_, waker) = CountingWaker::new();
    let mut cx = Context::from_waker(&waker);
    let _ = cell.poll_take(&mut cx);
    let _ = cell.poll_take(&mut cx);
}

#[tandem::test]
async fn test_wait_from_a_task() {
    let cell = Arc::new(CompletionCell::new());
    let producer = cell.clone();

    thread::spawn(move || producer.complete(Ok(7)));

    assert_eq!(cell.wait().await.unwrap(), 7);
}
