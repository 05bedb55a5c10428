mod common;

use common::{CountingWaker, after, fail_after, init_test_logging};
use proptest::prelude::*;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread;
use tandem::Error;
use tandem::combinator::{FanIn, boxed, when_all};

#[tandem::test]
async fn test_when_all_keeps_input_order() {
    init_test_logging();

    let values = when_all(vec![after(30, 'a'), after(10, 'b'), after(20, 'c')])
        .unwrap()
        .await
        .unwrap();

    assert_eq!(values, vec!['a', 'b', 'c']);
}

#[tandem::test]
async fn test_when_all_macro_heterogeneous_tuple() {
    init_test_logging();

    let (name, age, flag) = tandem::when_all!(after(20, "ferris"), after(5, 8u32), after(10, true))
        .await
        .unwrap();

    assert_eq!(name, "ferris");
    assert_eq!(age, 8);
    assert!(flag);
}

#[tandem::test]
async fn test_when_all_macro_single_awaitable() {
    let (value,) = tandem::when_all!(after(1, 42)).await.unwrap();
    assert_eq!(value, 42);
}

#[tandem::test]
async fn test_when_all_unit_values() {
    let (first, second) = tandem::when_all!(after(5, ()), after(1, ())).await.unwrap();
    assert_eq!((first, second), ((), ()));
}

/// Flags whose union is computed asynchronously.
#[derive(Clone, Copy)]
struct Flags(u8);

impl std::ops::BitOr for Flags {
    type Output = Pin<Box<dyn Future<Output = tandem::Result<u8>> + Send>>;

    fn bitor(self, rhs: Self) -> Self::Output {
        Box::pin(after(1, self.0 | rhs.0))
    }
}

#[tandem::test]
async fn test_when_all_macro_operator_and_closure_arguments() {
    let scale = 2u8;

    let (union, scaled, fallback) = tandem::when_all!(
        Flags(1) | Flags(2),
        (move |x: u8, y: u8| after(1, x * y * scale))(2, 3),
        async move { Ok::<u8, Error>(Flags(4).0 | Flags(8).0) }
    )
    .await
    .unwrap();

    assert_eq!(union, 3);
    assert_eq!(scaled, 12);
    assert_eq!(fallback, 12);
}

#[tandem::test]
async fn test_when_all_first_failure_wins() {
    init_test_logging();

    let result = when_all(vec![
        boxed(fail_after::<u32>(40, "second")),
        boxed(after(5, 1)),
        boxed(fail_after::<u32>(10, "first")),
    ])
    .unwrap()
    .await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::Operation(_)));
    assert_eq!(err.to_string(), "operation failed: first");
}

#[tandem::test]
async fn test_when_all_reports_panics() {
    let result = tandem::when_all!(after(1, 1), async {
        if true {
            panic!("boom");
        }
        Ok(2)
    })
    .await;

    match result {
        Err(Error::Panicked(message)) => assert_eq!(message, "boom"),
        other => panic!("expected a panic report, got {other:?}"),
    }
}

#[test]
fn test_when_all_rejects_empty_input() {
    let result = when_all(Vec::<tandem::combinator::BoxAwaitable<u8>>::new());
    assert!(matches!(result, Err(Error::Construction(_))));
}

#[test]
fn test_fan_in_rejects_zero_count() {
    assert!(matches!(FanIn::new(0), Err(Error::Construction(_))));
}

#[test]
fn test_fan_in_awaited_before_every_producer_issued() {
    let mut fan_in = FanIn::new(2).unwrap();
    let (_producer, _slot) = fan_in.producer::<u8>();

    let (_, waker) = CountingWaker::new();
    let mut cx = Context::from_waker(&waker);

    assert!(matches!(
        Pin::new(&mut fan_in).poll(&mut cx),
        Poll::Ready(Err(Error::Construction(_)))
    ));
}

#[test]
#[should_panic(expected = "fan-in sized for 1 producers")]
fn test_fan_in_issuing_too_many_producers_panics() {
    let mut fan_in = FanIn::new(1).unwrap();
    let _first = fan_in.producer::<u8>();
    let _second = fan_in.producer::<u8>();
}

#[test]
fn test_fan_in_dropped_producer_cancels() {
    init_test_logging();

    let mut fan_in = FanIn::new(2).unwrap();
    let (first, _first_slot) = fan_in.producer::<u8>();
    let (second, _second_slot) = fan_in.producer::<u8>();

    first.succeed(1);
    drop(second);

    let (_, waker) = CountingWaker::new();
    let mut cx = Context::from_waker(&waker);

    assert!(matches!(
        Pin::new(&mut fan_in).poll(&mut cx),
        Poll::Ready(Err(Error::Cancelled))
    ));
}

#[test]
fn test_fan_in_wakes_consumer_once_from_many_threads() {
    init_test_logging();

    const PRODUCERS: usize = 16;

    let mut fan_in = FanIn::new(PRODUCERS).unwrap();
    let (producers, slots): (Vec<_>, Vec<_>) = (0..PRODUCERS).map(|_| fan_in.producer()).unzip();

    let (counter, waker) = CountingWaker::new();
    let mut cx = Context::from_waker(&waker);

    assert!(Pin::new(&mut fan_in).poll(&mut cx).is_pending());

    let threads: Vec<_> = producers
        .into_iter()
        .map(|producer| {
            thread::spawn(move || {
                let value = producer.index() * 10;
                producer.succeed(value);
            })
        })
        .collect();

    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(counter.wakes(), 1);

    let Poll::Ready(Ok(done)) = Pin::new(&mut fan_in).poll(&mut cx) else {
        panic!("fan-in should be complete");
    };

    let values: Vec<usize> = slots.into_iter().map(|slot| slot.take(&done)).collect();
    assert_eq!(values, (0..PRODUCERS).map(|i| i * 10).collect::<Vec<_>>());
}

#[test]
#[should_panic(expected = "completion token of another fan-in")]
fn test_slot_rejects_foreign_completion_token() {
    let mut ours = FanIn::new(1).unwrap();
    let (producer, slot) = ours.producer::<u8>();
    producer.succeed(1);

    let mut theirs = FanIn::new(1).unwrap();
    let (other, _other_slot) = theirs.producer::<u8>();
    other.succeed(2);

    let (_, waker) = CountingWaker::new();
    let mut cx = Context::from_waker(&waker);

    let Poll::Ready(Ok(foreign)) = Pin::new(&mut theirs).poll(&mut cx) else {
        panic!("fan-in should be complete");
    };

    slot.take(&foreign);
}

proptest! {
    #[test]
    fn prop_fan_in_is_positional_in_any_completion_order(
        order in Just((0..8usize).collect::<Vec<_>>()).prop_shuffle(),
        failing in proptest::option::of(0..8usize),
    ) {
        let mut fan_in = FanIn::new(order.len()).unwrap();
        let (mut producers, slots): (Vec<_>, Vec<_>) =
            (0..order.len()).map(|_| fan_in.producer::<usize>()).map(|(p, s)| (Some(p), s)).unzip();

        let (counter, waker) = CountingWaker::new();
        let mut cx = Context::from_waker(&waker);
        prop_assert!(Pin::new(&mut fan_in).poll(&mut cx).is_pending());

        for &index in &order {
            let producer = producers[index].take().unwrap();

            if failing == Some(index) {
                producer.fail(Error::Construction("injected"));
            } else {
                producer.succeed(index + 100);
            }
        }

        prop_assert_eq!(counter.wakes(), 1);

        match (Pin::new(&mut fan_in).poll(&mut cx), failing) {
            (Poll::Ready(Ok(done)), None) => {
                let values: Vec<usize> = slots.into_iter().map(|slot| slot.take(&done)).collect();
                prop_assert_eq!(values, (100..108).collect::<Vec<_>>());
            }
            (Poll::Ready(Err(Error::Construction("injected"))), Some(_)) => {}
            (other, _) => prop_assert!(false, "unexpected poll result: {:?}", other.map(|r| r.is_ok())),
        }
    }
}
