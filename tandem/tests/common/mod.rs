#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Wake, Waker};
use std::time::Duration;

use tandem::time::sleep;

static INIT_LOGGING: Once = Once::new();

/// Routes `tracing` output to the test harness. `RUST_LOG` picks the level.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    });
}

/// A waker that counts how many times it was woken.
#[derive(Default)]
pub struct CountingWaker {
    wakes: AtomicUsize,
}

impl CountingWaker {
    pub fn new() -> (Arc<Self>, Waker) {
        let counter = Arc::new(Self::default());
        let waker = Waker::from(counter.clone());
        (counter, waker)
    }

    pub fn wakes(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }
}

impl Wake for CountingWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Succeeds with `value` after `ms` milliseconds.
pub async fn after<T>(ms: u64, value: T) -> tandem::Result<T> {
    sleep(Duration::from_millis(ms)).await;
    Ok(value)
}

/// Fails with `message` after `ms` milliseconds.
pub async fn fail_after<T>(ms: u64, message: &'static str) -> tandem::Result<T> {
    sleep(Duration::from_millis(ms)).await;
    Err(tandem::Error::operation(std::io::Error::other(message)))
}
