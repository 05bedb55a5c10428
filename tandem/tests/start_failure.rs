use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tandem::Error;
use tandem::io::{Completer, CompletionSource, RequestId, TimedIo};
use tracing_subscriber::filter::LevelFilter;

/// Collects every formatted log line.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn install() -> Self {
        let logs = Self::default();
        let writer = logs.clone();

        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(LevelFilter::WARN)
            .with_writer(move || writer.clone())
            .try_init()
            .unwrap();

        logs
    }

    fn contains(&self, needle: &str) -> bool {
        String::from_utf8_lossy(&self.0.lock().unwrap()).contains(needle)
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Refuses every operation, or drops the completer and claims success.
struct Refusing;

impl CompletionSource for Refusing {
    type Operation = bool;
    type Output = ();

    fn start(&self, _id: RequestId, refuse: bool, completer: Completer<()>) -> io::Result<()> {
        drop(completer);

        if refuse {
            Err(io::Error::other("no such device"))
        } else {
            Ok(())
        }
    }

    fn cancel(&self, _id: RequestId) {}
}

#[tandem::test]
async fn test_failed_start_is_not_reported_as_abort() {
    let logs = CapturedLogs::install();
    let io = TimedIo::new(Refusing);

    let err = io.submit(true, Duration::from_secs(60)).await.unwrap_err();
    assert_eq!(err.to_string(), "operation failed: no such device");
    assert!(!logs.contains("completer dropped"));

    let err = io.submit(false, Duration::from_secs(60)).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert!(logs.contains("completer dropped"));
}
