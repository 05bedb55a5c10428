mod common;

use common::init_test_logging;
use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tandem::Error;
use tandem::io::{Completer, CompletionSource, IoStatus, RequestId, TimedIo, pipe};
use tandem::time::{sleep, timeout};

const LONG: Duration = Duration::from_secs(60);

/// `EIO` on Linux.
const EIO: i32 = 5;

#[tandem::test]
async fn test_pipe_read_with_data_ready() {
    init_test_logging();

    let (reader, writer) = pipe().unwrap();
    File::from(writer).write_all(b"hello").unwrap();

    let io = TimedIo::new(reader);
    let outcome = io.submit(64, Duration::from_secs(1)).await.unwrap();

    assert_eq!(outcome.output, b"hello");
    assert_eq!(outcome.bytes, 5);
    assert!(!outcome.end_of_stream);
}

#[tandem::test]
async fn test_pipe_read_waits_for_data() {
    let (reader, writer) = pipe().unwrap();
    let io = TimedIo::new(reader);

    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let mut writer = File::from(writer);
        writer.write_all(b"late").unwrap();
        writer
    });

    let outcome = io.submit(64, Duration::from_secs(5)).await.unwrap();
    drop(writer.join().unwrap());

    assert_eq!(outcome.output, b"late");
}

#[tandem::test]
async fn test_pipe_read_times_out() {
    init_test_logging();

    let (reader, _writer) = pipe().unwrap();
    let io = TimedIo::new(reader);

    let start = Instant::now();
    let result = io.submit(64, Duration::from_millis(30)).await;

    assert!(matches!(result, Err(Error::Timeout)));
    assert!(result.unwrap_err().is_cancelled());
    assert!(start.elapsed() >= Duration::from_millis(30));

    // The reader is usable again once the timed-out read is gone.
    sleep(Duration::from_millis(20)).await;
    assert!(matches!(
        io.submit(64, Duration::from_millis(10)).await,
        Err(Error::Timeout)
    ));
}

#[tandem::test]
async fn test_pipe_end_of_stream() {
    let (reader, writer) = pipe().unwrap();
    drop(writer);

    let outcome = TimedIo::new(reader)
        .submit(64, Duration::from_secs(1))
        .await
        .unwrap();

    assert!(outcome.end_of_stream);
    assert_eq!(outcome.bytes, 0);
    assert!(outcome.output.is_empty());
}

/// A source that keeps every operation pending until told otherwise.
#[derive(Default)]
struct ManualSource {
    pending: Mutex<Vec<Completer<u32>>>,
    cancelled: Mutex<Vec<RequestId>>,

    /// When set, cancellation requests are recorded but not honoured.
    stubborn: bool,
}

impl ManualSource {
    fn finish_all(&self, status: IoStatus, output: u32) {
        let pending = std::mem::take(&mut *self.pending.lock().unwrap());

        for completer in pending {
            completer.complete(status, 4, output);
        }
    }
}

impl CompletionSource for ManualSource {
    type Operation = u32;
    type Output = u32;

    fn start(&self, _id: RequestId, _operation: u32, completer: Completer<u32>) -> io::Result<()> {
        self.pending.lock().unwrap().push(completer);
        Ok(())
    }

    fn cancel(&self, id: RequestId) {
        self.cancelled.lock().unwrap().push(id);

        if self.stubborn {
            return;
        }

        let completer = {
            let mut pending = self.pending.lock().unwrap();
            let position = pending.iter().position(|completer| completer.id() == id);
            position.map(|position| pending.remove(position))
        };

        if let Some(completer) = completer {
            completer.complete(IoStatus::Aborted, 0, 0);
        }
    }
}

/// A source whose behaviour is fixed by the operation itself.
struct ScriptedSource;

enum Script {
    Immediate(u32),
    RefuseToStart,
    Fail(i32),
    DropCompleter,
}

impl CompletionSource for ScriptedSource {
    type Operation = Script;
    type Output = u32;

    fn start(&self, _id: RequestId, script: Script, completer: Completer<u32>) -> io::Result<()> {
        match script {
            Script::Immediate(value) => completer.complete(IoStatus::Success, 4, value),
            Script::RefuseToStart => return Err(io::Error::other("device busy")),
            Script::Fail(code) => completer.complete(IoStatus::Failed(code), 0, 0),
            Script::DropCompleter => drop(completer),
        }

        Ok(())
    }

    fn cancel(&self, _id: RequestId) {}
}

#[tandem::test]
async fn test_synchronous_completion() {
    let io = TimedIo::new(ScriptedSource);
    let outcome = io.submit(Script::Immediate(9), LONG).await.unwrap();

    assert_eq!(outcome.output, 9);
    assert_eq!(outcome.bytes, 4);
}

#[tandem::test]
async fn test_start_error_is_returned() {
    let io = TimedIo::new(ScriptedSource);
    let err = io.submit(Script::RefuseToStart, LONG).await.unwrap_err();

    assert!(matches!(err, Error::Operation(_)));
    assert_eq!(err.to_string(), "operation failed: device busy");
}

#[tandem::test]
async fn test_failed_status_carries_os_error() {
    let io = TimedIo::new(ScriptedSource);
    let err = io.submit(Script::Fail(EIO), LONG).await.unwrap_err();

    let Error::Operation(cause) = err else {
        panic!("expected an operation failure");
    };
    let cause = cause.downcast_ref::<io::Error>().unwrap();
    assert_eq!(cause.raw_os_error(), Some(EIO));
}

#[tandem::test]
async fn test_dropped_completer_reports_cancelled() {
    init_test_logging();

    let io = TimedIo::new(ScriptedSource);
    assert!(matches!(
        io.submit(Script::DropCompleter, LONG).await,
        Err(Error::Cancelled)
    ));
}

#[tandem::test]
async fn test_deadline_aborts_through_the_source() {
    let source = Arc::new(ManualSource::default());
    let io = TimedIo::from_arc(source.clone());

    let request = io.submit(1, Duration::from_millis(20));
    let id = request.id();

    assert!(matches!(request.await, Err(Error::Timeout)));
    assert_eq!(*source.cancelled.lock().unwrap(), vec![id]);
}

#[tandem::test]
async fn test_completion_before_deadline_disarms_it() {
    let source = Arc::new(ManualSource::default());
    let io = TimedIo::from_arc(source.clone());

    let completer = {
        let source = source.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            source.finish_all(IoStatus::Success, 77);
        })
    };

    let outcome = io.submit(1, Duration::from_millis(200)).await.unwrap();
    completer.join().unwrap();
    assert_eq!(outcome.output, 77);

    sleep(Duration::from_millis(300)).await;
    assert!(source.cancelled.lock().unwrap().is_empty());
}

#[tandem::test]
async fn test_success_after_deadline_still_wins() {
    let source = Arc::new(ManualSource {
        stubborn: true,
        ..Default::default()
    });
    let io = TimedIo::from_arc(source.clone());

    let finisher = {
        let source = source.clone();
        thread::spawn(move || {
            while source.cancelled.lock().unwrap().is_empty() {
                thread::sleep(Duration::from_millis(1));
            }
            source.finish_all(IoStatus::Success, 5);
        })
    };

    let outcome = io.submit(1, Duration::from_millis(10)).await.unwrap();
    finisher.join().unwrap();

    assert_eq!(outcome.output, 5);
}

#[tandem::test]
async fn test_dropping_a_request_in_flight_cancels_it() {
    let source = Arc::new(ManualSource::default());
    let io = TimedIo::from_arc(source.clone());

    let request = io.submit(1, LONG);
    let id = request.id();

    assert!(timeout(Duration::from_millis(10), request).await.is_err());
    assert_eq!(*source.cancelled.lock().unwrap(), vec![id]);
    assert!(source.pending.lock().unwrap().is_empty());
}

#[tandem::test]
async fn test_request_ids_are_unique() {
    let io = TimedIo::new(ScriptedSource);
    let first = io.submit(Script::Immediate(1), LONG);
    let second = io.submit(Script::Immediate(2), LONG);

    assert_ne!(first.id(), second.id());
}
