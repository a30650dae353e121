//! Output capture channel.
//!
//! [`Console`] is the ambient print primitive every runtime writes through.
//! Outside a run it forwards lines to the host sink. [`Console::capture`]
//! pushes an in-memory buffer and returns a [`CaptureScope`]; the scope
//! removes its buffer when finished or dropped, so restoration happens on
//! every exit path (error, panic, cancelled future) and scopes may end in
//! any order.
//!
//! Anything else writing to the same console while a capture is active is
//! captured too. Strategies capture a [`Console::fork`] so concurrent runs
//! never share a buffer.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Destination for console lines.
pub trait OutputSink: Send + Sync {
    fn write_line(&self, stream: Stream, line: &str);
}

/// Default host sink: console lines become tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSink;

impl OutputSink for HostSink {
    fn write_line(&self, stream: Stream, line: &str) {
        match stream {
            Stream::Stdout => tracing::info!(target: "playground::console", "{}", line),
            Stream::Stderr => tracing::warn!(target: "playground::console", "{}", line),
        }
    }
}

/// Lines captured during one execution. stdout and stderr stay separate until
/// the result is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl CapturedOutput {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

#[derive(Default)]
struct CaptureBuffer {
    lines: Mutex<CapturedOutput>,
}

impl CaptureBuffer {
    fn take(&self) -> CapturedOutput {
        std::mem::take(&mut *self.lines.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl OutputSink for CaptureBuffer {
    fn write_line(&self, stream: Stream, line: &str) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        match stream {
            Stream::Stdout => lines.stdout.push(line.to_string()),
            Stream::Stderr => lines.stderr.push(line.to_string()),
        }
    }
}

struct Routing {
    host: Arc<dyn OutputSink>,
    /// Active captures, innermost last. Each scope removes only its own entry.
    captures: Vec<(u64, Arc<dyn OutputSink>)>,
    next_id: u64,
}

impl Routing {
    fn current(&self) -> Arc<dyn OutputSink> {
        match self.captures.last() {
            Some((_, sink)) => sink.clone(),
            None => self.host.clone(),
        }
    }
}

/// Cloneable handle to a swappable output sink.
#[derive(Clone)]
pub struct Console {
    routing: Arc<Mutex<Routing>>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new(Arc::new(HostSink))
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

impl Console {
    pub fn new(host: Arc<dyn OutputSink>) -> Self {
        Self {
            routing: Arc::new(Mutex::new(Routing {
                host,
                captures: Vec::new(),
                next_id: 0,
            })),
        }
    }

    fn routing(&self) -> MutexGuard<'_, Routing> {
        self.routing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Arc<dyn OutputSink> {
        self.routing().current()
    }

    pub fn write(&self, stream: Stream, line: &str) {
        // Clone out of the lock so a sink may itself use the console.
        let sink = self.current();
        sink.write_line(stream, line);
    }

    pub fn log(&self, line: &str) {
        self.write(Stream::Stdout, line);
    }

    pub fn error(&self, line: &str) {
        self.write(Stream::Stderr, line);
    }

    /// A separate console for one run. It starts on the same host sink, but
    /// captures on it never affect this console or its other forks.
    pub fn fork(&self) -> Console {
        Console::new(self.routing().host.clone())
    }

    /// Redirect this console into a fresh buffer until the returned scope ends.
    pub fn capture(&self) -> CaptureScope {
        let buffer = Arc::new(CaptureBuffer::default());
        let id = {
            let mut routing = self.routing();
            let id = routing.next_id;
            routing.next_id += 1;
            routing.captures.push((id, buffer.clone() as Arc<dyn OutputSink>));
            id
        };
        CaptureScope {
            console: self.clone(),
            id: Some(id),
            buffer,
        }
    }

    /// Whether `sink` is the sink currently receiving lines.
    pub fn is_routed_to(&self, sink: &Arc<dyn OutputSink>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.current()), Arc::as_ptr(sink))
    }
}

/// Active capture. Detaches its buffer on `finish` or drop, in any order
/// relative to other scopes on the same console.
#[must_use = "dropping the scope ends the capture immediately"]
pub struct CaptureScope {
    console: Console,
    id: Option<u64>,
    buffer: Arc<CaptureBuffer>,
}

impl CaptureScope {
    /// End the capture and return what was written during it.
    pub fn finish(mut self) -> CapturedOutput {
        self.restore();
        self.buffer.take()
    }

    fn restore(&mut self) {
        if let Some(id) = self.id.take() {
            self.console.routing().captures.retain(|(entry, _)| *entry != id);
        }
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Run `block` with `console` captured.
pub fn with_captured_output<T>(console: &Console, block: impl FnOnce() -> T) -> (T, CapturedOutput) {
    let scope = console.capture();
    let value = block();
    (value, scope.finish())
}

/// Async form of [`with_captured_output`]; the capture spans every suspension
/// point of `future`.
pub async fn with_captured_output_async<F>(console: &Console, future: F) -> (F::Output, CapturedOutput)
where
    F: Future,
{
    let scope = console.capture();
    let value = future.await;
    (value, scope.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<(Stream, String)>>,
    }

    impl OutputSink for Recorder {
        fn write_line(&self, stream: Stream, line: &str) {
            self.lines.lock().unwrap().push((stream, line.to_string()));
        }
    }

    fn recording_console() -> (Console, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (Console::new(recorder.clone()), recorder)
    }

    #[test]
    fn test_capture_collects_lines_in_order() {
        let (console, recorder) = recording_console();
        let ((), output) = with_captured_output(&console, || {
            console.log("a");
            console.error("warn");
            console.log("b");
        });
        assert_eq!(output.stdout, vec!["a", "b"]);
        assert_eq!(output.stderr, vec!["warn"]);
        assert!(recorder.lines.lock().unwrap().is_empty());
    }

    #[test]
    fn test_host_sink_restored_after_capture() {
        let (console, recorder) = recording_console();
        let host: Arc<dyn OutputSink> = recorder.clone();
        let _ = with_captured_output(&console, || console.log("inside"));
        assert!(console.is_routed_to(&host));
        console.log("after");
        assert_eq!(
            *recorder.lines.lock().unwrap(),
            vec![(Stream::Stdout, "after".to_string())]
        );
    }

    #[test]
    fn test_restored_when_block_panics() {
        let (console, recorder) = recording_console();
        let host: Arc<dyn OutputSink> = recorder.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            with_captured_output(&console, || {
                console.log("before panic");
                panic!("boom");
            })
        }));
        assert!(result.is_err());
        assert!(console.is_routed_to(&host));
    }

    #[test]
    fn test_dropped_scope_restores() {
        let (console, recorder) = recording_console();
        let host: Arc<dyn OutputSink> = recorder.clone();
        {
            let _scope = console.capture();
            assert!(!console.is_routed_to(&host));
        }
        assert!(console.is_routed_to(&host));
    }

    #[test]
    fn test_nested_capture_restores_outer() {
        let (console, _recorder) = recording_console();
        let outer = console.capture();
        console.log("outer-1");
        let inner = console.capture();
        console.log("inner");
        assert_eq!(inner.finish().stdout, vec!["inner"]);
        console.log("outer-2");
        assert_eq!(outer.finish().stdout, vec!["outer-1", "outer-2"]);
    }

    #[test]
    fn test_scopes_ending_out_of_order_restore_host() {
        let (console, recorder) = recording_console();
        let host: Arc<dyn OutputSink> = recorder.clone();
        let first = console.capture();
        let second = console.capture();
        let first_output = first.finish();
        console.log("still second");
        let second_output = second.finish();

        assert!(first_output.is_empty());
        assert_eq!(second_output.stdout, vec!["still second"]);
        assert!(console.is_routed_to(&host));
    }

    #[tokio::test]
    async fn test_forked_captures_are_independent() {
        let (console, recorder) = recording_console();
        let host: Arc<dyn OutputSink> = recorder.clone();
        let (a, b) = (console.fork(), console.fork());

        let (left, right) = tokio::join!(
            with_captured_output_async(&a, async {
                a.log("from a");
                tokio::task::yield_now().await;
                a.log("a again");
            }),
            with_captured_output_async(&b, async {
                b.log("from b");
                tokio::task::yield_now().await;
            }),
        );

        assert_eq!(left.1.stdout, vec!["from a", "a again"]);
        assert_eq!(right.1.stdout, vec!["from b"]);
        assert!(console.is_routed_to(&host));
        a.log("late");
        assert_eq!(
            *recorder.lines.lock().unwrap(),
            vec![(Stream::Stdout, "late".to_string())]
        );
    }

    #[tokio::test]
    async fn test_async_capture_spans_suspension_points() {
        let (console, recorder) = recording_console();
        let inner = console.clone();
        let (value, output) = with_captured_output_async(&console, async move {
            inner.log("first");
            tokio::task::yield_now().await;
            inner.log("second");
            7
        })
        .await;
        assert_eq!(value, 7);
        assert_eq!(output.stdout, vec!["first", "second"]);
        assert!(recorder.lines.lock().unwrap().is_empty());
    }
}
