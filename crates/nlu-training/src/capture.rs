//! Per-job capture of log output.
//!
//! `LogCapture` hands out a `TranscriptLayer` that is installed once in the
//! process subscriber, and opens `CaptureScope`s, one per job. Each scope
//! owns a span; every event emitted while that span (or a child of it) is
//! current is appended to the scope's transcript. Events outside the span
//! never reach it, so concurrent jobs in one process keep separate
//! transcripts.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Span, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Name of the span that marks a capture scope.
pub const CAPTURE_SPAN: &str = "nlu_capture";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The ordered log lines captured during one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingLog {
    lines: Vec<String>,
}

impl TrainingLog {
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines joined with `\n`, as reported to the backend.
    #[must_use]
    pub fn transcript(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for TrainingLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.transcript())
    }
}

#[derive(Debug, Default)]
struct BufferState {
    lines: Vec<String>,
    closed: bool,
}

#[derive(Debug, Default)]
struct TranscriptBuffer {
    state: Mutex<BufferState>,
}

impl TranscriptBuffer {
    fn append(&self, line: String) {
        let mut state = lock(&self.state);
        if !state.closed {
            state.lines.push(line);
        }
    }

    /// Stops accepting lines and hands back what was captured.
    fn close(&self) -> Vec<String> {
        let mut state = lock(&self.state);
        state.closed = true;
        std::mem::take(&mut state.lines)
    }
}

type Registry = Arc<Mutex<HashMap<u64, Arc<TranscriptBuffer>>>>;

/// Factory for capture scopes and the layer that feeds them.
#[derive(Debug, Clone)]
pub struct LogCapture {
    registry: Registry,
    next_id: Arc<AtomicU64>,
    max_level: Level,
}

impl Default for LogCapture {
    fn default() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl LogCapture {
    /// Creates a capture that keeps events at `max_level` or more severe.
    #[must_use]
    pub fn new(max_level: Level) -> Self {
        Self { registry: Arc::default(), next_id: Arc::new(AtomicU64::new(1)), max_level }
    }

    /// The layer to install in the process subscriber.
    #[must_use]
    pub fn layer(&self) -> TranscriptLayer {
        TranscriptLayer { registry: Arc::clone(&self.registry), max_level: self.max_level }
    }

    /// Opens a scope for `job_id`. Work must run inside `scope.span()` to be captured.
    #[must_use]
    pub fn open(&self, job_id: &str) -> CaptureScope {
        let capture_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let buffer = Arc::new(TranscriptBuffer::default());
        lock(&self.registry).insert(capture_id, Arc::clone(&buffer));

        let span = tracing::info_span!("nlu_capture", capture_id, job_id = %job_id);
        CaptureScope { capture_id, span, buffer, registry: Arc::clone(&self.registry) }
    }

    /// Number of scopes that are open right now.
    #[must_use]
    pub fn open_scopes(&self) -> usize {
        lock(&self.registry).len()
    }
}

/// An open capture for one job.
///
/// `finish` closes the scope and returns the transcript. Dropping an
/// unfinished scope closes it too; lines emitted afterwards are discarded.
#[derive(Debug)]
pub struct CaptureScope {
    capture_id: u64,
    span: Span,
    buffer: Arc<TranscriptBuffer>,
    registry: Registry,
}

impl CaptureScope {
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn in_scope<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.span.in_scope(f)
    }

    #[must_use]
    pub fn finish(self) -> TrainingLog {
        self.close()
    }

    fn close(&self) -> TrainingLog {
        lock(&self.registry).remove(&self.capture_id);
        TrainingLog { lines: self.buffer.close() }
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Layer that routes events to the transcript of the enclosing capture span.
#[derive(Debug, Clone)]
pub struct TranscriptLayer {
    registry: Registry,
    max_level: Level,
}

impl<S> Layer<S> for TranscriptLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if attrs.metadata().name() != CAPTURE_SPAN {
            return;
        }
        let mut visitor = CaptureIdVisitor::default();
        attrs.record(&mut visitor);
        let Some(capture_id) = visitor.0 else {
            return;
        };
        let Some(buffer) = lock(&self.registry).get(&capture_id).cloned() else {
            return;
        };
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(buffer);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level {
            return;
        }
        let Some(scope) = ctx.event_scope(event) else {
            return;
        };
        for span in scope {
            let extensions = span.extensions();
            if let Some(buffer) = extensions.get::<Arc<TranscriptBuffer>>() {
                buffer.append(format_event(event));
                return;
            }
        }
    }
}

#[derive(Default)]
struct CaptureIdVisitor(Option<u64>);

impl Visit for CaptureIdVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "capture_id" {
            self.0 = Some(value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "capture_id" {
            self.0 = u64::try_from(value).ok();
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// `LEVEL target: message key=value ...`
fn format_event(event: &Event<'_>) -> String {
    let mut visitor = LineVisitor::default();
    event.record(&mut visitor);

    let metadata = event.metadata();
    let mut line = format!("{} {}: {}", metadata.level(), metadata.target(), visitor.message);
    for field in visitor.fields {
        line.push(' ');
        line.push_str(&field);
    }
    line
}
