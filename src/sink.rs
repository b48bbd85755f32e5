use std::fmt;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use crate::capability::Capability;
use crate::record::{Level, LogRecord};

/// Error returned when a sink cannot accept a record.
///
/// Sink errors never reach the instrumented call's caller; the
/// [`CapabilityLogger`](crate::CapabilityLogger) reports them through
/// `tracing` and carries on.
///
/// # Examples
///
/// ```
/// use service_instrument::{SinkError, SinkErrorKind};
///
/// let error = SinkError::with_message(SinkErrorKind::Io, "broken pipe");
/// assert_eq!(error.kind(), SinkErrorKind::Io);
/// assert_eq!(error.to_string(), "sink error (I/O error): broken pipe");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError {
    kind: SinkErrorKind,
    message: Option<String>,
}

impl SinkError {
    /// Creates a new sink error with the specified kind.
    pub fn new(kind: SinkErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Creates a new sink error with a custom message.
    pub fn with_message(kind: SinkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> SinkErrorKind {
        self.kind
    }

    /// Returns the error message, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(msg) = &self.message {
            write!(f, "sink error ({}): {}", self.kind, msg)
        } else {
            write!(f, "sink error ({})", self.kind)
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        Self::with_message(SinkErrorKind::Io, err.to_string())
    }
}

/// Kind of sink error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    /// Writing to the underlying stream failed.
    Io,
    /// A writer panicked while holding the sink's lock.
    Poisoned,
}

impl fmt::Display for SinkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::Poisoned => write!(f, "sink poisoned"),
        }
    }
}

/// Destination for log records.
///
/// Sinks are shared by every concurrent call of every decorator bound to
/// them, so implementations must tolerate concurrent writers. No ordering
/// is guaranteed between records of different calls.
pub trait LogSink: Send + Sync {
    /// Accepts one record.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the record could not be written.
    fn record(&self, record: &LogRecord) -> Result<(), SinkError>;
}

impl Capability for dyn LogSink {
    const NAME: &'static str = "LogSink";
}

/// Emits records as structured `tracing` events.
///
/// Entry and exit records are emitted at `INFO`, failure records at
/// `ERROR`, all under the `service_instrument` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a tracing sink.
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn record(&self, record: &LogRecord) -> Result<(), SinkError> {
        match record.level() {
            Level::Info => tracing::info!(
                target: "service_instrument",
                capability = record.capability(),
                operation = record.operation(),
                phase = %record.phase(),
                payload = record.payload(),
                "{}",
                record.message()
            ),
            Level::Error => tracing::error!(
                target: "service_instrument",
                capability = record.capability(),
                operation = record.operation(),
                phase = %record.phase(),
                payload = record.payload(),
                failure = record.failure(),
                "{}",
                record.message()
            ),
        }
        Ok(())
    }
}

/// Collects records in memory, in arrival order.
///
/// Useful for tests and for inspecting what an instrumented service logged.
///
/// # Examples
///
/// ```
/// use service_instrument::{LogRecord, LogSink, MemorySink, Phase};
///
/// let sink = MemorySink::new();
/// sink.record(&LogRecord::new("ArticleService", "delete_article", Phase::Entry, "param1: 1"))
///     .unwrap();
///
/// assert_eq!(sink.len(), 1);
/// sink.with_records(|records| assert_eq!(records[0].operation(), "delete_article"));
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    /// Creates a new empty sink.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    // A panicking reader cannot leave the Vec half-written, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the number of records collected.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if no records have been collected.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Provides borrowed access to the records via callback.
    pub fn with_records<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[LogRecord]) -> R,
    {
        f(&self.lock())
    }

    /// Returns a snapshot of the collected records.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Removes and returns the collected records.
    pub fn drain(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.lock())
    }

    /// Discards all collected records.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Consumes the sink and returns the collected records.
    pub fn into_vec(self) -> Vec<LogRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn record(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.lock().push(record.clone());
        Ok(())
    }
}

/// Renders one line per record to a text stream.
///
/// # Examples
///
/// ```
/// use service_instrument::{LogRecord, LogSink, Phase, WriterSink};
///
/// let sink = WriterSink::new(Vec::new());
/// sink.record(&LogRecord::new("ArticleService", "delete_article", Phase::Exit, "true"))
///     .unwrap();
///
/// let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
/// assert!(text.ends_with("Exiting ArticleService.delete_article with result: true\n"));
/// ```
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink and returns the writer.
    ///
    /// # Errors
    ///
    /// Returns `SinkErrorKind::Poisoned` if a writer panicked mid-record.
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .map_err(|_| SinkError::new(SinkErrorKind::Poisoned))
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn record(&self, record: &LogRecord) -> Result<(), SinkError> {
        // A poisoned writer may hold a partial line; refuse to append to it.
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SinkError::new(SinkErrorKind::Poisoned))?;
        writeln!(writer, "{}", record)?;
        writer.flush()?;
        Ok(())
    }
}
