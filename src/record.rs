//! Structured log records produced by instrumented calls.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Point in a call's life that a record observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Before the wrapped operation starts. Payload holds the parameters.
    Entry,
    /// After the wrapped operation returned. Payload holds the result.
    Exit,
    /// After the wrapped operation failed. Payload holds the parameters.
    Failure,
}

impl Phase {
    /// Severity of records in this phase.
    pub fn level(self) -> Level {
        match self {
            Phase::Entry | Phase::Exit => Level::Info,
            Phase::Failure => Level::Error,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Entry => write!(f, "entry"),
            Phase::Exit => write!(f, "exit"),
            Phase::Failure => write!(f, "failure"),
        }
    }
}

/// Record severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    /// Informational: entry and exit records.
    Info,
    /// Error: failure records.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => f.pad("INFO"),
            Level::Error => f.pad("ERROR"),
        }
    }
}

/// One immutable observation of a call's entry, exit, or failure.
///
/// The payload is already serialized and redacted; nothing in a record
/// refers back to the original arguments.
///
/// # Example
///
/// ```
/// use service_instrument::{LogRecord, Phase, Level};
///
/// let record = LogRecord::new("ArticleService", "delete_article", Phase::Entry, "param1: 7");
///
/// assert_eq!(record.level(), Level::Info);
/// assert_eq!(
///     record.message(),
///     "Entering ArticleService.delete_article with parameters: param1: 7"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    capability: &'static str,
    operation: &'static str,
    phase: Phase,
    payload: String,
    failure: Option<String>,
}

impl LogRecord {
    /// Creates a record timestamped now.
    pub fn new(
        capability: &'static str,
        operation: &'static str,
        phase: Phase,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            capability,
            operation,
            phase,
            payload: payload.into(),
            failure: None,
        }
    }

    /// Attaches a failure detail.
    pub fn with_failure(mut self, detail: impl Into<String>) -> Self {
        self.failure = Some(detail.into());
        self
    }

    /// Overrides the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Returns when the record was produced.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the instrumented capability's name.
    pub fn capability(&self) -> &'static str {
        self.capability
    }

    /// Returns the operation name.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Returns the call phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the record severity.
    pub fn level(&self) -> Level {
        self.phase.level()
    }

    /// Returns the serialized parameters (entry, failure) or result (exit).
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Returns the failure detail, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Renders the human-readable message, without timestamp or level.
    pub fn message(&self) -> String {
        let mut message = match self.phase {
            Phase::Entry => format!(
                "Entering {}.{} with parameters: {}",
                self.capability, self.operation, self.payload
            ),
            Phase::Exit => format!(
                "Exiting {}.{} with result: {}",
                self.capability, self.operation, self.payload
            ),
            Phase::Failure => format!(
                "Error in {}.{} with parameters: {}",
                self.capability, self.operation, self.payload
            ),
        };
        if let Some(failure) = &self.failure {
            message.push_str(": ");
            message.push_str(failure);
        }
        message
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:<5} {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level(),
            self.message()
        )
    }
}
