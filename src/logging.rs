use std::fmt;
use std::sync::Arc;

use crate::record::{LogRecord, Phase};
use crate::sink::LogSink;

/// A logging sink bound to one capability's name.
///
/// Every record emitted through a `CapabilityLogger` carries the capability
/// name it was created with. Sink failures are reported through `tracing`
/// and never propagate: logging must not change a call's outcome.
#[derive(Clone)]
pub struct CapabilityLogger {
    capability: &'static str,
    sink: Arc<dyn LogSink>,
}

impl CapabilityLogger {
    /// Binds `sink` to `capability`.
    pub fn new(capability: &'static str, sink: Arc<dyn LogSink>) -> Self {
        Self { capability, sink }
    }

    /// Re-binds the same sink to another capability.
    pub fn with_capability(mut self, capability: &'static str) -> Self {
        self.capability = capability;
        self
    }

    /// Returns the capability name stamped on every record.
    pub fn capability(&self) -> &'static str {
        self.capability
    }

    /// Builds and emits one record.
    pub fn emit(
        &self,
        operation: &'static str,
        phase: Phase,
        payload: String,
        failure: Option<String>,
    ) {
        let mut record = LogRecord::new(self.capability, operation, phase, payload);
        if let Some(detail) = failure {
            record = record.with_failure(detail);
        }
        self.write(&record);
    }

    /// Forwards an already built record to the sink.
    pub fn write(&self, record: &LogRecord) {
        if let Err(err) = self.sink.record(record) {
            tracing::warn!(
                capability = self.capability,
                operation = record.operation(),
                error = %err,
                "dropping log record"
            );
        }
    }
}

impl fmt::Debug for CapabilityLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityLogger")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{MemorySink, SinkError, SinkErrorKind};

    struct RejectingSink;

    impl LogSink for RejectingSink {
        fn record(&self, _record: &LogRecord) -> Result<(), SinkError> {
            Err(SinkError::new(SinkErrorKind::Io))
        }
    }

    #[test]
    fn stamps_capability_name() {
        let sink = Arc::new(MemorySink::new());
        let logger = CapabilityLogger::new("ArticleService", sink.clone());

        logger.emit("delete_article", Phase::Entry, "param1: 3".to_string(), None);
        logger.emit(
            "delete_article",
            Phase::Failure,
            "param1: 3".to_string(),
            Some("locked".to_string()),
        );

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.capability() == "ArticleService"));
        assert_eq!(records[1].failure(), Some("locked"));
        assert_eq!(logger.capability(), "ArticleService");
    }

    #[test]
    fn rebinding_keeps_the_sink() {
        let sink = Arc::new(MemorySink::new());
        let logger = CapabilityLogger::new("LogSink", sink.clone()).with_capability("ArticleService");

        logger.emit("get_articles", Phase::Entry, String::new(), None);

        assert_eq!(sink.records()[0].capability(), "ArticleService");
    }

    #[test]
    fn sink_errors_are_swallowed() {
        let logger = CapabilityLogger::new("ArticleService", Arc::new(RejectingSink));
        // Must not panic.
        logger.emit("get_articles", Phase::Entry, String::new(), None);
    }

    #[test]
    fn debug_omits_sink() {
        let logger = CapabilityLogger::new("ArticleService", Arc::new(MemorySink::new()));
        assert!(format!("{:?}", logger).contains("ArticleService"));
    }
}
