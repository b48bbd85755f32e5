//! The generic instrumentation base shared by every logging decorator.
//!
//! [`Instrumentation`] holds the wrapped implementation and a logger bound
//! to its capability, and exposes three observation hooks:
//! [`record_entry`](Instrumentation::record_entry),
//! [`record_exit`](Instrumentation::record_exit) and
//! [`record_failure`](Instrumentation::record_failure). The hooks make no
//! control-flow decisions. [`observe`](Instrumentation::observe) combines
//! them into the bracketing every decorator method follows:
//!
//! ```text
//! record_entry(op, args)
//! result = (|| inner.op(args))().await
//! Ok  => record_exit(op, result), return result
//! Err => record_failure(op, err, args), return err unchanged
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use crate::capability::Capability;
use crate::logging::CapabilityLogger;
use crate::record::Phase;
use crate::serializer::{LogArg, RedactingSerializer};

/// Wrapped implementation plus the means to log calls made to it.
///
/// Holds no per-call state, so one instance serves any number of
/// concurrent calls without locking.
pub struct Instrumentation<S: ?Sized> {
    inner: Arc<S>,
    logger: CapabilityLogger,
    serializer: RedactingSerializer,
}

impl<S: ?Sized + Capability> Instrumentation<S> {
    /// Wraps `inner`, logging through `logger`.
    ///
    /// Records are always stamped with `S::NAME`, whatever capability
    /// `logger` was bound to.
    pub fn new(inner: Arc<S>, logger: CapabilityLogger) -> Self {
        Self {
            inner,
            logger: logger.with_capability(S::NAME),
            serializer: RedactingSerializer::default(),
        }
    }

    /// Replaces the default serializer.
    pub fn with_serializer(mut self, serializer: RedactingSerializer) -> Self {
        self.serializer = serializer;
        self
    }

    /// Returns the wrapped implementation.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the logger bound to this capability.
    pub fn logger(&self) -> &CapabilityLogger {
        &self.logger
    }

    /// Returns the serializer used for payloads.
    pub fn serializer(&self) -> &RedactingSerializer {
        &self.serializer
    }

    /// Records an informational entry with positionally labelled parameters.
    pub fn record_entry(&self, operation: &'static str, params: &[LogArg<'_>]) {
        let payload = self.serializer.serialize_params(params);
        self.logger.emit(operation, Phase::Entry, payload, None);
    }

    /// Records an informational exit with the serialized result.
    pub fn record_exit(&self, operation: &'static str, result: &LogArg<'_>) {
        let payload = self.serializer.serialize(result);
        self.logger.emit(operation, Phase::Exit, payload, None);
    }

    /// Records an error-level failure with the parameters and failure detail.
    pub fn record_failure(
        &self,
        operation: &'static str,
        failure: &dyn fmt::Display,
        params: &[LogArg<'_>],
    ) {
        let payload = self.serializer.serialize_params(params);
        self.logger
            .emit(operation, Phase::Failure, payload, Some(failure.to_string()));
    }

    /// Brackets one wrapped call with entry and exit/failure records.
    ///
    /// `call` is invoked only after the entry record is written, so work an
    /// implementation does while building its future is logged after entry.
    /// The future's output is returned unchanged.
    pub async fn observe<T, E, C, Fut>(
        &self,
        operation: &'static str,
        params: &[LogArg<'_>],
        call: C,
    ) -> Result<T, E>
    where
        C: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + fmt::Debug + Sync,
        E: fmt::Display,
    {
        self.record_entry(operation, params);
        match call().await {
            Ok(value) => {
                self.record_exit(operation, &LogArg::new(&value));
                Ok(value)
            }
            Err(err) => {
                self.record_failure(operation, &err, params);
                Err(err)
            }
        }
    }
}

impl<S: ?Sized + Capability> fmt::Debug for Instrumentation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("capability", &S::NAME)
            .field("serializer", &self.serializer)
            .finish_non_exhaustive()
    }
}
