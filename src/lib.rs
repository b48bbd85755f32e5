//! Transparent logging for service capabilities.
//!
//! This crate wraps service implementations in decorators that log every
//! call without changing what the call does:
//! - **Redaction**: values whose type name marks them as credentials or
//!   tokens are logged as `[REDACTED]`, at any nesting depth
//! - **Bounded rendering**: logged values are serialized to a fixed depth,
//!   so cyclic or very large graphs cannot stall or crash a call
//! - **Composition**: a registry rewrite swaps each registered
//!   implementation for its logging decorator, invisibly to consumers
//!
//! # Core Types
//!
//! - [`RedactingSerializer`] and [`LogArg`]: turn arbitrary values into log text
//! - [`Secret<T>`]: forces redaction of a value regardless of its type
//! - [`Instrumentation<S>`]: entry, exit and failure hooks shared by decorators
//! - [`LogRecord`] and [`LogSink`]: what gets logged and where it goes
//! - [`ServiceCollection`]: the startup registry that decorators are composed into
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use service_instrument::articles::{self, ArticleService, InMemoryArticleService};
//! use service_instrument::{MemorySink, ServiceCollection};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let sink = Arc::new(MemorySink::new());
//!
//! let mut services = ServiceCollection::new();
//! services
//!     .add_log_sink(sink.clone())
//!     .add_singleton::<dyn ArticleService, _>(|_| {
//!         Ok(Arc::new(InMemoryArticleService::new()))
//!     });
//! articles::decorate_article_service(&mut services)?;
//!
//! let provider = services.build()?;
//! let service = provider.resolve::<dyn ArticleService>()?;
//!
//! assert!(service.get_article_by_id(999, "en").await.is_err());
//! assert_eq!(
//!     sink.records()[0].message(),
//!     "Entering ArticleService.get_article_by_id with parameters: param1: 999, param2: \"en\""
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod articles;
pub mod auth;
mod capability;
pub mod compose;
mod error;
mod instrument;
mod logging;
mod provider;
mod record;
mod registry;
mod secret;
mod sensitivity;
mod serializer;
mod sink;

pub use capability::Capability;
pub use error::{CompositionError, ResolveError};
pub use instrument::Instrumentation;
pub use logging::CapabilityLogger;
pub use provider::{Scope, ServiceProvider};
pub use record::{Level, LogRecord, Phase};
pub use registry::{Lifetime, Registration, ServiceCollection, ServiceKey, Visibility};
pub use secret::Secret;
pub use sensitivity::{
    is_sensitive_type, is_sensitive_type_name, short_type_name, REDACTED, SENSITIVE_MARKERS,
};
pub use serializer::{
    BoundError, LogArg, RedactingSerializer, DEFAULT_MAX_DEPTH, MAX_DEBUG_LEN, NULL, TRUNCATED,
};
pub use sink::{LogSink, MemorySink, SinkError, SinkErrorKind, TracingSink, WriterSink};
