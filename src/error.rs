use thiserror::Error;

/// Errors raised while composing the service registry at startup.
///
/// These are misconfigurations: the process should refuse to start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositionError {
    /// A capability was decorated before any implementation was registered.
    #[error("service of type {capability} is not registered")]
    NotRegistered {
        /// Name of the capability that was missing.
        capability: &'static str,
    },
    /// A registration depends on a service that was never registered.
    #[error("{dependent} depends on {dependency}, which is not registered")]
    MissingDependency {
        /// The registration declaring the dependency.
        dependent: String,
        /// The missing dependency.
        dependency: String,
    },
}

/// Errors raised while resolving a service from a provider or scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Nothing is registered under the requested key.
    #[error("no service registered for {key}")]
    NotRegistered {
        /// Rendered service key.
        key: String,
    },
    /// The registered factory produced a value of the wrong type.
    #[error("service registered for {key} has an unexpected type")]
    TypeMismatch {
        /// Rendered service key.
        key: String,
    },
    /// A factory failed while constructing the service.
    #[error("failed to construct {key}: {reason}")]
    Factory {
        /// Rendered service key.
        key: String,
        /// Why construction failed.
        reason: String,
    },
}
