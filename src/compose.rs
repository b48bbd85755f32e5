//! The composition rewriter.
//!
//! [`decorate`] splices a decorator between every consumer of a capability
//! and the implementation registered for it. It runs once per capability
//! during startup; consumers keep resolving the capability as before and
//! transparently receive the decorator.

use std::sync::Arc;

use crate::capability::Capability;
use crate::error::CompositionError;
use crate::logging::CapabilityLogger;
use crate::registry::{InternalBinding, Registration, ServiceCollection, ServiceKey};
use crate::sink::LogSink;

/// Wraps the registered implementation of `S` with the decorator built by
/// `factory`.
///
/// The existing public registration is moved to an internal key (same
/// lifetime, same factory). A new public registration with the same
/// lifetime resolves that internal implementation and the registered
/// [`LogSink`], and hands them to `factory`.
///
/// Decorating is not idempotent: a second call for the same capability
/// wraps the decorator again.
///
/// # Errors
///
/// Returns [`CompositionError::NotRegistered`] if `S` has no public
/// registration. This is a startup misconfiguration; the caller should
/// abort rather than serve requests.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use service_instrument::{
///     compose, Capability, CapabilityLogger, MemorySink, ServiceCollection,
/// };
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// impl Capability for dyn Greeter {
///     const NAME: &'static str = "Greeter";
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".to_string()
///     }
/// }
///
/// struct Shouting(Arc<dyn Greeter>, CapabilityLogger);
///
/// impl Greeter for Shouting {
///     fn greet(&self) -> String {
///         self.0.greet().to_uppercase()
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_log_sink(Arc::new(MemorySink::new()));
///
/// // Nothing registered yet: fatal at startup.
/// assert!(compose::decorate::<dyn Greeter, _>(&mut services, |inner, log| {
///     Arc::new(Shouting(inner, log))
/// })
/// .is_err());
///
/// services.add_scoped::<dyn Greeter, _>(|_| Ok(Arc::new(English)));
/// compose::decorate::<dyn Greeter, _>(&mut services, |inner, log| {
///     Arc::new(Shouting(inner, log))
/// })
/// .expect("Greeter is registered");
///
/// let provider = services.build().expect("valid composition");
/// assert_eq!(provider.resolve::<dyn Greeter>().unwrap().greet(), "HELLO");
/// ```
pub fn decorate<S, F>(services: &mut ServiceCollection, factory: F) -> Result<(), CompositionError>
where
    S: ?Sized + Capability,
    F: Fn(Arc<S>, CapabilityLogger) -> Arc<S> + Send + Sync + 'static,
{
    let public = ServiceKey::of::<S>();
    let original = services
        .take(&public)
        .ok_or(CompositionError::NotRegistered { capability: S::NAME })?;
    let lifetime = original.lifetime();

    let layer = services.next_internal_layer::<S>();
    let binding = InternalBinding::<S>::new(layer);
    let dependencies = vec![binding.key(), ServiceKey::of::<dyn LogSink>()];
    services.insert(original.rekey(binding.key()));

    let decorator = Registration::new::<S, _>(public, lifetime, move |scope| {
        let inner = scope.resolve_internal(&binding)?;
        let sink = scope.resolve::<dyn LogSink>()?;
        Ok(factory(inner, CapabilityLogger::new(S::NAME, sink)))
    })
    .with_dependencies(dependencies);
    services.insert(decorator);

    tracing::debug!(capability = S::NAME, layer, ?lifetime, "decorated capability");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::record::Phase;
    use crate::registry::{Lifetime, Visibility};
    use crate::sink::MemorySink;

    trait Echo: Send + Sync {
        fn echo(&self, text: &str) -> String;
    }

    impl Capability for dyn Echo {
        const NAME: &'static str = "Echo";
    }

    struct Plain;

    impl Echo for Plain {
        fn echo(&self, text: &str) -> String {
            text.to_string()
        }
    }

    struct Bracketed {
        inner: Arc<dyn Echo>,
        logger: CapabilityLogger,
    }

    impl Echo for Bracketed {
        fn echo(&self, text: &str) -> String {
            self.logger
                .emit("echo", Phase::Entry, text.to_string(), None);
            format!("[{}]", self.inner.echo(text))
        }
    }

    fn bracketed(inner: Arc<dyn Echo>, logger: CapabilityLogger) -> Arc<dyn Echo> {
        Arc::new(Bracketed { inner, logger })
    }

    fn services(lifetime: Lifetime) -> (ServiceCollection, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let mut services = ServiceCollection::new();
        services
            .add::<dyn Echo, _>(lifetime, |_| Ok(Arc::new(Plain)))
            .add_log_sink(sink.clone());
        (services, sink)
    }

    #[test]
    fn decorate_requires_registration() {
        let mut services = ServiceCollection::new();
        let err = decorate::<dyn Echo, _>(&mut services, bracketed).unwrap_err();
        assert_eq!(err, CompositionError::NotRegistered { capability: "Echo" });
        assert!(services.is_empty());
    }

    #[test]
    fn decorate_rewrites_registry() {
        let (mut services, _) = services(Lifetime::Scoped);
        decorate::<dyn Echo, _>(&mut services, bracketed).unwrap();

        let echo_keys: Vec<_> = services
            .registrations()
            .iter()
            .filter(|r| r.key().name() == "Echo")
            .map(|r| (r.key().visibility(), r.lifetime()))
            .collect();

        assert_eq!(
            echo_keys,
            [
                (Visibility::Internal { layer: 1 }, Lifetime::Scoped),
                (Visibility::Public, Lifetime::Scoped),
            ]
        );
    }

    #[test]
    fn consumers_receive_the_decorator() {
        let (mut services, sink) = services(Lifetime::Transient);
        decorate::<dyn Echo, _>(&mut services, bracketed).unwrap();
        let provider = services.build().unwrap();

        let echo = provider.resolve::<dyn Echo>().unwrap();
        assert_eq!(echo.echo("hi"), "[hi]");
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].capability(), "Echo");
    }

    #[test]
    fn decorating_twice_double_wraps() {
        let (mut services, sink) = services(Lifetime::Singleton);
        decorate::<dyn Echo, _>(&mut services, bracketed).unwrap();
        decorate::<dyn Echo, _>(&mut services, bracketed).unwrap();
        let provider = services.build().unwrap();

        assert_eq!(provider.resolve::<dyn Echo>().unwrap().echo("hi"), "[[hi]]");
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn decorator_factory_runs_once_per_resolution() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);

        let (mut services, _) = services(Lifetime::Scoped);
        services
            .decorate::<dyn Echo, _>(move |inner, logger| {
                counter.fetch_add(1, Ordering::SeqCst);
                bracketed(inner, logger)
            })
            .unwrap();
        let provider = services.build().unwrap();

        let scope = provider.create_scope();
        let a = scope.resolve::<dyn Echo>().unwrap();
        let b = scope.resolve::<dyn Echo>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        provider.create_scope().resolve::<dyn Echo>().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_sink_fails_build() {
        let mut services = ServiceCollection::new();
        services.add_scoped::<dyn Echo, _>(|_| Ok(Arc::new(Plain)));
        decorate::<dyn Echo, _>(&mut services, bracketed).unwrap();

        let err = services.build().unwrap_err();
        assert_eq!(
            err,
            CompositionError::MissingDependency {
                dependent: "Echo".to_string(),
                dependency: "LogSink".to_string(),
            }
        );
    }

    #[test]
    fn internal_registration_is_not_publicly_resolvable() {
        let (mut services, _) = services(Lifetime::Scoped);
        decorate::<dyn Echo, _>(&mut services, bracketed).unwrap();

        let internal: Vec<ServiceKey> = services
            .registrations()
            .iter()
            .map(Registration::key)
            .filter(ServiceKey::is_internal)
            .collect();
        assert_eq!(internal.len(), 1);
        assert_ne!(internal[0], ServiceKey::of::<dyn Echo>());

        // The only public path to Echo yields the decorator.
        let provider = services.build().unwrap();
        assert_eq!(provider.resolve::<dyn Echo>().unwrap().echo("x"), "[x]");
    }
}
