//! Startup-time service registrations.
//!
//! A [`ServiceCollection`] is plain, inspectable data: a list of
//! [`Registration`]s mapping a [`ServiceKey`] to a lifetime, a factory and
//! the keys that factory depends on. It is mutated only during startup
//! composition and then frozen into a [`ServiceProvider`] by
//! [`build`](ServiceCollection::build).

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::capability::Capability;
use crate::compose;
use crate::error::{CompositionError, ResolveError};
use crate::logging::CapabilityLogger;
use crate::provider::{Scope, ServiceProvider};
use crate::sink::LogSink;

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;
pub(crate) type Factory = Arc<dyn Fn(&Scope) -> Result<Instance, ResolveError> + Send + Sync>;

/// How long a resolved instance is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance for the whole process.
    Singleton,
    /// One instance per [`Scope`] (e.g. per request).
    Scoped,
    /// A new instance on every resolution.
    Transient,
}

/// Who may resolve a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Resolvable by any consumer.
    Public,
    /// An implementation hidden behind a decorator. Only the decorator
    /// installed on top of it can resolve it.
    Internal {
        /// Wrapping depth, starting at 1 for the first decorator.
        layer: u32,
    },
}

/// Identity of a registration: capability type plus visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    type_id: TypeId,
    name: &'static str,
    visibility: Visibility,
}

impl ServiceKey {
    /// The public key for capability `S`.
    pub fn of<S: ?Sized + Capability>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: S::NAME,
            visibility: Visibility::Public,
        }
    }

    fn internal<S: ?Sized + Capability>(layer: u32) -> Self {
        Self {
            visibility: Visibility::Internal { layer },
            ..Self::of::<S>()
        }
    }

    /// Returns the capability name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the key's visibility.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Returns `true` for keys hidden behind a decorator.
    pub fn is_internal(&self) -> bool {
        matches!(self.visibility, Visibility::Internal { .. })
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.visibility {
            Visibility::Public => write!(f, "{}", self.name),
            Visibility::Internal { layer } => write!(f, "{} (internal layer {})", self.name, layer),
        }
    }
}

/// Handle to an internal registration.
///
/// Only the composition rewriter can create one, which is what keeps
/// internal registrations out of reach of ordinary consumers.
pub(crate) struct InternalBinding<S: ?Sized> {
    key: ServiceKey,
    _service: PhantomData<fn() -> Box<S>>,
}

impl<S: ?Sized + Capability> InternalBinding<S> {
    pub(crate) fn new(layer: u32) -> Self {
        Self {
            key: ServiceKey::internal::<S>(layer),
            _service: PhantomData,
        }
    }

    pub(crate) fn key(&self) -> ServiceKey {
        self.key
    }
}

/// One entry of the registry.
#[derive(Clone)]
pub struct Registration {
    key: ServiceKey,
    lifetime: Lifetime,
    factory: Factory,
    dependencies: Vec<ServiceKey>,
}

impl Registration {
    pub(crate) fn new<S, F>(key: ServiceKey, lifetime: Lifetime, factory: F) -> Self
    where
        S: ?Sized + Capability,
        F: Fn(&Scope) -> Result<Arc<S>, ResolveError> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |scope| {
            let service = factory(scope)?;
            Ok(Arc::new(service) as Instance)
        });
        Self {
            key,
            lifetime,
            factory,
            dependencies: Vec::new(),
        }
    }

    pub(crate) fn with_dependencies(mut self, dependencies: Vec<ServiceKey>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Moves the registration under another key, keeping everything else.
    pub(crate) fn rekey(mut self, key: ServiceKey) -> Self {
        self.key = key;
        self
    }

    pub(crate) fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Returns the key this registration is resolvable under.
    pub fn key(&self) -> ServiceKey {
        self.key
    }

    /// Returns the instance lifetime.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Returns the keys the factory resolves, when declared.
    pub fn dependencies(&self) -> &[ServiceKey] {
        &self.dependencies
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Mutable registry used during startup composition.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use service_instrument::{Capability, ServiceCollection};
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
/// let mut services = ServiceCollection::new();
/// services.add_singleton::<dyn Greeter, _>(|_| Ok(Arc::new(English)));
///
/// let provider = services.build().expect("valid composition");
/// let greeter = provider.resolve::<dyn Greeter>().expect("registered");
/// assert_eq!(greeter.greet(), "hello");
/// ```
#[derive(Debug, Default, Clone)]
pub struct ServiceCollection {
    registrations: Vec<Registration>,
}

impl ServiceCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Registers `S` with the given lifetime, replacing any existing public
    /// registration of `S`.
    pub fn add<S, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        S: ?Sized + Capability,
        F: Fn(&Scope) -> Result<Arc<S>, ResolveError> + Send + Sync + 'static,
    {
        let key = ServiceKey::of::<S>();
        if self.take(&key).is_some() {
            tracing::debug!(capability = S::NAME, "replacing existing registration");
        }
        self.insert(Registration::new(key, lifetime, factory));
        self
    }

    /// Registers a process-wide `S`.
    pub fn add_singleton<S, F>(&mut self, factory: F) -> &mut Self
    where
        S: ?Sized + Capability,
        F: Fn(&Scope) -> Result<Arc<S>, ResolveError> + Send + Sync + 'static,
    {
        self.add(Lifetime::Singleton, factory)
    }

    /// Registers a per-scope `S`.
    pub fn add_scoped<S, F>(&mut self, factory: F) -> &mut Self
    where
        S: ?Sized + Capability,
        F: Fn(&Scope) -> Result<Arc<S>, ResolveError> + Send + Sync + 'static,
    {
        self.add(Lifetime::Scoped, factory)
    }

    /// Registers an `S` constructed on every resolution.
    pub fn add_transient<S, F>(&mut self, factory: F) -> &mut Self
    where
        S: ?Sized + Capability,
        F: Fn(&Scope) -> Result<Arc<S>, ResolveError> + Send + Sync + 'static,
    {
        self.add(Lifetime::Transient, factory)
    }

    /// Registers an already constructed singleton.
    pub fn add_instance<S>(&mut self, instance: Arc<S>) -> &mut Self
    where
        S: ?Sized + Capability,
    {
        self.add_singleton::<S, _>(move |_| Ok(Arc::clone(&instance)))
    }

    /// Registers the sink every decorator logs through.
    pub fn add_log_sink(&mut self, sink: Arc<dyn LogSink>) -> &mut Self {
        self.add_instance::<dyn LogSink>(sink)
    }

    /// Wraps the registered `S` in a decorator. See [`compose::decorate`].
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::NotRegistered`] if `S` has no public
    /// registration yet.
    pub fn decorate<S, F>(&mut self, factory: F) -> Result<&mut Self, CompositionError>
    where
        S: ?Sized + Capability,
        F: Fn(Arc<S>, CapabilityLogger) -> Arc<S> + Send + Sync + 'static,
    {
        compose::decorate::<S, F>(self, factory)?;
        Ok(self)
    }

    /// Returns `true` if `S` has a public registration.
    pub fn contains<S: ?Sized + Capability>(&self) -> bool {
        self.get(&ServiceKey::of::<S>()).is_some()
    }

    /// Returns the lifetime of the public registration of `S`.
    pub fn lifetime_of<S: ?Sized + Capability>(&self) -> Option<Lifetime> {
        self.get(&ServiceKey::of::<S>()).map(Registration::lifetime)
    }

    /// Returns all registrations, public and internal, in insertion order.
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Returns the number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Freezes the collection into a provider.
    ///
    /// # Errors
    ///
    /// Returns [`CompositionError::MissingDependency`] if a registration
    /// declares a dependency that is not registered.
    pub fn build(self) -> Result<ServiceProvider, CompositionError> {
        let keys: HashSet<ServiceKey> = self.registrations.iter().map(Registration::key).collect();

        for registration in &self.registrations {
            if let Some(missing) = registration
                .dependencies
                .iter()
                .find(|dependency| !keys.contains(*dependency))
            {
                return Err(CompositionError::MissingDependency {
                    dependent: registration.key.to_string(),
                    dependency: missing.to_string(),
                });
            }
        }

        tracing::debug!(registrations = self.registrations.len(), "service provider built");
        Ok(ServiceProvider::new(self.registrations))
    }

    pub(crate) fn get(&self, key: &ServiceKey) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.key == *key)
    }

    pub(crate) fn take(&mut self, key: &ServiceKey) -> Option<Registration> {
        let index = self.registrations.iter().position(|r| r.key == *key)?;
        Some(self.registrations.remove(index))
    }

    pub(crate) fn insert(&mut self, registration: Registration) {
        self.registrations.push(registration);
    }

    /// Next unused internal layer for `S`.
    pub(crate) fn next_internal_layer<S: ?Sized + Capability>(&self) -> u32 {
        let type_id = TypeId::of::<S>();
        let layers = self
            .registrations
            .iter()
            .filter(|r| r.key.type_id == type_id)
            .filter_map(|r| match r.key.visibility {
                Visibility::Internal { layer } => Some(layer),
                Visibility::Public => None,
            })
            .max()
            .unwrap_or(0);
        layers + 1
    }
}
