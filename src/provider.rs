//! Resolution of registered services.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::capability::Capability;
use crate::error::ResolveError;
use crate::registry::{Instance, InternalBinding, Lifetime, Registration, ServiceKey};

type Cache = Mutex<HashMap<ServiceKey, Instance>>;

fn lock(cache: &Cache) -> MutexGuard<'_, HashMap<ServiceKey, Instance>> {
    // Entries are inserted whole, so a poisoned map is still consistent.
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Shared {
    registrations: HashMap<ServiceKey, Registration>,
    singletons: Cache,
}

/// Frozen registry that hands out service instances.
///
/// Registrations never change after [`ServiceCollection::build`]. The
/// provider resolves through its own root scope; per-request work should
/// call [`create_scope`](Self::create_scope) so scoped services are not
/// shared between requests.
///
/// [`ServiceCollection::build`]: crate::ServiceCollection::build
pub struct ServiceProvider {
    root: Scope,
}

impl ServiceProvider {
    pub(crate) fn new(registrations: Vec<Registration>) -> Self {
        let registrations = registrations.into_iter().map(|r| (r.key(), r)).collect();
        Self {
            root: Scope::new(Arc::new(Shared {
                registrations,
                singletons: Mutex::new(HashMap::new()),
            })),
        }
    }

    /// Resolves `S` from the root scope.
    ///
    /// # Errors
    ///
    /// See [`Scope::resolve`].
    pub fn resolve<S: ?Sized + Capability>(&self) -> Result<Arc<S>, ResolveError> {
        self.root.resolve::<S>()
    }

    /// Starts a new scope (e.g. one per request).
    pub fn create_scope(&self) -> Scope {
        Scope::new(Arc::clone(&self.root.shared))
    }

    /// Returns `true` if `S` is resolvable.
    pub fn contains<S: ?Sized + Capability>(&self) -> bool {
        self.root.shared.registrations.contains_key(&ServiceKey::of::<S>())
    }

    /// Returns the lifetime of the public registration of `S`.
    pub fn lifetime_of<S: ?Sized + Capability>(&self) -> Option<Lifetime> {
        self.root
            .shared
            .registrations
            .get(&ServiceKey::of::<S>())
            .map(Registration::lifetime)
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.root.shared.registrations.len())
            .finish_non_exhaustive()
    }
}

/// A resolution scope owning its scoped instances.
///
/// Scopes are independent: two scopes never share a `Scoped` instance, while
/// all scopes of one provider share its singletons.
pub struct Scope {
    shared: Arc<Shared>,
    scoped: Cache,
}

impl Scope {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            scoped: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the public registration of `S`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotRegistered`] if `S` has no public
    /// registration, or whatever error its factory raised.
    pub fn resolve<S: ?Sized + Capability>(&self) -> Result<Arc<S>, ResolveError> {
        self.resolve_key::<S>(ServiceKey::of::<S>())
    }

    pub(crate) fn resolve_internal<S: ?Sized + Capability>(
        &self,
        binding: &InternalBinding<S>,
    ) -> Result<Arc<S>, ResolveError> {
        self.resolve_key::<S>(binding.key())
    }

    fn resolve_key<S: ?Sized + Capability>(&self, key: ServiceKey) -> Result<Arc<S>, ResolveError> {
        let instance = self.instance(key)?;
        instance
            .downcast_ref::<Arc<S>>()
            .cloned()
            .ok_or_else(|| ResolveError::TypeMismatch {
                key: key.to_string(),
            })
    }

    fn instance(&self, key: ServiceKey) -> Result<Instance, ResolveError> {
        let registration =
            self.shared
                .registrations
                .get(&key)
                .ok_or_else(|| ResolveError::NotRegistered {
                    key: key.to_string(),
                })?;
        let construct = || (registration.factory())(self);

        match registration.lifetime() {
            Lifetime::Transient => construct(),
            Lifetime::Singleton => cached(&self.shared.singletons, key, construct),
            Lifetime::Scoped => cached(&self.scoped, key, construct),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("scoped_instances", &lock(&self.scoped).len())
            .finish_non_exhaustive()
    }
}

/// Returns the cached instance for `key`, constructing it on first use.
///
/// The lock is not held while constructing, so factories may resolve their
/// own dependencies. If two callers race, the first insert wins.
fn cached<F>(cache: &Cache, key: ServiceKey, construct: F) -> Result<Instance, ResolveError>
where
    F: FnOnce() -> Result<Instance, ResolveError>,
{
    if let Some(instance) = lock(cache).get(&key) {
        return Ok(Arc::clone(instance));
    }
    let instance = construct()?;
    Ok(Arc::clone(lock(cache).entry(key).or_insert(instance)))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::registry::ServiceCollection;

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    impl Capability for dyn Clock {
        const NAME: &'static str = "Clock";
    }

    trait Calendar: Send + Sync {
        fn today(&self) -> u64;
    }

    impl Capability for dyn Calendar {
        const NAME: &'static str = "Calendar";
    }

    struct Fixed(u64);

    impl Clock for Fixed {
        fn now(&self) -> u64 {
            self.0
        }
    }

    struct ClockCalendar(Arc<dyn Clock>);

    impl Calendar for ClockCalendar {
        fn today(&self) -> u64 {
            self.0.now() / 86_400
        }
    }

    fn counting(lifetime: Lifetime) -> (ServiceProvider, Arc<AtomicUsize>) {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut services = ServiceCollection::new();
        services.add::<dyn Clock, _>(lifetime, move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Fixed(n as u64)))
        });
        (services.build().unwrap(), built)
    }

    #[test]
    fn singleton_is_shared_across_scopes() {
        let (provider, built) = counting(Lifetime::Singleton);

        let a = provider.create_scope().resolve::<dyn Clock>().unwrap();
        let b = provider.create_scope().resolve::<dyn Clock>().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scoped_is_shared_within_a_scope_only() {
        let (provider, built) = counting(Lifetime::Scoped);

        let scope = provider.create_scope();
        let a = scope.resolve::<dyn Clock>().unwrap();
        let b = scope.resolve::<dyn Clock>().unwrap();
        let c = provider.create_scope().resolve::<dyn Clock>().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn transient_is_never_shared() {
        let (provider, built) = counting(Lifetime::Transient);

        let scope = provider.create_scope();
        let a = scope.resolve::<dyn Clock>().unwrap();
        let b = scope.resolve::<dyn Clock>().unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn factories_resolve_dependencies() {
        let mut services = ServiceCollection::new();
        services
            .add_singleton::<dyn Clock, _>(|_| Ok(Arc::new(Fixed(86_400 * 3))))
            .add_scoped::<dyn Calendar, _>(|scope| {
                Ok(Arc::new(ClockCalendar(scope.resolve::<dyn Clock>()?)))
            });

        let provider = services.build().unwrap();
        assert_eq!(provider.resolve::<dyn Calendar>().unwrap().today(), 3);
        assert_eq!(provider.lifetime_of::<dyn Calendar>(), Some(Lifetime::Scoped));
    }

    #[test]
    fn missing_registration_is_an_error() {
        let provider = ServiceCollection::new().build().unwrap();

        let err = provider.resolve::<dyn Clock>().err().expect("expected an error");
        assert_eq!(
            err,
            ResolveError::NotRegistered {
                key: "Clock".to_string()
            }
        );
        assert!(!provider.contains::<dyn Clock>());
    }

    #[test]
    fn factory_errors_propagate() {
        let mut services = ServiceCollection::new();
        services
            .add_scoped::<dyn Calendar, _>(|scope| {
                Ok(Arc::new(ClockCalendar(scope.resolve::<dyn Clock>()?)))
            });

        let err = services.build().unwrap().resolve::<dyn Calendar>().err().expect("expected an error");
        assert!(matches!(err, ResolveError::NotRegistered { .. }));
    }
}
