//! Service container: the runtime side of the registry.
//!
//! A [`ServiceContainer`] pairs a registry snapshot with a per-lineage
//! [`ContextCache`] and an optional bound [`Context`]. It is meant to live
//! for one logical operation (one request, one job), with contexts bound and
//! rebound as the operation moves between business objects.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use crate::cache::{CachedValue, ContextCache};
use crate::context::{Context, WeakContext};
use crate::error::{DiError, DiResult};
use crate::key::{Binding, Lookup, RequestKey, Role, TypeKey};
use crate::registration::{AnyArc, Factory, FactoryRecord};
use crate::registry::RegistryInner;
use crate::traits::ResolverCore;

pub mod request;
pub use request::Request;
use request::ContextArg;

/// Per-operation service container.
///
/// Cloning a container is cheap and yields a handle on the same cache and
/// bound context.
///
/// # Lookup order
///
/// For a request (type, context, name):
///
/// 1. A request carrying a different context than the bound one is re-run
///    on a container bound to that context.
/// 2. The cache of the bound context is consulted.
/// 3. If a context is bound, values seeded through [`set`](Self::set) are
///    consulted next; they are visible from every context.
/// 4. The most specific factory for (context type, requested type, name)
///    is found. Nothing found means not found.
/// 5. A factory registered without a context constraint is always run,
///    and its result cached, as if no context were bound.
/// 6. Otherwise the factory is called with this container and its result
///    cached under the factory's own registered context and requested
///    capabilities, so more specific later lookups hit it too.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Binding, Context, Resolver, ServiceRegistry};
/// use std::sync::Arc;
///
/// struct Customer { name: &'static str }
/// #[derive(Debug)]
/// struct Greeter { greeting: String }
///
/// let mut registry = ServiceRegistry::new();
/// registry.register_fallible_factory(Binding::of::<Greeter>().in_context::<Customer>(), |container| {
///     let customer = container.context().and_then(|ctx| ctx.downcast_ref::<Customer>()).map(|c| c.name);
///     Ok(Greeter { greeting: format!("Hello {}", customer.unwrap_or("stranger")) })
/// });
///
/// let container = registry.create_container();
/// let mary = Context::new(Customer { name: "Mary" });
///
/// let first = container.get_in::<Greeter>(&mary).unwrap();
/// let again = container.get_in::<Greeter>(&mary).unwrap();
/// assert_eq!(first.greeting, "Hello Mary");
/// assert!(Arc::ptr_eq(&first, &again));
///
/// // No context bound: a factory that asked for one does not apply.
/// assert!(container.get::<Greeter>().unwrap_err().is_not_found());
/// ```
#[derive(Clone)]
pub struct ServiceContainer {
    registry: Arc<RegistryInner>,
    cache: Arc<ContextCache>,
    context: Option<Context>,
}

fn same_context(a: Option<&Context>, b: Option<&Context>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.ptr_eq(b),
        _ => false,
    }
}

impl ServiceContainer {
    pub(crate) fn new(registry: Arc<RegistryInner>, context: Option<Context>) -> Self {
        Self {
            registry,
            cache: Arc::new(ContextCache::new()),
            context,
        }
    }

    /// The bound context, if any.
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Returns a container bound to `context` that shares this one's cache.
    ///
    /// Borrows `self` when `context` is already the bound context.
    ///
    /// ```rust
    /// use ferrous_wire::{Context, ServiceRegistry};
    /// use std::borrow::Cow;
    ///
    /// let container = ServiceRegistry::new().create_container();
    /// let ctx = Context::new("request-1".to_string());
    ///
    /// let bound = container.bind(Some(ctx.clone()));
    /// assert!(bound.shares_cache_with(&container));
    /// assert!(matches!(bound.bind(Some(ctx)), Cow::Borrowed(_)));
    /// assert!(matches!(container.bind(None), Cow::Borrowed(_)));
    /// ```
    pub fn bind(&self, context: Option<Context>) -> Cow<'_, ServiceContainer> {
        if same_context(self.context.as_ref(), context.as_ref()) {
            return Cow::Borrowed(self);
        }
        Cow::Owned(Self {
            registry: self.registry.clone(),
            cache: self.cache.clone(),
            context,
        })
    }

    /// Returns a handle on this container that does not keep its cache or
    /// bound context alive.
    ///
    /// Services that need to resolve lazily should hold one of these rather
    /// than a `ServiceContainer`: a cached service holding its own container
    /// would keep the whole lineage alive.
    ///
    /// ```rust
    /// use ferrous_wire::ServiceRegistry;
    ///
    /// let container = ServiceRegistry::new().create_container();
    /// let handle = container.downgrade();
    /// assert!(handle.upgrade().unwrap().shares_cache_with(&container));
    ///
    /// drop(container);
    /// assert!(handle.upgrade().is_none());
    /// ```
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            registry: self.registry.clone(),
            cache: Arc::downgrade(&self.cache),
            context: self.context.as_ref().map(Context::downgrade),
        }
    }

    // ----- Seeding -----

    /// Seeds the cache with `value` so lookups under any context see it.
    ///
    /// Fails with [`DiError::SetConflict`] if a value that would answer the
    /// same lookup is already cached context-independently. Seed values
    /// before anything is resolved.
    ///
    /// ```rust
    /// use ferrous_wire::{Binding, DiError, Resolver, ServiceRegistry};
    ///
    /// struct Payload(&'static str);
    ///
    /// let container = ServiceRegistry::new().create_container();
    /// container.set(Binding::of::<Payload>(), Payload("incoming")).unwrap();
    /// assert_eq!(container.get::<Payload>().unwrap().0, "incoming");
    ///
    /// let err = container.set(Binding::of::<Payload>(), Payload("again")).unwrap_err();
    /// assert!(matches!(err, DiError::SetConflict(_)));
    /// ```
    pub fn set<T>(&self, binding: Binding, value: T) -> DiResult<()>
    where
        T: Send + Sync + 'static,
    {
        self.set_any(binding, Arc::new(value))
    }

    /// Seeds an instance that is already behind an `Arc`, keeping its identity.
    pub fn set_shared<T>(&self, binding: Binding, value: Arc<T>) -> DiResult<()>
    where
        T: Send + Sync + 'static,
    {
        self.set_any(binding, value)
    }

    /// Seeds a trait object; resolve it with `get_trait`.
    pub fn set_trait<T>(&self, binding: Binding, value: Arc<T>) -> DiResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.set_any(binding, Arc::new(value))
    }

    /// Seeds a type-erased value.
    ///
    /// Only cached keys that would answer a lookup for the binding's own
    /// context and requested types count as conflicts; entries for more
    /// specific subtypes are not inspected.
    pub fn set_any(&self, binding: Binding, value: AnyArc) -> DiResult<()> {
        let lattice = &self.registry.lattice;
        let context = binding.context_capability();
        let service = binding.service();
        self.cache.with_index(None, |index| {
            let conflict = index.lookup(
                lattice,
                Role::Instance,
                context.type_key(),
                service.type_key(),
                binding.name(),
            );
            if conflict.is_some() {
                return Err(DiError::SetConflict(binding.to_string()));
            }
            index.register(
                Role::Instance,
                context,
                service,
                binding.name(),
                CachedValue::seeded(value),
            );
            Ok(())
        })?;
        tracing::debug!(binding = %binding, "seeded instance");
        Ok(())
    }

    // ----- Resolution -----

    /// Resolves `request`, failing with [`DiError::NotFound`] if nothing matches.
    pub fn resolve_any(&self, request: &Request<'_>) -> DiResult<AnyArc> {
        match self.try_resolve_any(request)? {
            Some(value) => Ok(value),
            None => {
                let context = match request.context_arg() {
                    ContextArg::Bound => self.context.as_ref(),
                    ContextArg::Explicit(context) => context,
                };
                let key = RequestKey {
                    service: request.service(),
                    context: context.map(Context::type_key),
                    name: request.name().to_owned(),
                };
                tracing::debug!(service = %key, "service not found");
                Err(DiError::NotFound(key))
            }
        }
    }

    /// Resolves `request`, returning `Ok(None)` if nothing matches.
    ///
    /// Factory errors are still returned as errors.
    pub fn try_resolve_any(&self, request: &Request<'_>) -> DiResult<Option<AnyArc>> {
        if let ContextArg::Explicit(target) = request.context_arg() {
            if !same_context(self.context.as_ref(), target) {
                return self
                    .bind(target.cloned())
                    .lookup(request.service(), request.name());
            }
        }
        self.lookup(request.service(), request.name())
    }

    fn lookup(&self, service: Option<TypeKey>, name: &str) -> DiResult<Option<AnyArc>> {
        let registry = &*self.registry;
        let context = self.context.as_ref();
        let context_type = context.map(Context::type_key);

        let cached = self
            .cache
            .read_index(context, |index| {
                index
                    .lookup(&registry.lattice, Role::Instance, context_type, service, name)
                    .map(|hit| hit.value.clone())
            })
            .flatten();
        if let Some(value) = cached {
            self.cache_hit(service, name);
            return Ok(Some(value));
        }

        if context.is_some() {
            let seeded = self
                .cache
                .read_index(None, |index| {
                    index
                        .lookup_where(
                            &registry.lattice,
                            Role::Instance,
                            context_type,
                            service,
                            name,
                            CachedValue::is_seeded,
                        )
                        .map(|hit| hit.value.clone())
                })
                .flatten();
            if let Some(value) = seeded {
                self.cache_hit(service, name);
                return Ok(Some(value));
            }
        }

        let Some(record) = registry.find_record(context_type, service, name) else {
            return Ok(None);
        };

        if !record.wants_context && context.is_some() {
            return self.bind(None).lookup(service, name);
        }

        let built = self.construct(record, service, name)?;
        let winner = self.cache.with_index(context, |index| {
            // A concurrent lookup may have stored a result first; keep it.
            if let Some(existing) = index.get_exact(Role::Instance, record.context, record.service, name) {
                return Some(existing.value.clone());
            }
            index.register(
                Role::Instance,
                record.context,
                record.service,
                name,
                CachedValue::constructed(built.clone()),
            );
            None
        });
        Ok(Some(winner.unwrap_or(built)))
    }

    fn construct(
        &self,
        record: &FactoryRecord,
        service: Option<TypeKey>,
        name: &str,
    ) -> DiResult<AnyArc> {
        let observers = &self.registry.observers;
        let key = observers
            .has_observers()
            .then(|| self.request_key(service, name));
        if let Some(key) = &key {
            observers.resolving(key);
        }
        tracing::debug!(
            service = service.map_or("*", |ty| ty.name()),
            context = self.context.as_ref().map_or("none", Context::type_name),
            name,
            "constructing service"
        );

        let started = Instant::now();
        match record.factory.create(self) {
            Ok(value) => {
                if let Some(key) = &key {
                    observers.resolved(key, started.elapsed());
                }
                Ok(value)
            }
            Err(error) => {
                tracing::debug!(
                    service = service.map_or("*", |ty| ty.name()),
                    %error,
                    "factory failed"
                );
                if let Some(key) = &key {
                    observers.factory_failed(key, &error);
                }
                Err(error)
            }
        }
    }

    fn cache_hit(&self, service: Option<TypeKey>, name: &str) {
        tracing::trace!(service = service.map_or("*", |ty| ty.name()), name, "cache hit");
        let observers = &self.registry.observers;
        if observers.has_observers() {
            observers.cache_hit(&self.request_key(service, name));
        }
    }

    fn request_key(&self, service: Option<TypeKey>, name: &str) -> RequestKey {
        RequestKey {
            service,
            context: self.context.as_ref().map(Context::type_key),
            name: name.to_owned(),
        }
    }

    // ----- Cache management -----

    /// Drops every value cached for `context` right away.
    ///
    /// Returns false if nothing was cached for it. This is the only way to
    /// release the cache of a static context.
    pub fn release_context(&self, context: &Context) -> bool {
        self.cache.release(context)
    }

    /// Drops the caches of contexts that no longer exist.
    ///
    /// This also happens automatically whenever a new context is first used.
    pub fn purge_released_contexts(&self) -> usize {
        self.cache.purge()
    }

    /// Number of contexts that currently have a cache, after purging dead ones.
    pub fn tracked_contexts(&self) -> usize {
        self.cache.tracked_contexts()
    }

    /// True if both containers belong to the same lineage.
    pub fn shares_cache_with(&self, other: &ServiceContainer) -> bool {
        Arc::ptr_eq(&self.cache, &other.cache)
    }

    /// Same as [`ServiceRegistry::find_factory`](crate::ServiceRegistry::find_factory)
    /// against the registry snapshot this container was created from.
    pub fn find_factory(&self, lookup: &Lookup) -> Option<Factory> {
        self.registry
            .find_record(lookup.context, lookup.service, &lookup.name)
            .map(|record| record.factory.clone())
    }
}

impl Drop for ServiceContainer {
    fn drop(&mut self) {
        // Release our hold on the context first so its bucket can go now.
        if self.context.take().is_some() {
            self.cache.try_purge();
        }
    }
}

/// Non-owning handle on a [`ServiceContainer`], see
/// [`ServiceContainer::downgrade`].
#[derive(Clone)]
pub struct WeakContainer {
    registry: Arc<RegistryInner>,
    cache: Weak<ContextCache>,
    context: Option<WeakContext>,
}

impl WeakContainer {
    /// The container again, or `None` once its lineage or its bound
    /// context has been dropped.
    pub fn upgrade(&self) -> Option<ServiceContainer> {
        let cache = self.cache.upgrade()?;
        let context = match &self.context {
            Some(context) => Some(context.upgrade()?),
            None => None,
        };
        Some(ServiceContainer {
            registry: self.registry.clone(),
            cache,
            context,
        })
    }
}

impl fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakContainer")
            .field("context", &self.context.as_ref().map(WeakContext::type_name))
            .field("alive", &(self.cache.strong_count() > 0))
            .finish()
    }
}

impl ResolverCore for ServiceContainer {
    fn resolve_any(&self, request: &Request<'_>) -> DiResult<AnyArc> {
        ServiceContainer::resolve_any(self, request)
    }

    fn try_resolve_any(&self, request: &Request<'_>) -> DiResult<Option<AnyArc>> {
        ServiceContainer::try_resolve_any(self, request)
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("context", &self.context)
            .field("factories", &self.registry.factories.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServiceRegistry;
    use crate::traits::Resolver;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Customer;
    struct Widget(usize);

    fn counting_registry(binding: Binding) -> (ServiceRegistry, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut registry = ServiceRegistry::new();
        registry.register_factory(binding, move |_| Widget(counter.fetch_add(1, Ordering::SeqCst)));
        (registry, calls)
    }

    #[test]
    fn explicit_context_rebinds_for_one_lookup() {
        let (registry, calls) = counting_registry(Binding::of::<Widget>().in_context::<Customer>());
        let container = registry.create_container();
        let ctx = Context::new(Customer);

        let a = container.get_in::<Widget>(&ctx).unwrap();
        let b = container.bind(Some(ctx.clone())).get::<Widget>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(container.context().is_none());
    }

    #[test]
    fn context_independent_factory_is_cached_once_for_all_contexts() {
        let (registry, calls) = counting_registry(Binding::of::<Widget>());
        let container = registry.create_container();
        let first = Context::new(Customer);
        let second = Context::new(Customer);

        let a = container.get_in::<Widget>(&first).unwrap();
        let b = container.get_in::<Widget>(&second).unwrap();
        let c = container.get::<Widget>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Nothing was cached per context.
        assert_eq!(container.tracked_contexts(), 0);
    }

    #[test]
    fn failed_construction_leaves_no_cache_entry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let mut registry = ServiceRegistry::new();
        registry.register_fallible_factory(Binding::of::<Widget>(), move |_| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            if attempt == 0 {
                Err(DiError::construction::<Widget, _>(std::io::Error::other("not yet")))
            } else {
                Ok(Widget(attempt))
            }
        });

        let container = registry.create_container();
        assert!(matches!(
            container.get::<Widget>(),
            Err(DiError::Construction { .. })
        ));
        assert_eq!(container.get::<Widget>().unwrap().0, 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn not_found_reports_the_effective_context() {
        let container = ServiceRegistry::new().create_container();
        let ctx = Context::new(Customer);
        match container.get_in::<Widget>(&ctx) {
            Err(DiError::NotFound(key)) => {
                assert_eq!(key.context_name(), Some(std::any::type_name::<Customer>()));
                assert_eq!(key.service_name(), Some(std::any::type_name::<Widget>()));
            }
            other => panic!("unexpected: {:?}", other.map(|w| w.0)),
        }
    }

    #[test]
    fn weak_handle_follows_its_bound_context() {
        let container = ServiceRegistry::new().create_container();
        let ctx = Context::new(Customer);
        let bound = container.bind(Some(ctx.clone())).into_owned();
        let handle = bound.downgrade();
        drop(bound);

        let again = handle.upgrade().unwrap();
        assert!(again.context().unwrap().ptr_eq(&ctx));
        assert!(again.shares_cache_with(&container));
        drop(again);

        drop(ctx);
        assert!(handle.upgrade().is_none());
    }

    #[test]
    fn dropping_a_bound_container_purges_its_dead_context() {
        let (registry, _) = counting_registry(Binding::of::<Widget>().in_any_context());
        let container = registry.create_container();
        let bound = container.bind(Some(Context::new(Customer))).into_owned();
        bound.get::<Widget>().unwrap();

        drop(bound);
        assert_eq!(container.cache.bucket_count(), 0);
    }

    #[test]
    fn separate_containers_do_not_share_caches() {
        let (registry, calls) = counting_registry(Binding::of::<Widget>());
        let a = registry.create_container();
        let b = registry.create_container();
        assert!(!a.shares_cache_with(&b));

        let first = a.get::<Widget>().unwrap();
        let second = b.get::<Widget>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
