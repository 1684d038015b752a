//! Service registry: the setup-time side of the container.
//!
//! A [`ServiceRegistry`] owns the polymorphic factory index, the declared type
//! lattice and the observers. Containers created from it hold a snapshot of
//! that state, so registering more factories later never changes what an
//! existing container resolves.

use std::fmt;
use std::sync::Arc;

use crate::container::ServiceContainer;
use crate::context::Context;
use crate::descriptors::FactoryDescriptor;
use crate::error::DiResult;
use crate::index::PolymorphicIndex;
use crate::inject::Injectable;
use crate::key::{Binding, Lookup, Role, TypeKey};
use crate::lattice::TypeLattice;
use crate::observer::{DiObserver, Observers};
use crate::registration::{AnyArc, Factory, FactoryRecord, SingletonWrapper};

pub mod module_system;
pub use module_system::*;

/// Registry state shared by a registry and the containers built from it.
#[derive(Clone, Default)]
pub(crate) struct RegistryInner {
    pub(crate) factories: PolymorphicIndex<FactoryRecord>,
    pub(crate) lattice: TypeLattice,
    pub(crate) observers: Observers,
}

impl RegistryInner {
    /// Factory lookup shared by the registry and its containers.
    ///
    /// A factory registered with a context constraint never answers a lookup
    /// made without a context.
    pub(crate) fn find_record(
        &self,
        context: Option<TypeKey>,
        service: Option<TypeKey>,
        name: &str,
    ) -> Option<&FactoryRecord> {
        self.factories.lookup_where(
            &self.lattice,
            Role::Factory,
            context,
            service,
            name,
            |record| context.is_some() || !record.wants_context,
        )
    }
}

/// Registry of factories, keyed by requested type, context type and name.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Binding, Context, Resolver, ServiceRegistry};
///
/// struct Customer;
/// struct FrenchCustomer;
///
/// #[derive(Debug)]
/// struct Greeter { greeting: &'static str }
///
/// let mut registry = ServiceRegistry::new();
/// registry.declare_subtype::<FrenchCustomer, Customer>().unwrap();
/// registry.register_factory(Binding::of::<Greeter>().in_context::<Customer>(), |_| Greeter { greeting: "Hello" });
/// registry.register_factory(Binding::of::<Greeter>().in_context::<FrenchCustomer>(), |_| Greeter { greeting: "Bonjour" });
///
/// let container = registry.create_container();
/// let french = Context::new(FrenchCustomer);
/// let other = Context::new(Customer);
/// assert_eq!(container.get_in::<Greeter>(&french).unwrap().greeting, "Bonjour");
/// assert_eq!(container.get_in::<Greeter>(&other).unwrap().greeting, "Hello");
/// ```
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner_mut(&mut self) -> &mut RegistryInner {
        Arc::make_mut(&mut self.inner)
    }

    // ----- Registration -----

    /// Registers a type-erased factory at `binding`.
    ///
    /// Re-registering the same binding replaces the earlier factory. All the
    /// typed `register_*` helpers end up here.
    pub fn register_raw(&mut self, binding: Binding, factory: Factory) -> &mut Self {
        let record = FactoryRecord::new(&binding, factory);
        let replaced = self
            .inner_mut()
            .factories
            .register(Role::Factory, record.context, record.service, binding.name(), record)
            .is_some();
        if replaced {
            tracing::debug!(binding = %binding, "replaced factory registration");
        } else {
            tracing::debug!(binding = %binding, "registered factory");
        }
        self
    }

    /// Registers a factory producing `T`.
    ///
    /// The factory receives the container performing the lookup and resolves
    /// its own dependencies through it.
    ///
    /// ```rust
    /// use ferrous_wire::{Binding, Resolver, ServiceRegistry};
    /// use std::sync::Arc;
    ///
    /// struct Settings { punctuation: &'static str }
    /// struct Greeter { punctuation: &'static str }
    ///
    /// let mut registry = ServiceRegistry::new();
    /// registry.register_singleton(Binding::of::<Settings>(), Settings { punctuation: "!!" });
    /// registry.register_fallible_factory(Binding::of::<Greeter>(), |container| {
    ///     let settings = container.get::<Settings>()?;
    ///     Ok(Greeter { punctuation: settings.punctuation })
    /// });
    ///
    /// let container = registry.create_container();
    /// assert_eq!(container.get::<Greeter>().unwrap().punctuation, "!!");
    /// ```
    pub fn register_factory<T, F>(&mut self, binding: Binding, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceContainer) -> T + Send + Sync + 'static,
    {
        let erased = move |container: &ServiceContainer| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(container)) as AnyArc)
        };
        self.register_raw(binding, Arc::new(erased))
    }

    /// Registers a factory that may fail.
    ///
    /// Errors from nested lookups should be returned unchanged; the factory's
    /// own failures are best reported through
    /// [`DiError::construction`].
    pub fn register_fallible_factory<T, F>(&mut self, binding: Binding, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceContainer) -> DiResult<T> + Send + Sync + 'static,
    {
        let erased = move |container: &ServiceContainer| -> DiResult<AnyArc> {
            factory(container).map(|value| Arc::new(value) as AnyArc)
        };
        self.register_raw(binding, Arc::new(erased))
    }

    /// Registers a factory producing a trait object.
    ///
    /// Resolve it with [`get_trait`](crate::Resolver::get_trait).
    ///
    /// ```rust
    /// use ferrous_wire::{Binding, Resolver, ServiceRegistry};
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync { fn greet(&self) -> String; }
    /// struct Plain;
    /// impl Greeter for Plain { fn greet(&self) -> String { "Hello".into() } }
    ///
    /// let mut registry = ServiceRegistry::new();
    /// registry.register_trait_factory::<dyn Greeter, _>(Binding::of::<dyn Greeter>(), |_| Arc::new(Plain));
    ///
    /// let container = registry.create_container();
    /// assert_eq!(container.get_trait::<dyn Greeter>().unwrap().greet(), "Hello");
    /// ```
    pub fn register_trait_factory<Trait, F>(&mut self, binding: Binding, factory: F) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceContainer) -> Arc<Trait> + Send + Sync + 'static,
    {
        let erased = move |container: &ServiceContainer| -> DiResult<AnyArc> {
            Ok(Arc::new(factory(container)) as AnyArc)
        };
        self.register_raw(binding, Arc::new(erased))
    }

    /// Registers an already-built instance.
    pub fn register_singleton<T>(&mut self, binding: Binding, value: T) -> &mut Self
    where
        T: Send + Sync + 'static,
    {
        self.register_shared_singleton(binding, Arc::new(value))
    }

    /// Registers an instance that is already behind an `Arc`, keeping its identity.
    pub fn register_shared_singleton<T>(&mut self, binding: Binding, value: Arc<T>) -> &mut Self
    where
        T: Send + Sync + 'static,
    {
        self.register_raw(binding, Arc::new(SingletonWrapper::new(value)))
    }

    /// Registers an already-built trait object.
    pub fn register_trait_singleton<Trait>(&mut self, binding: Binding, value: Arc<Trait>) -> &mut Self
    where
        Trait: ?Sized + Send + Sync + 'static,
    {
        self.register_raw(binding, Arc::new(SingletonWrapper::new(Arc::new(value))))
    }

    /// Registers a dependency descriptor as the factory for `binding`.
    pub fn register_injectable<T>(&mut self, binding: Binding, injectable: Injectable<T>) -> &mut Self
    where
        T: Send + Sync + 'static,
    {
        self.register_raw(binding, Arc::new(injectable))
    }

    /// Declares that `Sub` is a subtype (or implementor) of `Super`.
    ///
    /// A lookup for `Sub`, or in a `Sub` context, then also matches
    /// registrations made for `Super`, preferring the closer type.
    pub fn declare_subtype<Sub, Super>(&mut self) -> DiResult<&mut Self>
    where
        Sub: ?Sized + 'static,
        Super: ?Sized + 'static,
    {
        let (sub, sup) = (TypeKey::of::<Sub>(), TypeKey::of::<Super>());
        if self.inner.lattice.supertypes(sub).contains(&sup) {
            return Ok(self);
        }
        self.inner_mut().lattice.declare(sub, sup)?;
        tracing::debug!(subtype = %sub, supertype = %sup, "declared subtype");
        Ok(self)
    }

    /// Adds an observer shared by every container created afterwards.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.inner_mut().observers.add(observer);
        self
    }

    /// Runs a module's registrations against this registry.
    pub fn add_module<M: ServiceModule>(&mut self, module: M) -> DiResult<&mut Self> {
        module.register_services(self)?;
        Ok(self)
    }

    // ----- Containers -----

    /// Creates a container with no context bound.
    ///
    /// Every call creates a fresh, empty cache. Containers derived from the
    /// result through `bind` share that cache.
    pub fn create_container(&self) -> ServiceContainer {
        ServiceContainer::new(self.inner.clone(), None)
    }

    /// Creates a container bound to `context`.
    pub fn create_container_in(&self, context: Context) -> ServiceContainer {
        ServiceContainer::new(self.inner.clone(), Some(context))
    }

    // ----- Introspection -----

    /// Finds the factory that would serve `lookup`, bypassing any cache.
    ///
    /// Returns `None` when nothing matches.
    ///
    /// ```rust
    /// use ferrous_wire::{Binding, Lookup, ServiceRegistry};
    ///
    /// struct AdminArea;
    /// struct Widget;
    ///
    /// let mut registry = ServiceRegistry::new();
    /// registry.register_factory(Binding::of::<Widget>().in_context::<AdminArea>(), |_| Widget);
    ///
    /// assert!(registry.find_factory(&Lookup::of::<Widget>().context_type::<AdminArea>()).is_some());
    /// assert!(registry.find_factory(&Lookup::of::<Widget>()).is_none());
    /// ```
    pub fn find_factory(&self, lookup: &Lookup) -> Option<Factory> {
        self.inner
            .find_record(lookup.context, lookup.service, &lookup.name)
            .map(|record| record.factory.clone())
    }

    /// Describes every registration, ordered by service, context and name.
    pub fn descriptors(&self) -> Vec<FactoryDescriptor> {
        let mut descriptors: Vec<_> = self
            .inner
            .factories
            .iter()
            .map(|(_, _, _, name, record)| FactoryDescriptor::from_record(record, name))
            .collect();
        descriptors.sort_by(|a, b| {
            (a.service.display_name(), a.context.display_name(), a.name.as_str())
                .cmp(&(b.service.display_name(), b.context.display_name(), b.name.as_str()))
        });
        descriptors
    }

    /// The declared type lattice.
    pub fn lattice(&self) -> &TypeLattice {
        &self.inner.lattice
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.inner.factories.len()
    }

    /// True if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.inner.factories.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("factories", &self.inner.factories.len())
            .field("subtype_edges", &self.inner.lattice.len())
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}
