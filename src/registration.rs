//! Factory registration types.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::container::ServiceContainer;
use crate::error::DiResult;
use crate::key::{Binding, Capability};

/// Type-erased shared instance, as stored in the caches.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Something that builds a service instance from a container.
///
/// The container passed in is the one the lookup is running on: its
/// [`context`](ServiceContainer::context) is the context the factory was
/// matched for, and the factory should use it to resolve its own
/// dependencies rather than capturing any particular container.
///
/// Do not store the container in the instance: the cache holds the
/// instance, so the lineage would never be freed. Keep a
/// [`WeakContainer`](crate::WeakContainer) from
/// [`downgrade`](ServiceContainer::downgrade) instead.
///
/// Closures of the shape `Fn(&ServiceContainer) -> DiResult<AnyArc>`
/// implement this trait directly; the typed `register_*` helpers on
/// [`ServiceRegistry`](crate::ServiceRegistry) wrap friendlier closures.
pub trait ServiceFactory: Send + Sync {
    /// Builds one instance.
    fn create(&self, container: &ServiceContainer) -> DiResult<AnyArc>;

    /// True if every call returns the same pre-built instance.
    fn is_singleton(&self) -> bool {
        false
    }
}

impl<F> ServiceFactory for F
where
    F: Fn(&ServiceContainer) -> DiResult<AnyArc> + Send + Sync,
{
    fn create(&self, container: &ServiceContainer) -> DiResult<AnyArc> {
        self(container)
    }
}

/// Shared handle to a registered factory.
pub type Factory = Arc<dyn ServiceFactory>;

/// Factory that always returns one pre-built instance.
///
/// ```rust
/// use ferrous_wire::{ServiceFactory, ServiceRegistry, SingletonWrapper};
/// use std::sync::Arc;
///
/// let wrapper = SingletonWrapper::new(Arc::new(42u32));
/// let container = ServiceRegistry::new().create_container();
/// let a = wrapper.create(&container).unwrap();
/// let b = wrapper.create(&container).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert!(wrapper.is_singleton());
/// ```
pub struct SingletonWrapper {
    instance: AnyArc,
}

impl SingletonWrapper {
    /// Wraps an already-built instance.
    pub fn new(instance: AnyArc) -> Self {
        Self { instance }
    }

    /// The wrapped instance.
    pub fn instance(&self) -> &AnyArc {
        &self.instance
    }
}

impl ServiceFactory for SingletonWrapper {
    fn create(&self, _: &ServiceContainer) -> DiResult<AnyArc> {
        Ok(self.instance.clone())
    }

    fn is_singleton(&self) -> bool {
        true
    }
}

impl fmt::Debug for SingletonWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonWrapper").finish_non_exhaustive()
    }
}

/// A factory together with the constraints it was registered under.
#[derive(Clone)]
pub(crate) struct FactoryRecord {
    pub(crate) factory: Factory,
    pub(crate) service: Capability,
    pub(crate) context: Capability,
    /// True iff a context constraint was supplied at registration.
    pub(crate) wants_context: bool,
}

impl FactoryRecord {
    pub(crate) fn new(binding: &Binding, factory: Factory) -> Self {
        Self {
            factory,
            service: binding.service(),
            context: binding.context_capability(),
            wants_context: binding.wants_context(),
        }
    }
}

impl fmt::Debug for FactoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRecord")
            .field("service", &self.service)
            .field("context", &self.context)
            .field("wants_context", &self.wants_context)
            .field("singleton", &self.factory.is_singleton())
            .finish()
    }
}
