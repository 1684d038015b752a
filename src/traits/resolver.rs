//! Resolver traits for typed service lookup.

use std::any::Any;
use std::sync::Arc;

use crate::container::Request;
use crate::context::Context;
use crate::error::{DiError, DiResult};
use crate::registration::AnyArc;

/// Object-safe lookup entry points.
///
/// Everything typed in [`Resolver`] is built on these two methods.
pub trait ResolverCore: Send + Sync {
    /// Resolves `request`, failing with [`DiError::NotFound`] if nothing matches.
    fn resolve_any(&self, request: &Request<'_>) -> DiResult<AnyArc>;

    /// Resolves `request`, returning `Ok(None)` if nothing matches.
    fn try_resolve_any(&self, request: &Request<'_>) -> DiResult<Option<AnyArc>>;
}

pub(crate) fn downcast<T: Any + Send + Sync>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

pub(crate) fn downcast_trait<T: ?Sized + Send + Sync + 'static>(any: AnyArc) -> DiResult<Arc<T>> {
    any.downcast::<Arc<T>>()
        .map(|outer| (*outer).clone())
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}

/// Typed lookups.
///
/// Concrete services are stored as `Arc<T>` and resolved with the `get*`
/// methods; trait objects are stored as `Arc<Arc<dyn Trait>>` and resolved
/// with the `get_trait*` methods.
///
/// The requested type of a lookup and the type the result is read as are
/// independent when a [`Request`] is given explicitly, which is how values
/// registered for "anything" or for a supertype are read:
///
/// ```
/// use ferrous_wire::{Binding, Request, Resolver, ServiceRegistry};
///
/// let mut registry = ServiceRegistry::new();
/// registry.register_singleton(Binding::anything().named("retries"), 3u32);
///
/// let container = registry.create_container();
/// let retries = container.get_with::<u32>(&Request::anything().named("retries")).unwrap();
/// assert_eq!(*retries, 3);
///
/// // A typed lookup for u32 also sees a registration made for anything.
/// assert_eq!(*container.get_named::<u32>("retries").unwrap(), 3);
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves the concrete service `T`.
    fn get<T: Any + Send + Sync>(&self) -> DiResult<Arc<T>> {
        self.get_with(&Request::of::<T>())
    }

    /// Resolves the concrete service `T` registered under `name`.
    fn get_named<T: Any + Send + Sync>(&self, name: &str) -> DiResult<Arc<T>> {
        self.get_with(&Request::of::<T>().named(name))
    }

    /// Resolves the concrete service `T` under `context` instead of the bound one.
    fn get_in<T: Any + Send + Sync>(&self, context: &Context) -> DiResult<Arc<T>> {
        self.get_with(&Request::of::<T>().in_context(context))
    }

    /// Runs `request` and reads the result as `T`.
    ///
    /// Fails with [`DiError::TypeMismatch`] if the value found is not a `T`.
    fn get_with<T: Any + Send + Sync>(&self, request: &Request<'_>) -> DiResult<Arc<T>> {
        downcast(self.resolve_any(request)?)
    }

    /// Like [`get`](Self::get) but returns `Ok(None)` when nothing matches.
    fn try_get<T: Any + Send + Sync>(&self) -> DiResult<Option<Arc<T>>> {
        self.try_get_with(&Request::of::<T>())
    }

    /// Like [`get_with`](Self::get_with) but returns `Ok(None)` when nothing matches.
    fn try_get_with<T: Any + Send + Sync>(&self, request: &Request<'_>) -> DiResult<Option<Arc<T>>> {
        self.try_resolve_any(request)?.map(downcast::<T>).transpose()
    }

    /// Runs `request`, returning `default` when nothing matches.
    ///
    /// Only "not found" is replaced by the default; factory failures are
    /// still returned.
    ///
    /// ```
    /// use ferrous_wire::{Request, Resolver, ServiceRegistry};
    /// use std::sync::Arc;
    ///
    /// let container = ServiceRegistry::new().create_container();
    /// let limit = container.get_or(&Request::of::<u64>(), Arc::new(10u64)).unwrap();
    /// assert_eq!(*limit, 10);
    /// ```
    fn get_or<T: Any + Send + Sync>(&self, request: &Request<'_>, default: Arc<T>) -> DiResult<Arc<T>> {
        Ok(self.try_get_with(request)?.unwrap_or(default))
    }

    /// Resolves `T`, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if `T` cannot be resolved.
    fn get_required<T: Any + Send + Sync>(&self) -> Arc<T> {
        match self.get::<T>() {
            Ok(value) => value,
            Err(error) => panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), error),
        }
    }

    /// Resolves the trait object `T`.
    fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        self.get_trait_with(&Request::of::<T>())
    }

    /// Runs `request` and reads the result as the trait object `T`.
    fn get_trait_with<T: ?Sized + Send + Sync + 'static>(&self, request: &Request<'_>) -> DiResult<Arc<T>> {
        downcast_trait(self.resolve_any(request)?)
    }

    /// Resolves the trait object `T`, panicking on failure.
    ///
    /// # Panics
    ///
    /// Panics if `T` cannot be resolved.
    fn get_required_trait<T: ?Sized + Send + Sync + 'static>(&self) -> Arc<T> {
        match self.get_trait::<T>() {
            Ok(value) => value,
            Err(error) => panic!("Failed to resolve {}: {}", std::any::type_name::<T>(), error),
        }
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}
