//! Context objects bound to a container.
//!
//! A context is an ambient business object (the current request's customer,
//! the area of the site being rendered, ...) that narrows which factory or
//! cached instance applies. Contexts are compared by identity, never by
//! value.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::key::TypeKey;

type AnyContext = dyn Any + Send + Sync;

/// Identity-compared handle to a context object.
///
/// Cloning a `Context` clones the handle, not the object; both clones refer
/// to the same identity. Contexts created from an `Arc` are tracked weakly
/// by the container cache and their cached services are released once the
/// last strong reference goes away. Contexts created from a `&'static`
/// reference cannot be tracked and keep their cache entry for the lifetime
/// of the cache.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::Context;
/// use std::sync::Arc;
///
/// struct Customer { name: String }
///
/// let mary = Arc::new(Customer { name: "Mary".to_string() });
/// let ctx = Context::from_arc(mary.clone());
///
/// assert_eq!(ctx.downcast_ref::<Customer>().unwrap().name, "Mary");
/// assert!(Arc::ptr_eq(&ctx.downcast::<Customer>().unwrap(), &mary));
///
/// // Identity, not equality
/// let other = Context::new(Customer { name: "Mary".to_string() });
/// assert!(ctx.ptr_eq(&ctx.clone()));
/// assert!(!ctx.ptr_eq(&other));
/// ```
#[derive(Clone)]
pub struct Context {
    value: ContextValue,
    ty: TypeKey,
}

#[derive(Clone)]
enum ContextValue {
    Shared(Arc<AnyContext>),
    Static(&'static AnyContext),
}

impl Context {
    /// Wraps `value` in a new shared context.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Uses an existing `Arc` as the context; identity is the `Arc`'s allocation.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value: ContextValue::Shared(value),
            ty: TypeKey::of::<T>(),
        }
    }

    /// Uses a static reference as the context.
    ///
    /// Static contexts cannot be tracked weakly, so their cache entries are
    /// never released automatically. Use
    /// [`release_context`](crate::ServiceContainer::release_context) to drop
    /// them explicitly.
    pub fn from_static<T: Any + Send + Sync>(value: &'static T) -> Self {
        Self {
            value: ContextValue::Static(value),
            ty: TypeKey::of::<T>(),
        }
    }

    /// Runtime type of the context object.
    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    /// Name of the context's runtime type.
    pub fn type_name(&self) -> &'static str {
        self.ty.name()
    }

    /// Borrows the context as `T` if that is its runtime type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match &self.value {
            ContextValue::Shared(value) => value.downcast_ref::<T>(),
            ContextValue::Static(value) => value.downcast_ref::<T>(),
        }
    }

    /// Returns a new strong reference to the context as `T`.
    ///
    /// Always `None` for static contexts.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match &self.value {
            ContextValue::Shared(value) => value.clone().downcast::<T>().ok(),
            ContextValue::Static(_) => None,
        }
    }

    /// True if both handles refer to the same context object.
    pub fn ptr_eq(&self, other: &Context) -> bool {
        self.id() == other.id()
    }

    /// True if the container can notice when this context is dropped.
    pub fn is_tracked(&self) -> bool {
        matches!(self.value, ContextValue::Shared(_))
    }

    pub(crate) fn id(&self) -> ContextId {
        let addr = match &self.value {
            ContextValue::Shared(value) => Arc::as_ptr(value) as *const () as usize,
            ContextValue::Static(value) => *value as *const AnyContext as *const () as usize,
        };
        ContextId {
            addr,
            ty: self.ty.type_id(),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        let value = match &self.value {
            ContextValue::Shared(value) => WeakContextValue::Shared(Arc::downgrade(value)),
            ContextValue::Static(value) => WeakContextValue::Static(*value),
        };
        WeakContext { value, ty: self.ty }
    }

    pub(crate) fn tracker(&self) -> Tracker {
        match &self.value {
            ContextValue::Shared(value) => Tracker::Weak(Arc::downgrade(value)),
            ContextValue::Static(_) => Tracker::Pinned,
        }
    }
}

impl<T: Any + Send + Sync> From<Arc<T>> for Context {
    fn from(value: Arc<T>) -> Self {
        Context::from_arc(value)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("type", &self.ty.name())
            .field("addr", &format_args!("{:#x}", self.id().addr))
            .field("tracked", &self.is_tracked())
            .finish()
    }
}

/// Context handle that does not keep the context alive.
#[derive(Clone)]
pub(crate) struct WeakContext {
    value: WeakContextValue,
    ty: TypeKey,
}

#[derive(Clone)]
enum WeakContextValue {
    Shared(Weak<AnyContext>),
    Static(&'static AnyContext),
}

impl WeakContext {
    pub(crate) fn upgrade(&self) -> Option<Context> {
        let value = match &self.value {
            WeakContextValue::Shared(weak) => ContextValue::Shared(weak.upgrade()?),
            WeakContextValue::Static(value) => ContextValue::Static(*value),
        };
        Some(Context { value, ty: self.ty })
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.ty.name()
    }
}

/// Identity of a context: its address plus its runtime type.
///
/// The type is part of the identity because distinct zero-sized statics may
/// share an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ContextId {
    addr: usize,
    ty: TypeId,
}

/// How the cache notices that a context has gone away.
pub(crate) enum Tracker {
    /// Observes a shared context without keeping it alive.
    ///
    /// Holding the weak reference also keeps the allocation reserved, so no
    /// new context can reuse the address while this tracker exists.
    Weak(Weak<AnyContext>),
    /// Cannot be observed; the entry lives as long as the cache.
    Pinned,
}

impl Tracker {
    pub(crate) fn is_alive(&self) -> bool {
        match self {
            Tracker::Weak(weak) => weak.strong_count() > 0,
            Tracker::Pinned => true,
        }
    }
}
