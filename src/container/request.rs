//! Runtime lookup requests.

use crate::context::Context;
use crate::key::TypeKey;

/// Which context a request runs under.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ContextArg<'a> {
    /// Whatever the container is bound to
    Bound,
    /// This context, or explicitly none
    Explicit(Option<&'a Context>),
}

/// One runtime lookup: requested type, context and name.
///
/// The requested type defaults to "anything" and the context to the one the
/// container is bound to. A request carrying a different context makes the
/// container rebind for that lookup only; the caches are shared either way.
///
/// ```rust
/// use ferrous_wire::{Binding, Context, Request, Resolver, ServiceRegistry};
///
/// struct Customer;
/// struct Db { url: &'static str }
///
/// let mut registry = ServiceRegistry::new();
/// registry.register_singleton(Binding::anything().named("db"), Db { url: "sqlite::memory:" });
///
/// let container = registry.create_container();
/// let customer = Context::new(Customer);
/// let db = container
///     .get_with::<Db>(&Request::anything().named("db").in_context(&customer))
///     .unwrap();
/// assert_eq!(db.url, "sqlite::memory:");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    service: Option<TypeKey>,
    context: ContextArg<'a>,
    name: &'a str,
}

impl<'a> Request<'a> {
    /// Request for `T` (or anything registered for a supertype of `T`).
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::for_type(Some(TypeKey::of::<T>()))
    }

    /// Request that is only answered by registrations made for any type.
    pub fn anything() -> Self {
        Self::for_type(None)
    }

    /// Request for an explicit type key, `None` meaning anything.
    pub fn for_type(service: Option<TypeKey>) -> Self {
        Self {
            service,
            context: ContextArg::Bound,
            name: "",
        }
    }

    /// Sets the name discriminator.
    pub fn named(mut self, name: &'a str) -> Self {
        self.name = name;
        self
    }

    /// Runs the lookup under `context` instead of the bound one.
    pub fn in_context(mut self, context: &'a Context) -> Self {
        self.context = ContextArg::Explicit(Some(context));
        self
    }

    /// Runs the lookup with no context, whatever the container is bound to.
    pub fn unbound(mut self) -> Self {
        self.context = ContextArg::Explicit(None);
        self
    }

    /// Runs the lookup under `context`, `None` meaning no context.
    pub fn with_context(mut self, context: Option<&'a Context>) -> Self {
        self.context = ContextArg::Explicit(context);
        self
    }

    /// The requested type, `None` for anything.
    pub fn service(&self) -> Option<TypeKey> {
        self.service
    }

    /// The name discriminator.
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub(crate) fn context_arg(&self) -> ContextArg<'a> {
        self.context
    }
}
