//! Capability keys: the data that identifies a registration point.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Runtime identity of a Rust type used as a service or context descriptor.
///
/// Any `'static` type qualifies, including unsized trait objects, so
/// `TypeKey::of::<dyn Repository>()` names an abstract interface the same
/// way `TypeKey::of::<SqlRepository>()` names a concrete type.
///
/// Equality and hashing look at the `TypeId` only; the name is carried for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for the type `T`.
    #[inline(always)]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The `std::any::type_name` of the type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type constraint attached to a registration.
///
/// Used uniformly for both the requested type and the context type of an
/// entry.
///
/// - **Anything**: matches every query, including a query with no context
/// - **Subtype**: matches the type itself and every declared subtype of it
/// - **Exact**: matches the type itself only
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Capability, TypeKey};
///
/// struct Customer;
///
/// assert_eq!(Capability::of::<Customer>(), Capability::Subtype(TypeKey::of::<Customer>()));
/// assert_ne!(Capability::of::<Customer>(), Capability::exact::<Customer>());
/// assert_eq!(Capability::Anything.type_key(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Matches any type, or no type at all
    Anything,
    /// Matches exactly this runtime type
    Exact(TypeKey),
    /// Matches this type or any declared subtype of it
    Subtype(TypeKey),
}

impl Capability {
    /// `Subtype` constraint for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Capability::Subtype(TypeKey::of::<T>())
    }

    /// `Exact` constraint for `T`.
    pub fn exact<T: ?Sized + 'static>() -> Self {
        Capability::Exact(TypeKey::of::<T>())
    }

    /// The constrained type, or `None` for `Anything`.
    pub fn type_key(&self) -> Option<TypeKey> {
        match self {
            Capability::Anything => None,
            Capability::Exact(ty) | Capability::Subtype(ty) => Some(*ty),
        }
    }

    /// Human-readable name for diagnostics.
    pub fn display_name(&self) -> &'static str {
        match self {
            Capability::Anything => "*",
            Capability::Exact(ty) | Capability::Subtype(ty) => ty.name(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Anything => f.write_str("*"),
            Capability::Exact(ty) => write!(f, "={}", ty),
            Capability::Subtype(ty) => write!(f, "{}", ty),
        }
    }
}

/// Marker role of an index entry.
///
/// Lets producers and already-built values live in the same kind of index
/// without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The entry produces instances
    Factory,
    /// The entry is an already-built value
    Instance,
}

/// Registration point for a factory, singleton or seeded value.
///
/// A binding names the requested capability, an optional context
/// constraint and a name. Leaving the context unset means the entry does
/// not care about the caller's context at all; such factories are looked
/// up and cached context-independently.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Binding, Capability};
///
/// struct Greeter;
/// struct FrenchCustomer;
///
/// let binding = Binding::of::<Greeter>().in_context::<FrenchCustomer>().named("formal");
/// assert_eq!(binding.service(), Capability::of::<Greeter>());
/// assert_eq!(binding.context(), Some(Capability::of::<FrenchCustomer>()));
/// assert_eq!(binding.name(), "formal");
///
/// let anything = Binding::anything().named("db");
/// assert_eq!(anything.service(), Capability::Anything);
/// assert_eq!(anything.context(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    service: Capability,
    context: Option<Capability>,
    name: String,
}

impl Binding {
    /// Binding for the requested type `T` (and its declared subtypes).
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::for_capability(Capability::of::<T>())
    }

    /// Binding for exactly the requested type `T`.
    pub fn exact<T: ?Sized + 'static>() -> Self {
        Self::for_capability(Capability::exact::<T>())
    }

    /// Binding that answers a request for any type.
    pub fn anything() -> Self {
        Self::for_capability(Capability::Anything)
    }

    /// Binding for an explicit capability.
    pub fn for_capability(service: Capability) -> Self {
        Self {
            service,
            context: None,
            name: String::new(),
        }
    }

    /// Restricts the binding to contexts of type `C` or its subtypes.
    pub fn in_context<C: ?Sized + 'static>(self) -> Self {
        self.with_context(Capability::of::<C>())
    }

    /// Restricts the binding to contexts whose runtime type is exactly `C`.
    pub fn in_exact_context<C: ?Sized + 'static>(self) -> Self {
        self.with_context(Capability::exact::<C>())
    }

    /// Requires some context to be bound, of any type.
    pub fn in_any_context(self) -> Self {
        self.with_context(Capability::Anything)
    }

    /// Sets an explicit context constraint.
    pub fn with_context(mut self, context: Capability) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the name discriminator.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The requested capability.
    pub fn service(&self) -> Capability {
        self.service
    }

    /// The context constraint, `None` when the binding is context-independent.
    pub fn context(&self) -> Option<Capability> {
        self.context
    }

    /// The context constraint with "none" normalized to `Anything`.
    pub fn context_capability(&self) -> Capability {
        self.context.unwrap_or(Capability::Anything)
    }

    /// The name discriminator (empty by default).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if a context constraint was supplied.
    pub fn wants_context(&self) -> bool {
        self.context.is_some()
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.service)?;
        if let Some(context) = &self.context {
            write!(f, " in context {}", context)?;
        }
        if !self.name.is_empty() {
            write!(f, " named {:?}", self.name)?;
        }
        Ok(())
    }
}

/// Type-level query against the registry, used by
/// [`find_factory`](crate::ServiceRegistry::find_factory).
///
/// Unlike a runtime [`Request`](crate::Request) it names the context by type
/// instead of carrying a context object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lookup {
    pub(crate) service: Option<TypeKey>,
    pub(crate) context: Option<TypeKey>,
    pub(crate) name: String,
}

impl Lookup {
    /// Query for the requested type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            service: Some(TypeKey::of::<T>()),
            ..Self::default()
        }
    }

    /// Query that only matches registrations for any type.
    pub fn anything() -> Self {
        Self::default()
    }

    /// Looks up as if a context of type `C` were bound.
    pub fn context_type<C: ?Sized + 'static>(mut self) -> Self {
        self.context = Some(TypeKey::of::<C>());
        self
    }

    /// Sets the name discriminator.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// The (requested type, context type, name) triple of one runtime lookup.
///
/// Carried by [`DiError::NotFound`](crate::DiError::NotFound) and passed to
/// observers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub(crate) service: Option<TypeKey>,
    pub(crate) context: Option<TypeKey>,
    pub(crate) name: String,
}

impl RequestKey {
    /// Name of the requested type, `None` for a request for anything.
    pub fn service_name(&self) -> Option<&'static str> {
        self.service.map(|ty| ty.name())
    }

    /// Name of the bound context's runtime type, if any.
    pub fn context_name(&self) -> Option<&'static str> {
        self.context.map(|ty| ty.name())
    }

    /// The name discriminator.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.service {
            Some(ty) => write!(f, "{}", ty)?,
            None => f.write_str("*")?,
        }
        if let Some(context) = self.context {
            write!(f, " in context {}", context)?;
        }
        if !self.name.is_empty() {
            write!(f, " named {:?}", self.name)?;
        }
        Ok(())
    }
}
