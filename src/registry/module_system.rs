//! Modular registration.
//!
//! Each part of an application exposes one bootstrap type that registers its
//! factories. Modules run in the order they are added, so overwrite behavior
//! between modules is deterministic.

use crate::{DiResult, ServiceRegistry};

/// A unit of registrations.
///
/// # Example
///
/// ```rust
/// use ferrous_wire::{Binding, DiResult, Resolver, ServiceModule, ServiceRegistry};
///
/// struct Settings { punctuation: &'static str }
/// struct Greeter { greeting: String }
///
/// struct GreetingModule;
///
/// impl ServiceModule for GreetingModule {
///     fn register_services(self, registry: &mut ServiceRegistry) -> DiResult<()> {
///         registry.register_singleton(Binding::of::<Settings>(), Settings { punctuation: "!!" });
///         registry.register_fallible_factory(Binding::of::<Greeter>(), |container| {
///             let settings = container.get::<Settings>()?;
///             Ok(Greeter { greeting: format!("Hello {}", settings.punctuation) })
///         });
///         Ok(())
///     }
/// }
///
/// # fn main() -> DiResult<()> {
/// let mut registry = ServiceRegistry::new();
/// registry.add_module(GreetingModule)?;
/// let container = registry.create_container();
/// assert_eq!(container.get::<Greeter>()?.greeting, "Hello !!");
/// # Ok(())
/// # }
/// ```
pub trait ServiceModule {
    /// Registers this module's factories.
    fn register_services(self, registry: &mut ServiceRegistry) -> DiResult<()>;
}

impl<F> ServiceModule for F
where
    F: FnOnce(&mut ServiceRegistry) -> DiResult<()>,
{
    fn register_services(self, registry: &mut ServiceRegistry) -> DiResult<()> {
        self(registry)
    }
}

/// By-value module chaining.
///
/// ```rust
/// use ferrous_wire::{DiResult, RegistryModuleExt, ServiceModule, ServiceRegistry};
///
/// struct StorageModule;
/// impl ServiceModule for StorageModule {
///     fn register_services(self, _: &mut ServiceRegistry) -> DiResult<()> { Ok(()) }
/// }
///
/// # fn main() -> DiResult<()> {
/// let registry = ServiceRegistry::new()
///     .with_module(StorageModule)?
///     .with_module(|registry: &mut ServiceRegistry| -> DiResult<()> {
///         registry.declare_subtype::<u8, u16>()?;
///         Ok(())
///     })?;
/// assert_eq!(registry.lattice().len(), 1);
/// # Ok(())
/// # }
/// ```
pub trait RegistryModuleExt: Sized {
    /// Runs `module` and returns the registry for further chaining.
    fn with_module<M: ServiceModule>(self, module: M) -> DiResult<Self>;
}

impl RegistryModuleExt for ServiceRegistry {
    fn with_module<M: ServiceModule>(mut self, module: M) -> DiResult<Self> {
        module.register_services(&mut self)?;
        Ok(self)
    }
}
