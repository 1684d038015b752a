//! # ferrous-wire
//!
//! Context-aware service container for Rust: a registry of factories that
//! are selected by the requested type, by the type of an ambient *context*
//! object and by name, with per-context caching of the results.
//!
//! ## Features
//!
//! - **Context-specific factories**: the same capability can be provided
//!   differently for a `FrenchCustomer` than for any other `Customer`
//! - **Specificity matching**: the closest declared supertype wins, for
//!   both the context and the requested type
//! - **Per-context caching**: each factory runs at most once per container
//!   lineage and context; caches are released when the context is dropped
//! - **Seeding**: values obtained elsewhere (the incoming request) can be
//!   put into a container before anything is resolved
//! - **Dependency descriptors**: explicit field lists for auto-wiring
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_wire::{Binding, Context, Resolver, ServiceRegistry};
//!
//! struct Customer { name: String }
//! struct FrenchCustomer { name: String }
//!
//! struct Greeter { greeting: &'static str }
//!
//! impl Greeter {
//!     fn greet(&self, name: &str) -> String {
//!         format!("{} {} !!", self.greeting, name)
//!     }
//! }
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register_factory(Binding::of::<Greeter>(), |_| Greeter { greeting: "Hello" });
//! registry.register_factory(
//!     Binding::of::<Greeter>().in_context::<FrenchCustomer>(),
//!     |_| Greeter { greeting: "Bonjour" },
//! );
//!
//! // One container per request.
//! let container = registry.create_container();
//!
//! let mary = Context::new(Customer { name: "Mary".into() });
//! let henri = Context::new(FrenchCustomer { name: "Henri".into() });
//!
//! assert_eq!(container.get_in::<Greeter>(&mary).unwrap().greet("Mary"), "Hello Mary !!");
//! assert_eq!(container.get_in::<Greeter>(&henri).unwrap().greet("Henri"), "Bonjour Henri !!");
//! ```
//!
//! ## Type hierarchy
//!
//! Rust has no inheritance, so supertype relationships used for matching
//! are declared on the registry with
//! [`declare_subtype`](ServiceRegistry::declare_subtype). Trait objects
//! (`dyn Repository`) serve as interfaces.
//!
//! ## Cargo features
//!
//! - `ahash`: faster hashing in the indexes
//! - `config`: typed settings loaded from JSON, YAML, files or the
//!   environment and registered as singletons

pub mod container;
pub mod descriptors;
pub mod error;
pub mod inject;
pub mod key;
pub mod lattice;
pub mod observer;
pub mod registry;
pub mod traits;

#[cfg(feature = "config")]
pub mod config;

mod cache;
mod context;
mod index;
mod internal;
mod registration;

pub use container::{Request, ServiceContainer, WeakContainer};
pub use context::Context;
pub use descriptors::FactoryDescriptor;
pub use error::{BoxError, DiError, DiResult};
pub use inject::{Injectable, InjectableBuilder, InjectedFields};
pub use key::{Binding, Capability, Lookup, RequestKey, Role, TypeKey};
pub use lattice::{Candidates, Lineage, TypeLattice};
pub use observer::{DiObserver, LoggingObserver, MetricsObserver};
pub use registration::{AnyArc, Factory, ServiceFactory, SingletonWrapper};
pub use registry::{RegistryModuleExt, ServiceModule, ServiceRegistry};
pub use traits::{Resolver, ResolverCore};

#[cfg(feature = "config")]
pub use config::{load_settings, SettingsSource};
