//! Registration descriptors for introspection and diagnostics.

use crate::key::Capability;
use crate::registration::FactoryRecord;

/// Describes one factory registration.
///
/// Useful for checking at startup that the expected capabilities are wired,
/// and for dumping the registry when a lookup unexpectedly fails.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Binding, Capability, ServiceRegistry};
///
/// struct AdminArea;
/// struct Widget;
///
/// let mut registry = ServiceRegistry::new();
/// registry.register_factory(Binding::of::<Widget>().in_context::<AdminArea>(), |_| Widget);
/// registry.register_singleton(Binding::anything().named("port"), 5432u16);
///
/// let descriptors = registry.descriptors();
/// assert_eq!(descriptors.len(), 2);
///
/// let widget = descriptors.iter().find(|d| d.service == Capability::of::<Widget>()).unwrap();
/// assert!(widget.wants_context);
/// assert!(!widget.singleton);
/// assert!(!widget.is_named());
///
/// let port = descriptors.iter().find(|d| d.is_named()).unwrap();
/// assert_eq!(port.name, "port");
/// assert_eq!(port.context, Capability::Anything);
/// assert!(port.singleton);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryDescriptor {
    /// Requested capability the factory answers
    pub service: Capability,
    /// Context capability it was registered for (`Anything` when unconstrained)
    pub context: Capability,
    /// Name discriminator
    pub name: String,
    /// True if a context constraint was given at registration
    pub wants_context: bool,
    /// True if the factory always returns one pre-built instance
    pub singleton: bool,
}

impl FactoryDescriptor {
    pub(crate) fn from_record(record: &FactoryRecord, name: &str) -> Self {
        Self {
            service: record.service,
            context: record.context,
            name: name.to_owned(),
            wants_context: record.wants_context,
            singleton: record.factory.is_singleton(),
        }
    }

    /// True if the registration has a non-empty name.
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    /// Display name of the requested capability.
    pub fn type_name(&self) -> &'static str {
        self.service.display_name()
    }
}
