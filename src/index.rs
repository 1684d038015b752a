//! Polymorphic multi-key index.
//!
//! Entries are keyed by `(role, context capability) -> requested capability
//! -> name`. Lookups walk the candidate lists produced by the
//! [`TypeLattice`] so that a query for a subtype finds an entry registered
//! for one of its supertypes, preferring the closest one. Context
//! specificity is compared first, then requested-type specificity; names
//! must match exactly.

use crate::internal::Map;
use crate::key::{Capability, Role, TypeKey};
use crate::lattice::TypeLattice;

type NameMap<V> = Map<String, V>;
type ServiceMap<V> = Map<Capability, NameMap<V>>;

/// Multi-key store with best-match retrieval.
///
/// Used for factory registrations and for cached instances.
#[derive(Debug, Clone)]
pub(crate) struct PolymorphicIndex<V> {
    slots: Map<(Role, Capability), ServiceMap<V>>,
    len: usize,
}

impl<V> Default for PolymorphicIndex<V> {
    fn default() -> Self {
        Self {
            slots: Map::default(),
            len: 0,
        }
    }
}

impl<V> PolymorphicIndex<V> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stores `value` at the exact key, returning the value it replaced.
    ///
    /// Never fails; re-registering a key overwrites it.
    pub(crate) fn register(
        &mut self,
        role: Role,
        context: Capability,
        service: Capability,
        name: &str,
        value: V,
    ) -> Option<V> {
        let previous = self
            .slots
            .entry((role, context))
            .or_default()
            .entry(service)
            .or_default()
            .insert(name.to_owned(), value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Most specific entry matching the runtime context type and requested type.
    pub(crate) fn lookup(
        &self,
        lattice: &TypeLattice,
        role: Role,
        context: Option<TypeKey>,
        service: Option<TypeKey>,
        name: &str,
    ) -> Option<&V> {
        self.lookup_where(lattice, role, context, service, name, |_| true)
    }

    /// Most specific entry that also satisfies `accept`.
    ///
    /// Entries rejected by `accept` are skipped as if absent, so a less
    /// specific accepted entry can still win.
    pub(crate) fn lookup_where<F>(
        &self,
        lattice: &TypeLattice,
        role: Role,
        context: Option<TypeKey>,
        service: Option<TypeKey>,
        name: &str,
        accept: F,
    ) -> Option<&V>
    where
        F: Fn(&V) -> bool,
    {
        if self.len == 0 {
            return None;
        }
        let services = lattice.candidates(service);
        for context_cap in lattice.candidates(context) {
            let Some(slot) = self.slots.get(&(role, context_cap)) else {
                continue;
            };
            for service_cap in &services {
                let found = slot
                    .get(service_cap)
                    .and_then(|names| names.get(name))
                    .filter(|value| accept(*value));
                if found.is_some() {
                    return found;
                }
            }
        }
        None
    }

    /// Entry stored at exactly this key, without any subtype matching.
    pub(crate) fn get_exact(
        &self,
        role: Role,
        context: Capability,
        service: Capability,
        name: &str,
    ) -> Option<&V> {
        self.slots
            .get(&(role, context))
            .and_then(|services| services.get(&service))
            .and_then(|names| names.get(name))
    }

    /// All entries as `(role, context, service, name, value)`.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Role, Capability, Capability, &str, &V)> {
        self.slots.iter().flat_map(|((role, context), services)| {
            services.iter().flat_map(move |(service, names)| {
                names
                    .iter()
                    .map(move |(name, value)| (*role, *context, *service, name.as_str(), value))
            })
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }
}
