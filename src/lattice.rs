//! Declared subtype relationships between service and context types.
//!
//! Rust has no inheritance, so the container learns the type hierarchy from
//! explicit declarations made at setup time. A type may have any number of
//! supertypes, which covers a struct implementing several interfaces as well
//! as interface refinement (`dyn AdminRoles` refining `dyn UserRoles`).

use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::internal::Map;
use crate::key::{Capability, TypeKey};

/// Ordered ancestry of a type, nearest first.
pub type Lineage = SmallVec<[TypeKey; 8]>;

/// Candidate capabilities for one query, most specific first.
pub type Candidates = SmallVec<[Capability; 10]>;

/// Subtype graph used for specificity matching.
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{Capability, TypeKey, TypeLattice};
///
/// struct Customer;
/// struct FrenchCustomer;
///
/// let mut lattice = TypeLattice::new();
/// lattice.declare(TypeKey::of::<FrenchCustomer>(), TypeKey::of::<Customer>()).unwrap();
///
/// let candidates = lattice.candidates(Some(TypeKey::of::<FrenchCustomer>()));
/// assert_eq!(
///     candidates.as_slice(),
///     &[
///         Capability::exact::<FrenchCustomer>(),
///         Capability::of::<FrenchCustomer>(),
///         Capability::of::<Customer>(),
///         Capability::Anything,
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct TypeLattice {
    parents: Map<TypeKey, SmallVec<[TypeKey; 4]>>,
}

impl TypeLattice {
    /// Creates an empty lattice where every type only matches itself.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `sub` is a subtype of (or implements) `sup`.
    ///
    /// Returns `Ok(false)` if the edge was already known. Fails with
    /// [`DiError::MalformedRegistration`] if the edge is reflexive or would
    /// close a cycle.
    pub fn declare(&mut self, sub: TypeKey, sup: TypeKey) -> DiResult<bool> {
        if sub == sup {
            return Err(DiError::MalformedRegistration(format!(
                "{} cannot be declared a subtype of itself",
                sub
            )));
        }
        if self.is_subtype(sup, sub) {
            return Err(DiError::MalformedRegistration(format!(
                "declaring {} a subtype of {} would create a cycle",
                sub, sup
            )));
        }

        let parents = self.parents.entry(sub).or_default();
        if parents.contains(&sup) {
            return Ok(false);
        }
        parents.push(sup);
        Ok(true)
    }

    /// Direct supertypes of `ty`, in declaration order.
    pub fn supertypes(&self, ty: TypeKey) -> &[TypeKey] {
        self.parents.get(&ty).map(|p| p.as_slice()).unwrap_or(&[])
    }

    /// True if `sub` equals `sup` or reaches it through declared edges.
    pub fn is_subtype(&self, sub: TypeKey, sup: TypeKey) -> bool {
        self.lineage(sub).contains(&sup)
    }

    /// `ty` followed by all of its ancestors.
    ///
    /// Ancestors are ordered by distance; ancestors at the same distance keep
    /// their declaration order. Each type appears once.
    pub fn lineage(&self, ty: TypeKey) -> Lineage {
        let mut lineage = Lineage::new();
        lineage.push(ty);
        let mut cursor = 0;
        while cursor < lineage.len() {
            let current = lineage[cursor];
            for parent in self.supertypes(current) {
                if !lineage.contains(parent) {
                    lineage.push(*parent);
                }
            }
            cursor += 1;
        }
        lineage
    }

    /// Capabilities that match a query for `ty`, most specific first.
    ///
    /// A query with no type is only matched by [`Capability::Anything`].
    pub fn candidates(&self, ty: Option<TypeKey>) -> Candidates {
        let mut candidates = Candidates::new();
        if let Some(ty) = ty {
            candidates.push(Capability::Exact(ty));
            candidates.extend(self.lineage(ty).into_iter().map(Capability::Subtype));
        }
        candidates.push(Capability::Anything);
        candidates
    }

    /// Number of declared edges.
    pub fn len(&self) -> usize {
        self.parents.values().map(|p| p.len()).sum()
    }

    /// True if no edges were declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
