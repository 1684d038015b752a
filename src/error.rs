//! Error types for the service container.

use std::error::Error as StdError;
use std::sync::Arc;

use crate::key::RequestKey;

/// Boxed error type carried by [`DiError::Construction`].
pub type BoxError = Arc<dyn StdError + Send + Sync + 'static>;

/// Service container errors
///
/// Every failure crosses the `get`/`register_*` boundary untouched: the
/// container performs no retries and no silent recovery beyond the explicit
/// default supplied through [`try_resolve_any`](crate::ServiceContainer::try_resolve_any)
/// or [`get_or`](crate::Resolver::get_or).
///
/// # Examples
///
/// ```rust
/// use ferrous_wire::{DiError, Resolver, ServiceRegistry};
///
/// let registry = ServiceRegistry::new();
/// let container = registry.create_container();
/// match container.get::<String>() {
///     Err(DiError::NotFound(key)) => {
///         assert_eq!(key.service_name(), Some("alloc::string::String"));
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// No factory or cached instance satisfies the request
    #[error("Service not found: {0}")]
    NotFound(RequestKey),
    /// `set` would shadow an already-cached lookup result
    #[error("A service instance is already cached that would conflict with {0}")]
    SetConflict(String),
    /// A factory failed while building a service
    #[error("Construction of {service} failed: {source}")]
    Construction {
        /// Display name of the service being built
        service: &'static str,
        /// The factory's own error
        #[source]
        source: BoxError,
    },
    /// A registration was rejected at setup time
    #[error("Malformed registration: {0}")]
    MalformedRegistration(String),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// A dependency descriptor could not fill one of its fields
    #[error("Injection failed for field `{field}` on {target}: {source}")]
    Injection {
        /// Display name of the type being built
        target: &'static str,
        /// Field that could not be resolved
        field: &'static str,
        /// Why the field could not be resolved
        #[source]
        source: Box<DiError>,
    },
    /// Settings could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DiError {
    /// Wraps an error raised by a factory for the service `S`.
    ///
    /// Factories registered through
    /// [`register_fallible_factory`](crate::ServiceRegistry::register_fallible_factory)
    /// use this to report their own failures. Errors returned by nested
    /// lookups are already `DiError`s and should be propagated with `?`
    /// instead of being wrapped again.
    ///
    /// ```rust
    /// use ferrous_wire::DiError;
    ///
    /// struct Pool;
    /// let err = DiError::construction::<Pool, _>(std::io::Error::other("refused"));
    /// assert!(err.to_string().contains("refused"));
    /// ```
    pub fn construction<S, E>(source: E) -> Self
    where
        S: ?Sized + 'static,
        E: StdError + Send + Sync + 'static,
    {
        DiError::Construction {
            service: std::any::type_name::<S>(),
            source: Arc::new(source),
        }
    }

    /// Returns true if this is a [`DiError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiError::NotFound(_))
    }
}

/// Result type for container operations
pub type DiResult<T> = Result<T, DiError>;
