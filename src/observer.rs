//! Diagnostic observers for container lookups.
//!
//! Observers are attached to a registry and shared by every container created
//! from it. They see each lookup that reaches a factory, each cache hit and
//! each failed construction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::RequestKey;

/// Observer trait for container lookup events.
///
/// Calls are made synchronously on the thread performing the lookup, never
/// while the container holds its cache lock. Keep implementations cheap.
///
/// # Examples
///
/// ```
/// use ferrous_wire::{Binding, DiError, DiObserver, RequestKey, Resolver, ServiceRegistry};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder(Mutex<Vec<String>>);
///
/// impl DiObserver for Recorder {
///     fn resolving(&self, key: &RequestKey) {
///         self.0.lock().unwrap().push(format!("building {}", key));
///     }
///
///     fn resolved(&self, _key: &RequestKey, _duration: Duration) {}
///
///     fn factory_failed(&self, _key: &RequestKey, _error: &DiError) {}
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let mut registry = ServiceRegistry::new();
/// registry.add_observer(recorder.clone());
/// registry.register_factory(Binding::of::<u32>(), |_| 7u32);
///
/// let container = registry.create_container();
/// container.get::<u32>().unwrap();
/// container.get::<u32>().unwrap(); // cached, the factory is not called again
/// assert_eq!(recorder.0.lock().unwrap().len(), 1);
/// ```
pub trait DiObserver: Send + Sync {
    /// Called right before a factory is invoked.
    fn resolving(&self, key: &RequestKey);

    /// Called after a factory returned successfully.
    ///
    /// `duration` covers the factory call, including any nested lookups it
    /// performed.
    fn resolved(&self, key: &RequestKey, duration: Duration);

    /// Called when a factory returned an error. The error is still
    /// propagated to the caller afterwards.
    fn factory_failed(&self, key: &RequestKey, error: &DiError);

    /// Called when a lookup was answered from a cache.
    fn cache_hit(&self, _key: &RequestKey) {}
}

/// Registered observers.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    pub(crate) fn resolving(&self, key: &RequestKey) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, key: &RequestKey, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    #[inline]
    pub(crate) fn factory_failed(&self, key: &RequestKey, error: &DiError) {
        for observer in &self.observers {
            observer.factory_failed(key, error);
        }
    }

    #[inline]
    pub(crate) fn cache_hit(&self, key: &RequestKey) {
        for observer in &self.observers {
            observer.cache_hit(key);
        }
    }
}

/// Observer that forwards every event to `tracing`.
///
/// Factory calls are logged at `debug`, cache hits at `trace` and failures
/// at `warn`.
///
/// ```
/// use ferrous_wire::{LoggingObserver, ServiceRegistry};
/// use std::sync::Arc;
///
/// let mut registry = ServiceRegistry::new();
/// registry.add_observer(Arc::new(LoggingObserver::with_prefix("checkout")));
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a logging observer with the default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "ferrous-wire".to_string(),
        }
    }

    /// Creates a logging observer whose events carry a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl DiObserver for LoggingObserver {
    fn resolving(&self, key: &RequestKey) {
        tracing::debug!(prefix = %self.prefix, service = %key, "resolving");
    }

    fn resolved(&self, key: &RequestKey, duration: Duration) {
        tracing::debug!(prefix = %self.prefix, service = %key, ?duration, "resolved");
    }

    fn factory_failed(&self, key: &RequestKey, error: &DiError) {
        tracing::warn!(prefix = %self.prefix, service = %key, %error, "factory failed");
    }

    fn cache_hit(&self, key: &RequestKey) {
        tracing::trace!(prefix = %self.prefix, service = %key, "cache hit");
    }
}

/// Observer that counts events.
///
/// Useful in tests to check how many times factories actually ran.
#[derive(Default)]
pub struct MetricsObserver {
    constructions: AtomicU64,
    construction_nanos: AtomicU64,
    cache_hits: AtomicU64,
    failures: AtomicU64,
}

impl MetricsObserver {
    /// Creates an observer with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful factory calls.
    pub fn construction_count(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }

    /// Number of lookups answered from a cache.
    pub fn cache_hit_count(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Number of factory calls that returned an error.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Total time spent in successful factory calls.
    pub fn total_construction_time(&self) -> Duration {
        Duration::from_nanos(self.construction_nanos.load(Ordering::Relaxed))
    }

    /// Mean time of a successful factory call, `None` before the first one.
    pub fn average_construction_time(&self) -> Option<Duration> {
        let count = self.construction_count();
        if count == 0 {
            return None;
        }
        let nanos = self.construction_nanos.load(Ordering::Relaxed);
        Some(Duration::from_nanos(nanos / count))
    }

    /// Resets all counters.
    pub fn reset(&self) {
        self.constructions.store(0, Ordering::Relaxed);
        self.construction_nanos.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
    }
}

impl DiObserver for MetricsObserver {
    fn resolving(&self, _key: &RequestKey) {}

    fn resolved(&self, _key: &RequestKey, duration: Duration) {
        self.constructions.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        // Saturates instead of wrapping; the closure always returns Some.
        let _ = self
            .construction_nanos
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                Some(total.saturating_add(nanos))
            });
    }

    fn factory_failed(&self, _key: &RequestKey, _error: &DiError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn cache_hit(&self, _key: &RequestKey) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::TypeKey;

    fn key() -> RequestKey {
        RequestKey {
            service: Some(TypeKey::of::<String>()),
            context: None,
            name: String::new(),
        }
    }

    #[test]
    fn metrics_observer_counts_events() {
        let observer = MetricsObserver::new();
        assert_eq!(observer.construction_count(), 0);
        assert!(observer.average_construction_time().is_none());

        observer.resolved(&key(), Duration::from_millis(10));
        observer.resolved(&key(), Duration::from_millis(20));
        observer.cache_hit(&key());
        observer.factory_failed(&key(), &DiError::NotFound(key()));

        assert_eq!(observer.construction_count(), 2);
        assert_eq!(observer.cache_hit_count(), 1);
        assert_eq!(observer.failure_count(), 1);
        assert_eq!(observer.average_construction_time(), Some(Duration::from_millis(15)));

        observer.reset();
        assert_eq!(observer.construction_count(), 0);
        assert_eq!(observer.failure_count(), 0);
    }

    #[test]
    fn construction_time_saturates() {
        let observer = MetricsObserver::new();
        observer.resolved(&key(), Duration::MAX);
        observer.resolved(&key(), Duration::from_secs(1));

        assert_eq!(observer.total_construction_time(), Duration::from_nanos(u64::MAX));
        assert_eq!(
            observer.average_construction_time(),
            Some(Duration::from_nanos(u64::MAX / 2))
        );
    }

    #[test]
    fn observers_fan_out() {
        let metrics = Arc::new(MetricsObserver::new());
        let mut observers = Observers::default();
        assert!(!observers.has_observers());

        observers.add(metrics.clone());
        observers.add(Arc::new(LoggingObserver::new()));
        assert_eq!(observers.len(), 2);

        observers.resolving(&key());
        observers.resolved(&key(), Duration::from_millis(1));
        observers.cache_hit(&key());
        assert_eq!(metrics.construction_count(), 1);
        assert_eq!(metrics.cache_hit_count(), 1);
    }
}
