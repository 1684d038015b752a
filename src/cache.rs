//! Per-context instance cache.
//!
//! One [`ContextCache`] is shared by a container and every container derived
//! from it through `bind`. It keeps one polymorphic index per distinct
//! context identity plus one for the unbound ("none") context, which holds
//! context-independent results and values seeded through `set`.
//!
//! The goal is to keep cached services alive for
//! `min(context lifetime, cache lifetime)`. Buckets observe their context
//! through a `Weak` reference, so the cache never extends a context's life.
//! Rust gives no callback when the context goes away, so buckets whose
//! context has been dropped are pruned at the next cache access for a context
//! without a bucket, when a bound container is dropped, and on explicit
//! purges. Pruned buckets are dropped after the lock is released, so
//! services may touch the container from their `Drop`.

use parking_lot::Mutex;

use crate::context::{Context, ContextId, Tracker};
use crate::index::PolymorphicIndex;
use crate::internal::Map;
use crate::registration::AnyArc;

/// Where a cached value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Provenance {
    /// Put there by `ServiceContainer::set`
    Seeded,
    /// Produced by a registered factory
    Constructed,
}

#[derive(Clone)]
pub(crate) struct CachedValue {
    pub(crate) value: AnyArc,
    pub(crate) provenance: Provenance,
}

impl CachedValue {
    pub(crate) fn seeded(value: AnyArc) -> Self {
        Self {
            value,
            provenance: Provenance::Seeded,
        }
    }

    pub(crate) fn constructed(value: AnyArc) -> Self {
        Self {
            value,
            provenance: Provenance::Constructed,
        }
    }

    pub(crate) fn is_seeded(&self) -> bool {
        self.provenance == Provenance::Seeded
    }
}

pub(crate) type InstanceIndex = PolymorphicIndex<CachedValue>;

struct Bucket {
    tracker: Tracker,
    index: InstanceIndex,
}

#[derive(Default)]
struct CacheState {
    unbound: InstanceIndex,
    contexts: Map<ContextId, Bucket>,
}

impl CacheState {
    /// Unlinks the buckets of dropped contexts; the caller drops them.
    fn prune(&mut self) -> Vec<Bucket> {
        let dead: Vec<ContextId> = self
            .contexts
            .iter()
            .filter(|(_, bucket)| !bucket.tracker.is_alive())
            .map(|(id, _)| *id)
            .collect();
        dead.iter().filter_map(|id| self.contexts.remove(id)).collect()
    }
}

fn report_pruned(pruned: &[Bucket]) {
    if !pruned.is_empty() {
        tracing::debug!(pruned = pruned.len(), "released caches of dropped contexts");
    }
}

/// Context cache manager shared by one container lineage.
pub(crate) struct ContextCache {
    state: Mutex<CacheState>,
}

impl ContextCache {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Runs `f` against the index for `context`, creating it on first use.
    ///
    /// The cache lock is held while `f` runs, so `f` must not call back into
    /// the container.
    pub(crate) fn with_index<R>(
        &self,
        context: Option<&Context>,
        f: impl FnOnce(&mut InstanceIndex) -> R,
    ) -> R {
        let mut state = self.state.lock();
        let Some(context) = context else {
            return f(&mut state.unbound);
        };

        let id = context.id();
        let pruned = if state.contexts.contains_key(&id) {
            Vec::new()
        } else {
            state.prune()
        };

        let bucket = state.contexts.entry(id).or_insert_with(|| {
            tracing::trace!(
                context = context.type_name(),
                tracked = context.is_tracked(),
                "creating context cache"
            );
            Bucket {
                tracker: context.tracker(),
                index: InstanceIndex::new(),
            }
        });
        let result = f(&mut bucket.index);
        drop(state);
        report_pruned(&pruned);
        result
    }

    /// Runs `f` against the index for `context` if it already exists.
    ///
    /// A miss on a context prunes dropped contexts, since a new bucket is
    /// usually about to be created.
    pub(crate) fn read_index<R>(
        &self,
        context: Option<&Context>,
        f: impl FnOnce(&InstanceIndex) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        let Some(context) = context else {
            return Some(f(&state.unbound));
        };
        if let Some(bucket) = state.contexts.get(&context.id()) {
            return Some(f(&bucket.index));
        }
        let pruned = state.prune();
        drop(state);
        report_pruned(&pruned);
        None
    }

    /// Drops the buckets of every context that has been dropped.
    pub(crate) fn purge(&self) -> usize {
        let pruned = self.state.lock().prune();
        report_pruned(&pruned);
        pruned.len()
    }

    /// Like [`purge`](Self::purge), but gives up if the cache is busy.
    ///
    /// Used from `Drop`, which may run while this thread holds the lock.
    pub(crate) fn try_purge(&self) {
        let Some(mut state) = self.state.try_lock() else {
            return;
        };
        let pruned = state.prune();
        drop(state);
        report_pruned(&pruned);
    }

    /// Drops the bucket for `context` immediately.
    pub(crate) fn release(&self, context: &Context) -> bool {
        let removed = self.state.lock().contexts.remove(&context.id());
        let released = removed.is_some();
        drop(removed);
        if released {
            tracing::debug!(context = context.type_name(), "released context cache");
        }
        released
    }

    /// Number of live per-context buckets, excluding the unbound one.
    pub(crate) fn tracked_contexts(&self) -> usize {
        let mut state = self.state.lock();
        let pruned = state.prune();
        let live = state.contexts.len();
        drop(state);
        report_pruned(&pruned);
        live
    }

    #[cfg(test)]
    pub(crate) fn bucket_count(&self) -> usize {
        self.state.lock().contexts.len()
    }
}

impl Drop for ContextCache {
    fn drop(&mut self) {
        // Trackers are plain weak references; dropping them never touches
        // the contexts they observe.
        let state = self.state.get_mut();
        if !state.contexts.is_empty() {
            tracing::trace!(contexts = state.contexts.len(), "dropping context cache");
        }
    }
}
