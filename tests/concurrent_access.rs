/// Concurrent access tests
///
/// One container lineage shared by several threads: every thread must end up
/// with the same cached instance, and factories may re-enter the container.

use ferrous_wire::{Binding, Context, Resolver, ServiceRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

// ===== Test Services =====

struct Counter {
    created_by: String,
}

struct Pool {
    size: usize,
}

struct Repository {
    pool: Arc<Pool>,
}

struct Tenant(u32);

// ===== Tests =====

#[test]
fn test_threads_observe_one_instance() {
    let constructions = Arc::new(AtomicUsize::new(0));
    let counter = constructions.clone();

    let mut registry = ServiceRegistry::new();
    registry.register_factory(Binding::of::<Counter>(), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Counter {
            created_by: format!("{:?}", thread::current().id()),
        }
    });

    let container = registry.create_container();
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.get::<Counter>().unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let first = &results[0];
    assert!(results.iter().all(|r| Arc::ptr_eq(r, first)));
    assert!(first.created_by.starts_with("ThreadId"));

    // Racing threads may each build one, but only one is ever handed out.
    let built = constructions.load(Ordering::SeqCst);
    assert!((1..=8).contains(&built));
    let _ = container.get::<Counter>().unwrap();
    assert_eq!(constructions.load(Ordering::SeqCst), built);
}

#[test]
fn test_factories_reenter_the_container_from_many_threads() {
    let mut registry = ServiceRegistry::new();
    registry.register_factory(Binding::of::<Pool>(), |_| Pool { size: 16 });
    registry.register_fallible_factory(Binding::of::<Repository>().in_context::<Tenant>(), |container| {
        Ok(Repository {
            pool: container.get::<Pool>()?,
        })
    });

    let container = registry.create_container();
    let handles: Vec<_> = (0..4)
        .map(|id| {
            let container = container.clone();
            thread::spawn(move || {
                let tenant = Context::new(Tenant(id));
                let repo = container.get_in::<Repository>(&tenant).unwrap();
                assert!(Arc::ptr_eq(&repo, &container.get_in::<Repository>(&tenant).unwrap()));
                assert_eq!(tenant.downcast_ref::<Tenant>().unwrap().0, id);
                repo.pool.clone()
            })
        })
        .collect();

    let pools: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(pools.iter().all(|p| Arc::ptr_eq(p, &pools[0])));
    assert_eq!(pools[0].size, 16);

    // Every tenant is gone, so is every per-tenant cache.
    assert_eq!(container.tracked_contexts(), 0);
}

#[test]
fn test_shared_context_across_threads() {
    let mut registry = ServiceRegistry::new();
    registry.register_factory(Binding::of::<Counter>().in_context::<Tenant>(), |container| {
        let tenant = container
            .context()
            .and_then(|ctx| ctx.downcast_ref::<Tenant>())
            .map_or(0, |tenant| tenant.0);
        Counter {
            created_by: format!("tenant-{}", tenant),
        }
    });

    let container = registry.create_container();
    let tenant = Context::new(Tenant(7));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let container = container.bind(Some(tenant.clone())).into_owned();
            thread::spawn(move || container.get::<Counter>().unwrap())
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    assert_eq!(results[0].created_by, "tenant-7");
}
