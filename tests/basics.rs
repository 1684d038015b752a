/// Basic registration and resolution tests
///
/// Singletons, factories, trait services, names and the typed lookup helpers,
/// all without any context bound.

use ferrous_wire::{Binding, DiError, Request, Resolver, ServiceRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===== Test Services =====

struct Greeter {
    greeting: String,
}

impl Greeter {
    fn greet(&self) -> String {
        format!("{} !!", self.greeting)
    }
}

trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;
}

struct EmailNotifier;

impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        "email"
    }
}

#[derive(Debug)]
struct Database {
    url: String,
}

struct UserRepository {
    db: Arc<Database>,
}

#[derive(Debug)]
struct ConnectionRefused;

impl std::fmt::Display for ConnectionRefused {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("connection refused")
    }
}

impl std::error::Error for ConnectionRefused {}

// ===== Tests =====

#[test]
fn test_singleton_greeter() {
    let mut registry = ServiceRegistry::new();
    registry.register_singleton(
        Binding::of::<Greeter>(),
        Greeter {
            greeting: "Hello".to_string(),
        },
    );

    let container = registry.create_container();
    let greeter = container.get::<Greeter>().unwrap();
    assert_eq!(greeter.greet(), "Hello !!");
}

#[test]
fn test_singleton_is_shared_across_containers() {
    let mut registry = ServiceRegistry::new();
    let instance = Arc::new(Greeter {
        greeting: "Hello".to_string(),
    });
    registry.register_shared_singleton(Binding::of::<Greeter>(), instance.clone());

    let first = registry.create_container().get::<Greeter>().unwrap();
    let second = registry.create_container().get::<Greeter>().unwrap();
    assert!(Arc::ptr_eq(&first, &instance));
    assert!(Arc::ptr_eq(&second, &instance));
}

#[test]
fn test_factory_runs_once_per_container() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut registry = ServiceRegistry::new();
    registry.register_factory(Binding::of::<Greeter>(), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Greeter {
            greeting: "Hello".to_string(),
        }
    });

    let container = registry.create_container();
    let a = container.get::<Greeter>().unwrap();
    let b = container.get::<Greeter>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A clone is the same lineage.
    let c = container.clone().get::<Greeter>().unwrap();
    assert!(Arc::ptr_eq(&a, &c));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A new container builds its own.
    let d = registry.create_container().get::<Greeter>().unwrap();
    assert!(!Arc::ptr_eq(&a, &d));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_factory_resolves_its_dependencies() {
    let mut registry = ServiceRegistry::new();
    registry.register_singleton(
        Binding::of::<Database>(),
        Database {
            url: "postgres://localhost".to_string(),
        },
    );
    registry.register_fallible_factory(Binding::of::<UserRepository>(), |container| {
        Ok(UserRepository {
            db: container.get::<Database>()?,
        })
    });

    let container = registry.create_container();
    let repo = container.get::<UserRepository>().unwrap();
    assert_eq!(repo.db.url, "postgres://localhost");
    assert!(Arc::ptr_eq(&repo.db, &container.get::<Database>().unwrap()));
}

#[test]
fn test_missing_dependency_propagates_unchanged() {
    let mut registry = ServiceRegistry::new();
    registry.register_fallible_factory(Binding::of::<UserRepository>(), |container| {
        Ok(UserRepository {
            db: container.get::<Database>()?,
        })
    });

    let container = registry.create_container();
    match container.get::<UserRepository>() {
        Err(DiError::NotFound(key)) => {
            assert_eq!(key.service_name(), Some(std::any::type_name::<Database>()));
        }
        other => panic!("expected NotFound for the database, got {:?}", other.err()),
    }
}

#[test]
fn test_failed_factory_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let mut registry = ServiceRegistry::new();
    registry.register_fallible_factory(Binding::of::<Database>(), move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(DiError::construction::<Database, _>(ConnectionRefused))
        } else {
            Ok(Database {
                url: "postgres://replica".to_string(),
            })
        }
    });

    let container = registry.create_container();
    match container.get::<Database>() {
        Err(DiError::Construction { service, source }) => {
            assert_eq!(service, std::any::type_name::<Database>());
            assert_eq!(source.to_string(), "connection refused");
        }
        other => panic!("expected a construction error, got {:?}", other.err()),
    }

    let db = container.get::<Database>().unwrap();
    assert_eq!(db.url, "postgres://replica");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_trait_services() {
    let mut registry = ServiceRegistry::new();
    registry.register_trait_factory::<dyn Notifier, _>(Binding::of::<dyn Notifier>(), |_| {
        Arc::new(EmailNotifier)
    });

    let container = registry.create_container();
    let notifier = container.get_trait::<dyn Notifier>().unwrap();
    assert_eq!(notifier.channel(), "email");
    assert!(Arc::ptr_eq(&notifier, &container.get_trait::<dyn Notifier>().unwrap()));
}

#[test]
fn test_trait_singleton() {
    let mut registry = ServiceRegistry::new();
    let notifier: Arc<dyn Notifier> = Arc::new(EmailNotifier);
    registry.register_trait_singleton(Binding::of::<dyn Notifier>(), notifier.clone());

    let resolved = registry.create_container().get_required_trait::<dyn Notifier>();
    assert!(Arc::ptr_eq(&resolved, &notifier));
}

#[test]
fn test_named_registrations_are_distinct() {
    let mut registry = ServiceRegistry::new();
    registry.register_singleton(
        Binding::of::<Database>().named("primary"),
        Database {
            url: "postgres://primary".to_string(),
        },
    );
    registry.register_singleton(
        Binding::of::<Database>().named("replica"),
        Database {
            url: "postgres://replica".to_string(),
        },
    );

    let container = registry.create_container();
    assert_eq!(container.get_named::<Database>("primary").unwrap().url, "postgres://primary");
    assert_eq!(container.get_named::<Database>("replica").unwrap().url, "postgres://replica");
    assert!(container.get::<Database>().unwrap_err().is_not_found());
}

#[test]
fn test_registration_for_anything() {
    let mut registry = ServiceRegistry::new();
    registry.register_singleton(Binding::anything().named("db_url"), "sqlite::memory:".to_string());

    let container = registry.create_container();
    let url = container
        .get_with::<String>(&Request::anything().named("db_url"))
        .unwrap();
    assert_eq!(*url, "sqlite::memory:");

    // Typed requests also reach it.
    assert_eq!(*container.get_named::<String>("db_url").unwrap(), "sqlite::memory:");

    // Reading it as the wrong type is a mismatch, not a miss.
    let err = container.get_named::<u32>("db_url").unwrap_err();
    assert!(matches!(err, DiError::TypeMismatch("u32")));
}

#[test]
fn test_reregistration_overwrites() {
    let mut registry = ServiceRegistry::new();
    registry.register_singleton(Binding::of::<u32>(), 1u32);
    registry.register_singleton(Binding::of::<u32>(), 2u32);

    assert_eq!(registry.len(), 1);
    assert_eq!(*registry.create_container().get::<u32>().unwrap(), 2);
}

#[test]
fn test_optional_lookups() {
    let mut registry = ServiceRegistry::new();
    registry.register_singleton(Binding::of::<u32>(), 7u32);

    let container = registry.create_container();
    assert_eq!(container.try_get::<u32>().unwrap().as_deref(), Some(&7));
    assert!(container.try_get::<u64>().unwrap().is_none());

    let fallback = container.get_or(&Request::of::<u64>(), Arc::new(10u64)).unwrap();
    assert_eq!(*fallback, 10);
    let present = container.get_or(&Request::of::<u32>(), Arc::new(0u32)).unwrap();
    assert_eq!(*present, 7);
}

#[test]
fn test_default_does_not_hide_factory_failures() {
    let mut registry = ServiceRegistry::new();
    registry.register_fallible_factory(Binding::of::<Database>(), |_| {
        Err::<Database, _>(DiError::construction::<Database, _>(ConnectionRefused))
    });

    let container = registry.create_container();
    let fallback = Arc::new(Database {
        url: "unused".to_string(),
    });
    let err = container.get_or(&Request::of::<Database>(), fallback).unwrap_err();
    assert!(matches!(err, DiError::Construction { .. }));
}

#[test]
#[should_panic(expected = "Failed to resolve")]
fn test_get_required_panics_when_missing() {
    let container = ServiceRegistry::new().create_container();
    let _ = container.get_required::<Database>();
}

#[test]
fn test_registry_changes_do_not_reach_existing_containers() {
    let mut registry = ServiceRegistry::new();
    let before = registry.create_container();
    registry.register_singleton(Binding::of::<u32>(), 1u32);

    assert!(before.get::<u32>().unwrap_err().is_not_found());
    assert_eq!(*registry.create_container().get::<u32>().unwrap(), 1);
}
