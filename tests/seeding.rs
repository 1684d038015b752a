/// Seeding tests
///
/// Values put into a container with `set` before resolution, and the
/// conflict check that keeps them from shadowing results already handed out.

use ferrous_wire::{Binding, Context, DiError, Request, Resolver, ServiceRegistry};
use std::sync::Arc;

// ===== Test Types =====

struct IncomingRequest {
    path: &'static str,
}

#[derive(Debug)]
struct Greeter {
    greeting: &'static str,
}

struct User {
    name: &'static str,
}

struct Admin {
    name: &'static str,
}

struct Customer;
struct FrenchCustomer;

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct FixedClock(u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

// ===== Tests =====

#[test]
fn test_seeded_value_is_resolved() {
    let container = ServiceRegistry::new().create_container();
    container
        .set(Binding::of::<IncomingRequest>(), IncomingRequest { path: "/checkout" })
        .unwrap();

    assert_eq!(container.get::<IncomingRequest>().unwrap().path, "/checkout");
}

#[test]
fn test_seeded_value_keeps_identity() {
    let container = ServiceRegistry::new().create_container();
    let request = Arc::new(IncomingRequest { path: "/cart" });
    container
        .set_shared(Binding::of::<IncomingRequest>(), request.clone())
        .unwrap();

    assert!(Arc::ptr_eq(&request, &container.get::<IncomingRequest>().unwrap()));
}

#[test]
fn test_seeded_value_is_visible_from_every_context() {
    let container = ServiceRegistry::new().create_container();
    let ctx = Context::new(Customer);
    let bound = container.bind(Some(ctx.clone()));

    // Seeding through a bound container still goes to the shared bucket.
    bound
        .set(Binding::of::<IncomingRequest>(), IncomingRequest { path: "/login" })
        .unwrap();

    assert_eq!(container.get::<IncomingRequest>().unwrap().path, "/login");
    assert_eq!(container.get_in::<IncomingRequest>(&ctx).unwrap().path, "/login");
    let other = Context::new(FrenchCustomer);
    assert_eq!(container.get_in::<IncomingRequest>(&other).unwrap().path, "/login");
}

#[test]
fn test_seeded_value_takes_precedence_over_factory() {
    let mut registry = ServiceRegistry::new();
    registry.register_factory(Binding::of::<Greeter>(), |_| Greeter { greeting: "Hello" });

    let container = registry.create_container();
    container
        .set(Binding::of::<Greeter>(), Greeter { greeting: "Howdy" })
        .unwrap();
    assert_eq!(container.get::<Greeter>().unwrap().greeting, "Howdy");

    // Other containers are unaffected.
    assert_eq!(registry.create_container().get::<Greeter>().unwrap().greeting, "Hello");
}

#[test]
fn test_seed_with_context_constraint() {
    let mut registry = ServiceRegistry::new();
    registry.declare_subtype::<FrenchCustomer, Customer>().unwrap();

    let container = registry.create_container();
    container
        .set(
            Binding::of::<Greeter>().in_context::<FrenchCustomer>(),
            Greeter { greeting: "Bonjour" },
        )
        .unwrap();

    let henri = Context::new(FrenchCustomer);
    let mary = Context::new(Customer);
    assert_eq!(container.get_in::<Greeter>(&henri).unwrap().greeting, "Bonjour");
    assert!(container.get_in::<Greeter>(&mary).unwrap_err().is_not_found());
    assert!(container.get::<Greeter>().unwrap_err().is_not_found());
}

#[test]
fn test_set_after_get_conflicts() {
    let mut registry = ServiceRegistry::new();
    registry.register_factory(Binding::of::<Greeter>(), |_| Greeter { greeting: "Hello" });

    let container = registry.create_container();
    let photographed = container.get::<Greeter>().unwrap();

    let err = container
        .set(Binding::of::<Greeter>(), Greeter { greeting: "Howdy" })
        .unwrap_err();
    assert!(matches!(err, DiError::SetConflict(_)));

    // The cached value is untouched.
    assert!(Arc::ptr_eq(&photographed, &container.get::<Greeter>().unwrap()));
}

#[test]
fn test_set_twice_conflicts() {
    let container = ServiceRegistry::new().create_container();
    container.set(Binding::of::<u32>().named("port"), 8080u32).unwrap();

    match container.set(Binding::of::<u32>().named("port"), 9090u32) {
        Err(DiError::SetConflict(binding)) => assert!(binding.contains("port")),
        other => panic!("expected a set conflict, got {:?}", other),
    }
    assert_eq!(*container.get_named::<u32>("port").unwrap(), 8080);
}

#[test]
fn test_set_for_unobserved_key_succeeds() {
    let mut registry = ServiceRegistry::new();
    registry.register_factory(Binding::of::<Greeter>(), |_| Greeter { greeting: "Hello" });

    let container = registry.create_container();
    let _ = container.get::<Greeter>().unwrap();

    container.set(Binding::of::<Greeter>().named("formal"), Greeter { greeting: "Good day" }).unwrap();
    container.set(Binding::of::<IncomingRequest>(), IncomingRequest { path: "/" }).unwrap();
    assert_eq!(container.get_named::<Greeter>("formal").unwrap().greeting, "Good day");
}

#[test]
fn test_set_conflicts_with_broader_cached_key() {
    let mut registry = ServiceRegistry::new();
    registry.register_singleton(Binding::anything().named("token"), "abc".to_string());

    let container = registry.create_container();
    let _ = container
        .get_with::<String>(&Request::anything().named("token"))
        .unwrap();

    // A typed seed would be answered by the cached "anything" entry already.
    let err = container
        .set(Binding::of::<String>().named("token"), "xyz".to_string())
        .unwrap_err();
    assert!(matches!(err, DiError::SetConflict(_)));
}

#[test]
fn test_set_does_not_inspect_more_specific_subtype_keys() {
    let mut registry = ServiceRegistry::new();
    registry.declare_subtype::<Admin, User>().unwrap();
    registry.register_factory(Binding::of::<Admin>(), |_| Admin { name: "root" });

    let container = registry.create_container();
    let admin = container.get::<Admin>().unwrap();

    // The cached Admin would answer a lookup for Admin through User, but the
    // seed for User is keyed more broadly and is accepted.
    container
        .set(Binding::of::<User>(), User { name: "guest" })
        .unwrap();

    assert_eq!(container.get::<User>().unwrap().name, "guest");
    assert!(Arc::ptr_eq(&admin, &container.get::<Admin>().unwrap()));
    assert_eq!(admin.name, "root");
}

#[test]
fn test_seed_trait_object() {
    let container = ServiceRegistry::new().create_container();
    container
        .set_trait::<dyn Clock>(Binding::of::<dyn Clock>(), Arc::new(FixedClock(1_700_000_000)))
        .unwrap();

    assert_eq!(container.get_trait::<dyn Clock>().unwrap().now(), 1_700_000_000);
}

#[test]
fn test_seed_is_shared_by_rebound_containers_only() {
    let registry = ServiceRegistry::new();
    let container = registry.create_container();
    container.set(Binding::of::<u8>(), 1u8).unwrap();

    let rebound = container.bind(Some(Context::new(Customer)));
    assert_eq!(*rebound.get::<u8>().unwrap(), 1);
    assert!(registry.create_container().try_get::<u8>().unwrap().is_none());
}
