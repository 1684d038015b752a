#![no_main]

use ferrous_wire::{Binding, Context, DiError, Resolver, ServiceRegistry};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

struct Base;
struct Middle;
struct Leaf;

struct Value(u8);

fn binding(selector: u8) -> Binding {
    let binding = Binding::of::<Value>();
    match selector % 4 {
        0 => binding,
        1 => binding.in_context::<Base>(),
        2 => binding.in_context::<Middle>(),
        _ => binding.in_context::<Leaf>(),
    }
}

fn context(selector: u8) -> Option<Context> {
    match selector % 4 {
        0 => None,
        1 => Some(Context::new(Base)),
        2 => Some(Context::new(Middle)),
        _ => Some(Context::new(Leaf)),
    }
}

// Bytes come in pairs: the first half registers factories, the second half
// drives seeds and lookups. Lookups must never panic, and repeated lookups
// must return the cached instance.
fuzz_target!(|data: &[u8]| {
    let (setup, ops) = data.split_at(data.len() / 2);

    let mut registry = ServiceRegistry::new();
    let _ = registry.declare_subtype::<Leaf, Middle>();
    let _ = registry.declare_subtype::<Middle, Base>();
    for pair in setup.chunks_exact(2) {
        let (selector, value) = (pair[0], pair[1]);
        registry.register_factory(binding(selector), move |_| Value(value));
    }

    let container = registry.create_container();
    let contexts: Vec<_> = (0..4).map(context).collect();
    for pair in ops.chunks_exact(2) {
        let (op, selector) = (pair[0], pair[1]);
        let ctx = contexts[(selector % 4) as usize].clone();
        let bound = container.bind(ctx);
        if op % 3 == 0 {
            match bound.set(binding(selector), Value(op)) {
                Ok(()) | Err(DiError::SetConflict(_)) => {}
                Err(other) => panic!("unexpected set error: {}", other),
            }
            continue;
        }
        match bound.get::<Value>() {
            Ok(first) => {
                let again = bound.get::<Value>().expect("cached lookup");
                assert!(Arc::ptr_eq(&first, &again));
            }
            Err(err) => assert!(err.is_not_found()),
        }
    }
});
