//! Resolution traits implemented by the container.

pub(crate) mod resolver;

pub use resolver::{Resolver, ResolverCore};
