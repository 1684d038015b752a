//! Dependency descriptors.
//!
//! An [`Injectable`] lists the fields a type needs, where each one comes
//! from, and how to assemble the type once they are resolved. It is built
//! once at registration time and used as the type's factory.
//!
//! ```rust
//! use ferrous_wire::{Binding, Injectable, Resolver, ServiceRegistry};
//!
//! struct Settings { punctuation: String }
//! struct Customer { name: String }
//! struct Greeter { greeting: String, punctuation: String }
//!
//! impl Greeter {
//!     fn greet(&self, customer: &Customer) -> String {
//!         format!("{} {} {}", self.greeting, customer.name, self.punctuation)
//!     }
//! }
//!
//! let greeter = Injectable::<Greeter>::builder()
//!     .attr::<Settings, String, _>("punctuation", |settings| settings.punctuation.clone())
//!     .context("customer")
//!     .constructor(|fields| {
//!         let punctuation = fields.take_cloned::<String>("punctuation")?;
//!         let _customer = fields.context("customer")?;
//!         Ok(Greeter { greeting: "Hello".into(), punctuation })
//!     })
//!     .unwrap();
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register_singleton(Binding::of::<Settings>(), Settings { punctuation: "!!".into() });
//! registry.register_injectable(Binding::of::<Greeter>(), greeter);
//!
//! let container = registry.create_container();
//! let mary = Customer { name: "Mary".into() };
//! assert_eq!(container.get::<Greeter>().unwrap().greet(&mary), "Hello Mary !!");
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::{Request, ServiceContainer, WeakContainer};
use crate::context::Context;
use crate::error::{DiError, DiResult};
use crate::key::TypeKey;
use crate::registration::{AnyArc, ServiceFactory};
use crate::traits::resolver::{downcast, downcast_trait};

type Extract = Arc<dyn Fn(AnyArc) -> DiResult<AnyArc> + Send + Sync>;
type MakeDefault = Arc<dyn Fn() -> AnyArc + Send + Sync>;
type Constructor<T> = Arc<dyn Fn(&mut InjectedFields) -> DiResult<T> + Send + Sync>;

#[derive(Clone)]
enum FieldSource {
    Service { service: TypeKey, name: String },
    Attr { service: TypeKey, name: String, extract: Extract },
    Context,
    Container,
}

#[derive(Clone)]
struct FieldSpec {
    field: &'static str,
    source: FieldSource,
    default: Option<MakeDefault>,
}

enum FieldValue {
    Value(AnyArc),
    Context(Option<Context>),
    Container(WeakContainer),
}

/// Builder for an [`Injectable`].
pub struct InjectableBuilder<T> {
    target: &'static str,
    fields: Vec<FieldSpec>,
    defaults: Vec<(&'static str, MakeDefault)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> InjectableBuilder<T> {
    fn push(mut self, field: &'static str, source: FieldSource) -> Self {
        self.fields.push(FieldSpec {
            field,
            source,
            default: None,
        });
        self
    }

    /// Field resolved as the concrete service `S`.
    pub fn service<S: Any + Send + Sync>(self, field: &'static str) -> Self {
        self.service_named::<S>(field, "")
    }

    /// Field resolved as the concrete service `S` registered under `name`.
    pub fn service_named<S: Any + Send + Sync>(self, field: &'static str, name: &str) -> Self {
        self.push(
            field,
            FieldSource::Service {
                service: TypeKey::of::<S>(),
                name: name.to_owned(),
            },
        )
    }

    /// Field resolved as the trait object `S`; read it with
    /// [`InjectedFields::take_trait`].
    pub fn trait_service<S: ?Sized + Send + Sync + 'static>(self, field: &'static str) -> Self {
        self.push(
            field,
            FieldSource::Service {
                service: TypeKey::of::<S>(),
                name: String::new(),
            },
        )
    }

    /// Field filled with an attribute read off the service `S`.
    ///
    /// `S` is resolved like any other field, then `extract` runs on it.
    pub fn attr<S, A, F>(self, field: &'static str, extract: F) -> Self
    where
        S: Any + Send + Sync,
        A: Any + Send + Sync,
        F: Fn(&S) -> A + Send + Sync + 'static,
    {
        let extract: Extract = Arc::new(move |any: AnyArc| {
            let service = downcast::<S>(any)?;
            Ok(Arc::new(extract(&*service)) as AnyArc)
        });
        self.push(
            field,
            FieldSource::Attr {
                service: TypeKey::of::<S>(),
                name: String::new(),
                extract,
            },
        )
    }

    /// Field filled with the container's bound context.
    pub fn context(self, field: &'static str) -> Self {
        self.push(field, FieldSource::Context)
    }

    /// Field filled with a [`WeakContainer`] for resolving lazily.
    ///
    /// The handle does not keep the container lineage or the bound context
    /// alive, so a cached `T` may keep it.
    pub fn container(self, field: &'static str) -> Self {
        self.push(field, FieldSource::Container)
    }

    /// Value used for `field` when its service cannot be found.
    ///
    /// For a trait field, return the `Arc<dyn Trait>` from `default`.
    pub fn with_default<V, F>(mut self, field: &'static str, default: F) -> Self
    where
        V: Any + Send + Sync,
        F: Fn() -> V + Send + Sync + 'static,
    {
        let make: MakeDefault = Arc::new(move || Arc::new(default()) as AnyArc);
        self.defaults.push((field, make));
        self
    }

    /// Finishes the descriptor with the function that assembles `T`.
    ///
    /// Fails with [`DiError::MalformedRegistration`] if a field is declared
    /// twice, or a default names a field that is not declared or cannot
    /// fail.
    pub fn constructor<F>(self, constructor: F) -> DiResult<Injectable<T>>
    where
        F: Fn(&mut InjectedFields) -> DiResult<T> + Send + Sync + 'static,
    {
        let Self {
            target,
            mut fields,
            defaults,
            ..
        } = self;

        for (i, spec) in fields.iter().enumerate() {
            if fields[..i].iter().any(|earlier| earlier.field == spec.field) {
                return Err(DiError::MalformedRegistration(format!(
                    "field `{}` is declared twice on {}",
                    spec.field, target
                )));
            }
        }

        for (field, make) in defaults {
            let spec = fields.iter_mut().find(|spec| spec.field == field);
            match spec {
                Some(spec) if matches!(spec.source, FieldSource::Service { .. } | FieldSource::Attr { .. }) => {
                    spec.default = Some(make);
                }
                _ => {
                    return Err(DiError::MalformedRegistration(format!(
                        "default given for `{}`, which is not a service field of {}",
                        field, target
                    )))
                }
            }
        }

        Ok(Injectable {
            target,
            fields,
            constructor: Arc::new(constructor),
        })
    }
}

/// A dependency descriptor for `T`, usable as its factory.
pub struct Injectable<T> {
    target: &'static str,
    fields: Vec<FieldSpec>,
    constructor: Constructor<T>,
}

impl<T: Send + Sync + 'static> Injectable<T> {
    /// Starts describing `T`.
    pub fn builder() -> InjectableBuilder<T> {
        InjectableBuilder {
            target: std::any::type_name::<T>(),
            fields: Vec::new(),
            defaults: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Name of the described type.
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Declared field names, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|spec| spec.field)
    }

    /// Resolves every field from `container` and builds a `T`.
    ///
    /// Errors raised by the constructor itself are returned unchanged.
    pub fn inject(&self, container: &ServiceContainer) -> DiResult<T> {
        let mut values = Vec::with_capacity(self.fields.len());
        for spec in &self.fields {
            values.push((spec.field, self.resolve_field(spec, container)?));
        }
        let mut fields = InjectedFields {
            target: self.target,
            values,
        };
        (self.constructor)(&mut fields)
    }

    fn resolve_field(&self, spec: &FieldSpec, container: &ServiceContainer) -> DiResult<FieldValue> {
        let (service, name) = match &spec.source {
            FieldSource::Context => return Ok(FieldValue::Context(container.context().cloned())),
            FieldSource::Container => return Ok(FieldValue::Container(container.downgrade())),
            FieldSource::Service { service, name } | FieldSource::Attr { service, name, .. } => {
                (*service, name.as_str())
            }
        };

        let request = Request::for_type(Some(service)).named(name);
        let resolved = match container.resolve_any(&request) {
            Ok(value) => value,
            Err(error) if error.is_not_found() => match &spec.default {
                Some(make) => {
                    tracing::trace!(target_type = self.target, field = spec.field, "using field default");
                    return Ok(FieldValue::Value(make()));
                }
                None => return Err(self.field_error(spec.field, error)),
            },
            Err(error) => return Err(self.field_error(spec.field, error)),
        };
        self.finish_field(spec, resolved)
    }

    fn finish_field(&self, spec: &FieldSpec, value: AnyArc) -> DiResult<FieldValue> {
        match &spec.source {
            FieldSource::Attr { extract, .. } => extract(value)
                .map(FieldValue::Value)
                .map_err(|error| self.field_error(spec.field, error)),
            _ => Ok(FieldValue::Value(value)),
        }
    }

    fn field_error(&self, field: &'static str, source: DiError) -> DiError {
        DiError::Injection {
            target: self.target,
            field,
            source: Box::new(source),
        }
    }
}

impl<T: Send + Sync + 'static> ServiceFactory for Injectable<T> {
    fn create(&self, container: &ServiceContainer) -> DiResult<AnyArc> {
        Ok(Arc::new(self.inject(container)?))
    }
}

impl<T> Clone for Injectable<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target,
            fields: self.fields.clone(),
            constructor: self.constructor.clone(),
        }
    }
}

impl<T> fmt::Debug for Injectable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<_> = self.fields.iter().map(|spec| spec.field).collect();
        f.debug_struct("Injectable")
            .field("target", &self.target)
            .field("fields", &fields)
            .finish()
    }
}

/// Resolved field values handed to an [`Injectable`]'s constructor.
///
/// Each field can be taken once.
pub struct InjectedFields {
    target: &'static str,
    values: Vec<(&'static str, FieldValue)>,
}

impl InjectedFields {
    /// Name of the type being built.
    pub fn target(&self) -> &'static str {
        self.target
    }

    fn error(&self, field: &'static str, source: DiError) -> DiError {
        DiError::Injection {
            target: self.target,
            field,
            source: Box::new(source),
        }
    }

    fn take_value(&mut self, field: &'static str) -> DiResult<FieldValue> {
        match self.values.iter().position(|(name, _)| *name == field) {
            Some(index) => Ok(self.values.swap_remove(index).1),
            None => Err(self.error(
                field,
                DiError::MalformedRegistration("field was not declared or was already taken".into()),
            )),
        }
    }

    fn take_any(&mut self, field: &'static str) -> DiResult<AnyArc> {
        match self.take_value(field)? {
            FieldValue::Value(value) => Ok(value),
            _ => Err(self.error(field, DiError::TypeMismatch("service field"))),
        }
    }

    /// Takes a concrete service field.
    pub fn take<V: Any + Send + Sync>(&mut self, field: &'static str) -> DiResult<Arc<V>> {
        let any = self.take_any(field)?;
        downcast::<V>(any).map_err(|error| self.error(field, error))
    }

    /// Takes a field and clones the value out of its `Arc`.
    pub fn take_cloned<V: Any + Send + Sync + Clone>(&mut self, field: &'static str) -> DiResult<V> {
        self.take::<V>(field).map(|value| (*value).clone())
    }

    /// Takes a trait-object field.
    pub fn take_trait<V: ?Sized + Send + Sync + 'static>(&mut self, field: &'static str) -> DiResult<Arc<V>> {
        let any = self.take_any(field)?;
        downcast_trait::<V>(any).map_err(|error| self.error(field, error))
    }

    /// Takes a context field.
    pub fn context(&mut self, field: &'static str) -> DiResult<Option<Context>> {
        match self.take_value(field)? {
            FieldValue::Context(context) => Ok(context),
            _ => Err(self.error(field, DiError::TypeMismatch("context field"))),
        }
    }

    /// Takes a container field.
    pub fn container(&mut self, field: &'static str) -> DiResult<WeakContainer> {
        match self.take_value(field)? {
            FieldValue::Container(container) => Ok(container),
            _ => Err(self.error(field, DiError::TypeMismatch("container field"))),
        }
    }
}
