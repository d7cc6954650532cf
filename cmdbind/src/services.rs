//! Service registry
//!
//! Converters and handlers are declared on commands as opaque keys and
//! resolved here at bind time. Resolution is resolve-or-default: a
//! registered instance wins, else a registered factory constructs a fresh
//! default, else the key is unresolvable. Command target instances resolve
//! the same way, falling back to the type's parameterless constructor.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::convert::{
    default_item_converters, AssociatedConverter, ConstructorConverter, Converter,
    EnumNameConverter, IdentityConverter, OperationConverter, ScalarConverter, SequenceConverter,
};
use crate::handlers::{
    ConsoleExceptionHandler, ConsoleResultHandler, ExceptionHandler, FileResultHandler,
    ResultHandler,
};
use crate::type_registry::TypeRegistry;
use crate::value::{TypeKey, Value};

/// Opaque identifier of a registered converter or handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Keys of the built-in converters and handlers.
pub mod keys {
    use super::ServiceKey;

    pub fn identity() -> ServiceKey {
        ServiceKey::new("identity")
    }

    pub fn scalar() -> ServiceKey {
        ServiceKey::new("scalar")
    }

    pub fn associated() -> ServiceKey {
        ServiceKey::new("associated")
    }

    pub fn operation() -> ServiceKey {
        ServiceKey::new("operation")
    }

    pub fn constructor() -> ServiceKey {
        ServiceKey::new("constructor")
    }

    pub fn enum_name() -> ServiceKey {
        ServiceKey::new("enum_name")
    }

    pub fn sequence() -> ServiceKey {
        ServiceKey::new("sequence")
    }

    pub fn console_result() -> ServiceKey {
        ServiceKey::new("console_result")
    }

    pub fn file_result() -> ServiceKey {
        ServiceKey::new("file_result")
    }

    pub fn console_error() -> ServiceKey {
        ServiceKey::new("console_error")
    }
}

/// The built-in converter keys in default registration order.
pub fn default_converter_keys() -> Vec<ServiceKey> {
    vec![
        keys::identity(),
        keys::scalar(),
        keys::associated(),
        keys::operation(),
        keys::constructor(),
        keys::enum_name(),
        keys::sequence(),
    ]
}

pub fn default_result_handler_keys() -> Vec<ServiceKey> {
    vec![keys::console_result()]
}

pub fn default_exception_handler_keys() -> Vec<ServiceKey> {
    vec![keys::console_error()]
}

type ConverterFactory = Arc<dyn Fn() -> Arc<dyn Converter> + Send + Sync>;
type ResultHandlerFactory = Arc<dyn Fn() -> Arc<dyn ResultHandler> + Send + Sync>;
type ExceptionHandlerFactory = Arc<dyn Fn() -> Arc<dyn ExceptionHandler> + Send + Sync>;

/// Instance and factory registries for converters, handlers and command
/// target instances.
#[derive(Default)]
pub struct Services {
    converter_instances: IndexMap<ServiceKey, Arc<dyn Converter>>,
    converter_factories: IndexMap<ServiceKey, ConverterFactory>,
    result_instances: IndexMap<ServiceKey, Arc<dyn ResultHandler>>,
    result_factories: IndexMap<ServiceKey, ResultHandlerFactory>,
    exception_instances: IndexMap<ServiceKey, Arc<dyn ExceptionHandler>>,
    exception_factories: IndexMap<ServiceKey, ExceptionHandlerFactory>,
    instances: IndexMap<TypeKey, Value>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the built-in converter and handler factories.
    pub fn with_defaults() -> Self {
        let mut services = Self::new();
        services.insert_converter_factory(keys::identity(), || Arc::new(IdentityConverter));
        services.insert_converter_factory(keys::scalar(), || Arc::new(ScalarConverter));
        services.insert_converter_factory(keys::associated(), || Arc::new(AssociatedConverter));
        services.insert_converter_factory(keys::operation(), || Arc::new(OperationConverter));
        services.insert_converter_factory(keys::constructor(), || Arc::new(ConstructorConverter));
        services.insert_converter_factory(keys::enum_name(), || Arc::new(EnumNameConverter::new()));
        services.insert_converter_factory(keys::sequence(), || {
            Arc::new(SequenceConverter::new(default_item_converters()))
        });
        services
            .insert_result_handler_factory(keys::console_result(), || {
                Arc::new(ConsoleResultHandler)
            });
        services.insert_result_handler_factory(keys::file_result(), || {
            Arc::new(FileResultHandler::default())
        });
        services.insert_exception_handler_factory(keys::console_error(), || {
            Arc::new(ConsoleExceptionHandler)
        });
        services
    }

    pub fn insert_converter(&mut self, key: ServiceKey, converter: Arc<dyn Converter>) {
        self.converter_instances.insert(key, converter);
    }

    pub fn insert_converter_factory<F>(&mut self, key: ServiceKey, factory: F)
    where
        F: Fn() -> Arc<dyn Converter> + Send + Sync + 'static,
    {
        self.converter_factories.insert(key, Arc::new(factory));
    }

    pub fn insert_result_handler(&mut self, key: ServiceKey, handler: Arc<dyn ResultHandler>) {
        self.result_instances.insert(key, handler);
    }

    pub fn insert_result_handler_factory<F>(&mut self, key: ServiceKey, factory: F)
    where
        F: Fn() -> Arc<dyn ResultHandler> + Send + Sync + 'static,
    {
        self.result_factories.insert(key, Arc::new(factory));
    }

    pub fn insert_exception_handler(
        &mut self,
        key: ServiceKey,
        handler: Arc<dyn ExceptionHandler>,
    ) {
        self.exception_instances.insert(key, handler);
    }

    pub fn insert_exception_handler_factory<F>(&mut self, key: ServiceKey, factory: F)
    where
        F: Fn() -> Arc<dyn ExceptionHandler> + Send + Sync + 'static,
    {
        self.exception_factories.insert(key, Arc::new(factory));
    }

    /// Register a command target instance for `ty`.
    pub fn insert_instance(&mut self, ty: TypeKey, instance: Value) {
        self.instances.insert(ty, instance);
    }

    pub fn resolve_converter(&self, key: &ServiceKey) -> Option<Arc<dyn Converter>> {
        self.converter_instances
            .get(key)
            .cloned()
            .or_else(|| self.converter_factories.get(key).map(|f| f()))
    }

    pub fn resolve_result_handler(&self, key: &ServiceKey) -> Option<Arc<dyn ResultHandler>> {
        self.result_instances
            .get(key)
            .cloned()
            .or_else(|| self.result_factories.get(key).map(|f| f()))
    }

    pub fn resolve_exception_handler(
        &self,
        key: &ServiceKey,
    ) -> Option<Arc<dyn ExceptionHandler>> {
        self.exception_instances
            .get(key)
            .cloned()
            .or_else(|| self.exception_factories.get(key).map(|f| f()))
    }

    /// Resolve a target instance of `ty`: a registered instance wins, else
    /// the type's parameterless constructor builds a default.
    pub fn resolve_instance(&self, ty: &TypeKey, types: &TypeRegistry) -> Option<Value> {
        self.instances
            .get(ty)
            .cloned()
            .or_else(|| types.get(ty).and_then(|spec| spec.make_default()))
    }
}
