//! Type registry
//!
//! The engine has no runtime reflection, so everything conversion needs to
//! know about a type is registered up front as a [`TypeSpec`]: its general
//! kind, assignability edges, an optional type-associated converter,
//! named conversion operations, constructors, and an optional sequence
//! constructor. [`TypeRegistry::with_defaults`] seeds the scalar and string
//! sequence types the binder relies on.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::convert::ConvertError;
use crate::value::{TypeKey, Value};

/// A unary conversion function over dynamic values.
pub type ConvertFn = Arc<dyn Fn(Value) -> Result<Value, ConvertError> + Send + Sync>;

/// A parameterless constructor producing a fresh instance value.
pub type MakeFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// A constructor building an instance from an ordered item sequence.
pub type CollectFn = Arc<dyn Fn(Vec<Value>) -> Result<Value, ConvertError> + Send + Sync>;

/// The well-known convertible scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    Str,
    DateTime,
}

/// General shape of a registered type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Scalar(ScalarKind),
    Enum { variants: Vec<String> },
    Sequence { item: TypeKey },
    Opaque,
}

/// Name of a conversion operation, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpName {
    /// Implicit widening conversion.
    Implicit,
    /// Explicit narrowing conversion.
    Explicit,
    /// Truth-test operator; only consulted for boolean targets.
    TruthTest,
    /// A `to_<target>` conversion method.
    To(TypeKey),
    /// A `from_<source>` factory.
    From(TypeKey),
    /// A `parse` factory taking the source representation.
    Parse,
}

/// Where a conversion operation lives relative to the converted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpPlacement {
    /// Static operation declared on the source type.
    StaticOnSource,
    /// Static operation declared on the target type.
    StaticOnTarget,
    /// Zero-argument instance operation on the source value.
    Instance,
}

/// One registered conversion operation.
#[derive(Clone)]
pub struct ConversionOp {
    pub name: OpName,
    pub placement: OpPlacement,
    /// Parameter type (for static ops) or receiver type (for instance ops).
    pub source: TypeKey,
    /// Declared return type.
    pub target: TypeKey,
    pub invoke: ConvertFn,
}

/// A public single-parameter constructor.
#[derive(Clone)]
pub struct ConstructorSpec {
    pub param: TypeKey,
    pub build: ConvertFn,
}

/// Everything the conversion machinery knows about one type.
#[derive(Clone)]
pub struct TypeSpec {
    key: TypeKey,
    kind: TypeKind,
    assignable_from: Vec<TypeKey>,
    convert_to: Vec<(TypeKey, ConvertFn)>,
    convert_from: Vec<(TypeKey, ConvertFn)>,
    operations: Vec<ConversionOp>,
    constructors: Vec<ConstructorSpec>,
    parameterless: Option<MakeFn>,
    from_items: Option<(TypeKey, CollectFn)>,
}

impl TypeSpec {
    pub fn new(key: TypeKey, kind: TypeKind) -> Self {
        Self {
            key,
            kind,
            assignable_from: Vec::new(),
            convert_to: Vec::new(),
            convert_from: Vec::new(),
            operations: Vec::new(),
            constructors: Vec::new(),
            parameterless: None,
            from_items: None,
        }
    }

    /// Declare that values of `source` are directly assignable to this type.
    pub fn assignable_from(mut self, source: TypeKey) -> Self {
        self.assignable_from.push(source);
        self
    }

    /// Add a convert-to entry on this type's associated converter.
    pub fn converts_to(mut self, target: TypeKey, f: ConvertFn) -> Self {
        self.convert_to.push((target, f));
        self
    }

    /// Add a convert-from entry on this type's associated converter.
    pub fn converts_from(mut self, source: TypeKey, f: ConvertFn) -> Self {
        self.convert_from.push((source, f));
        self
    }

    pub fn operation(
        mut self,
        name: OpName,
        placement: OpPlacement,
        source: TypeKey,
        target: TypeKey,
        invoke: ConvertFn,
    ) -> Self {
        self.operations.push(ConversionOp {
            name,
            placement,
            source,
            target,
            invoke,
        });
        self
    }

    pub fn constructor(mut self, param: TypeKey, build: ConvertFn) -> Self {
        self.constructors.push(ConstructorSpec { param, build });
        self
    }

    /// Register a public parameterless constructor, used by
    /// resolve-or-default instance lookup.
    pub fn parameterless(mut self, make: MakeFn) -> Self {
        self.parameterless = Some(make);
        self
    }

    /// Register a constructor accepting an ordered sequence of `item`s.
    pub fn from_items(mut self, item: TypeKey, collect: CollectFn) -> Self {
        self.from_items = Some((item, collect));
        self
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self.kind {
            TypeKind::Scalar(k) => Some(k),
            _ => None,
        }
    }

    pub fn enum_variants(&self) -> Option<&[String]> {
        match &self.kind {
            TypeKind::Enum { variants } => Some(variants),
            _ => None,
        }
    }

    pub fn sequence_item(&self) -> Option<&TypeKey> {
        match &self.kind {
            TypeKind::Sequence { item } => Some(item),
            _ => None,
        }
    }

    pub fn has_associated_converter(&self) -> bool {
        !self.convert_to.is_empty() || !self.convert_from.is_empty()
    }

    pub fn associated_to(&self, target: &TypeKey) -> Option<&ConvertFn> {
        self.convert_to
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, f)| f)
    }

    pub fn associated_from(&self, source: &TypeKey) -> Option<&ConvertFn> {
        self.convert_from
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, f)| f)
    }

    pub fn operations(&self) -> &[ConversionOp] {
        &self.operations
    }

    pub fn constructors(&self) -> &[ConstructorSpec] {
        &self.constructors
    }

    pub fn make_default(&self) -> Option<Value> {
        self.parameterless.as_ref().map(|f| f())
    }

    pub fn sequence_constructor(&self) -> Option<(&TypeKey, &CollectFn)> {
        self.from_items.as_ref().map(|(item, f)| (item, f))
    }
}

/// Registry of type specifications, keyed by [`TypeKey`].
#[derive(Clone, Default)]
pub struct TypeRegistry {
    specs: IndexMap<TypeKey, TypeSpec>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the built-in scalar and string sequence types.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TypeSpec::new(
            TypeKey::string(),
            TypeKind::Scalar(ScalarKind::Str),
        ));
        registry.register(TypeSpec::new(
            TypeKey::bool(),
            TypeKind::Scalar(ScalarKind::Bool),
        ));
        registry.register(TypeSpec::new(
            TypeKey::int(),
            TypeKind::Scalar(ScalarKind::Int),
        ));
        registry.register(TypeSpec::new(
            TypeKey::float(),
            TypeKind::Scalar(ScalarKind::Float),
        ));
        registry.register(TypeSpec::new(
            TypeKey::datetime(),
            TypeKind::Scalar(ScalarKind::DateTime),
        ));
        registry.register(
            TypeSpec::new(
                TypeKey::string_list(),
                TypeKind::Sequence {
                    item: TypeKey::string(),
                },
            )
            .from_items(TypeKey::string(), Arc::new(|items| Ok(Value::List(items)))),
        );
        registry.register(
            TypeSpec::new(
                TypeKey::string_array(),
                TypeKind::Sequence {
                    item: TypeKey::string(),
                },
            )
            .from_items(TypeKey::string(), Arc::new(|items| Ok(Value::List(items)))),
        );
        registry
    }

    /// Register `spec`, replacing any previous spec under the same key.
    pub fn register(&mut self, spec: TypeSpec) {
        self.specs.insert(spec.key().clone(), spec);
    }

    pub fn get(&self, key: &TypeKey) -> Option<&TypeSpec> {
        self.specs.get(key)
    }

    /// Whether a value of `source` can be used where `target` is expected
    /// without conversion.
    pub fn is_assignable(&self, target: &TypeKey, source: &TypeKey) -> bool {
        if target == source {
            return true;
        }
        self.get(target)
            .map(|spec| spec.assignable_from.contains(source))
            .unwrap_or(false)
    }

    pub fn scalar_kind(&self, key: &TypeKey) -> Option<ScalarKind> {
        self.get(key).and_then(TypeSpec::scalar_kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_register_builtin_types() {
        let registry = TypeRegistry::with_defaults();
        assert_eq!(
            registry.scalar_kind(&TypeKey::int()),
            Some(ScalarKind::Int)
        );
        assert_eq!(
            registry
                .get(&TypeKey::string_list())
                .and_then(TypeSpec::sequence_item),
            Some(&TypeKey::string())
        );
        assert!(registry.get(&TypeKey::new("missing")).is_none());
    }

    #[test]
    fn test_assignability_includes_identity() {
        let registry = TypeRegistry::with_defaults();
        assert!(registry.is_assignable(&TypeKey::int(), &TypeKey::int()));
        assert!(!registry.is_assignable(&TypeKey::int(), &TypeKey::string()));
    }

    #[test]
    fn test_assignable_from_edge() {
        let mut registry = TypeRegistry::with_defaults();
        registry.register(
            TypeSpec::new(TypeKey::new("text"), TypeKind::Opaque)
                .assignable_from(TypeKey::string()),
        );
        assert!(registry.is_assignable(&TypeKey::new("text"), &TypeKey::string()));
        assert!(!registry.is_assignable(&TypeKey::string(), &TypeKey::new("text")));
    }

    #[test]
    fn test_register_replaces_existing_spec() {
        let mut registry = TypeRegistry::new();
        registry.register(TypeSpec::new(
            TypeKey::new("t"),
            TypeKind::Scalar(ScalarKind::Int),
        ));
        registry.register(TypeSpec::new(TypeKey::new("t"), TypeKind::Opaque));
        assert!(matches!(
            registry.get(&TypeKey::new("t")).map(TypeSpec::kind),
            Some(TypeKind::Opaque)
        ));
    }
}
