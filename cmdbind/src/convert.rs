//! Value conversion
//!
//! Conversion is a chain of responsibility: an ordered list of [`Converter`]
//! strategies is walked with `can_convert` and the first strategy claiming
//! the (source, target) pair performs the conversion. Ties are broken by
//! declaration order, never by specificity. The built-in strategies, in
//! default registration order: identity, scalar coercion, type-associated
//! converter, conversion operation, single-argument constructor, enum name,
//! sequence.

use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::services::{ServiceKey, Services};
use crate::type_registry::{
    ConvertFn, OpName, OpPlacement, ScalarKind, TypeRegistry, TypeSpec,
};
use crate::value::{TypeKey, Value};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConvertError {
    /// No strategy in the chain can convert between the named types.
    #[error("no conversion from {from} to {target}")]
    NotSupported { from: TypeKey, target: TypeKey },

    /// A strategy was invoked on a pair outside its own guarantee.
    #[error("cannot convert {value_kind} value to {target}")]
    InvalidCast {
        value_kind: &'static str,
        target: TypeKey,
    },

    /// Conversion was asked to produce a value from nothing.
    #[error("no value available to convert to {target}")]
    MissingValue { target: TypeKey },

    /// The source text does not parse as the target type.
    #[error("cannot parse {input:?} as {target}: {message}")]
    Parse {
        input: String,
        target: TypeKey,
        message: String,
    },

    /// The target type is not registered.
    #[error("unknown type {0}")]
    UnknownType(TypeKey),
}

/// One conversion strategy.
pub trait Converter: Send + Sync {
    /// Whether this strategy can convert a `source` value into `target`.
    fn can_convert(&self, source: &TypeKey, target: &TypeKey, types: &TypeRegistry) -> bool;

    /// Performs the conversion. Fails if invoked on a pair `can_convert`
    /// would reject.
    fn convert(
        &self,
        value: Value,
        target: &TypeKey,
        types: &TypeRegistry,
    ) -> Result<Value, ConvertError>;
}

/// Returns the first converter in `converters` claiming the pair.
pub fn resolve_first<'a>(
    converters: &'a [Arc<dyn Converter>],
    source: &TypeKey,
    target: &TypeKey,
    types: &TypeRegistry,
) -> Option<&'a Arc<dyn Converter>> {
    converters
        .iter()
        .find(|c| c.can_convert(source, target, types))
}

/// Strategy 1: the target directly accepts the source value, no
/// transformation.
#[derive(Debug, Default)]
pub struct IdentityConverter;

impl Converter for IdentityConverter {
    fn can_convert(&self, source: &TypeKey, target: &TypeKey, types: &TypeRegistry) -> bool {
        types.is_assignable(target, source)
    }

    fn convert(
        &self,
        value: Value,
        target: &TypeKey,
        _types: &TypeRegistry,
    ) -> Result<Value, ConvertError> {
        if value.is_null() {
            return Err(ConvertError::MissingValue {
                target: target.clone(),
            });
        }
        Ok(value)
    }
}

/// Strategy 2: standard coercion between the well-known scalar kinds.
#[derive(Debug, Default)]
pub struct ScalarConverter;

impl ScalarConverter {
    // Mirrors the arms of coerce_scalar so an unclaimed pair falls through
    // to a later strategy.
    fn coercible(source: ScalarKind, target: ScalarKind) -> bool {
        use ScalarKind::*;
        match source {
            Str => true,
            Int => matches!(target, Int | Float | Str | Bool),
            Float => matches!(target, Float | Int | Str),
            Bool => matches!(target, Bool | Int | Float | Str),
            DateTime => matches!(target, DateTime | Str),
        }
    }
}

impl Converter for ScalarConverter {
    fn can_convert(&self, source: &TypeKey, target: &TypeKey, types: &TypeRegistry) -> bool {
        match (types.scalar_kind(source), types.scalar_kind(target)) {
            (Some(s), Some(t)) => Self::coercible(s, t),
            _ => false,
        }
    }

    fn convert(
        &self,
        value: Value,
        target: &TypeKey,
        types: &TypeRegistry,
    ) -> Result<Value, ConvertError> {
        let kind = types
            .scalar_kind(target)
            .ok_or_else(|| ConvertError::UnknownType(target.clone()))?;
        coerce_scalar(value, kind, target)
    }
}

fn parse_datetime(text: &str, target: &TypeKey) -> Result<NaiveDateTime, ConvertError> {
    text.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .map_err(|err| ConvertError::Parse {
            input: text.to_string(),
            target: target.clone(),
            message: err.to_string(),
        })
}

fn coerce_scalar(value: Value, kind: ScalarKind, target: &TypeKey) -> Result<Value, ConvertError> {
    let parse_err = |input: &str, message: String| ConvertError::Parse {
        input: input.to_string(),
        target: target.clone(),
        message,
    };
    match (value, kind) {
        (Value::Null, _) => Err(ConvertError::MissingValue {
            target: target.clone(),
        }),

        (Value::Str(s), ScalarKind::Str) => Ok(Value::Str(s)),
        (Value::Str(s), ScalarKind::Int) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| parse_err(&s, e.to_string())),
        (Value::Str(s), ScalarKind::Float) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| parse_err(&s, e.to_string())),
        (Value::Str(s), ScalarKind::Bool) => s
            .trim()
            .to_ascii_lowercase()
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|e| parse_err(&s, e.to_string())),
        (Value::Str(s), ScalarKind::DateTime) => parse_datetime(&s, target).map(Value::DateTime),

        (Value::Int(i), ScalarKind::Int) => Ok(Value::Int(i)),
        (Value::Int(i), ScalarKind::Float) => Ok(Value::Float(i as f64)),
        (Value::Int(i), ScalarKind::Str) => Ok(Value::Str(i.to_string())),
        (Value::Int(i), ScalarKind::Bool) => Ok(Value::Bool(i != 0)),

        (Value::Float(f), ScalarKind::Float) => Ok(Value::Float(f)),
        (Value::Float(f), ScalarKind::Int) => Ok(Value::Int(f as i64)),
        (Value::Float(f), ScalarKind::Str) => Ok(Value::Str(f.to_string())),

        (Value::Bool(b), ScalarKind::Bool) => Ok(Value::Bool(b)),
        (Value::Bool(b), ScalarKind::Int) => Ok(Value::Int(i64::from(b))),
        (Value::Bool(b), ScalarKind::Float) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        (Value::Bool(b), ScalarKind::Str) => Ok(Value::Str(b.to_string())),

        (Value::DateTime(dt), ScalarKind::DateTime) => Ok(Value::DateTime(dt)),
        (Value::DateTime(dt), ScalarKind::Str) => Ok(Value::Str(dt.to_string())),

        (value, _) => Err(ConvertError::InvalidCast {
            value_kind: value.kind_name(),
            target: target.clone(),
        }),
    }
}

/// Strategy 3: type-associated converter registries.
///
/// Tries the source type's convert-to entry first, then the target type's
/// convert-from entry.
#[derive(Debug, Default)]
pub struct AssociatedConverter;

impl AssociatedConverter {
    fn find<'a>(
        source: &TypeKey,
        target: &TypeKey,
        types: &'a TypeRegistry,
    ) -> Option<&'a ConvertFn> {
        if let Some(f) = types.get(source).and_then(|s| s.associated_to(target)) {
            return Some(f);
        }
        types.get(target).and_then(|t| t.associated_from(source))
    }
}

impl Converter for AssociatedConverter {
    fn can_convert(&self, source: &TypeKey, target: &TypeKey, types: &TypeRegistry) -> bool {
        Self::find(source, target, types).is_some()
    }

    fn convert(
        &self,
        value: Value,
        target: &TypeKey,
        types: &TypeRegistry,
    ) -> Result<Value, ConvertError> {
        let source = value_type_key(&value);
        match Self::find(&source, target, types) {
            Some(f) => f(value),
            None => Err(ConvertError::InvalidCast {
                value_kind: value.kind_name(),
                target: target.clone(),
            }),
        }
    }
}

/// Strategy 4: named conversion operations.
///
/// Searches static operations on the source type, then static operations on
/// the target type, then zero-argument instance operations on the source
/// value, each with the fixed name precedence (implicit, explicit,
/// truth-test for boolean targets, `to_<target>` / `from_<source>`, parse).
#[derive(Debug, Default)]
pub struct OperationConverter;

impl OperationConverter {
    fn static_on_source<'a>(
        spec: &'a TypeSpec,
        target: &TypeKey,
        types: &TypeRegistry,
    ) -> Option<&'a ConvertFn> {
        let candidates: Vec<_> = spec
            .operations()
            .iter()
            .filter(|op| {
                op.placement == OpPlacement::StaticOnSource
                    && types.is_assignable(target, &op.target)
            })
            .collect();
        Self::by_precedence(&candidates, &[
            OpName::Implicit,
            OpName::Explicit,
            OpName::TruthTest,
            OpName::To(target.clone()),
        ], target)
    }

    fn static_on_target<'a>(
        spec: &'a TypeSpec,
        source: &TypeKey,
        target: &TypeKey,
        types: &TypeRegistry,
    ) -> Option<&'a ConvertFn> {
        let candidates: Vec<_> = spec
            .operations()
            .iter()
            .filter(|op| {
                op.placement == OpPlacement::StaticOnTarget
                    && &op.target == target
                    && types.is_assignable(&op.source, source)
            })
            .collect();
        Self::by_precedence(&candidates, &[
            OpName::Implicit,
            OpName::Explicit,
            OpName::TruthTest,
            OpName::From(source.clone()),
            OpName::Parse,
        ], target)
    }

    fn instance_on_source<'a>(
        spec: &'a TypeSpec,
        target: &TypeKey,
        types: &TypeRegistry,
    ) -> Option<&'a ConvertFn> {
        spec.operations()
            .iter()
            .find(|op| {
                op.placement == OpPlacement::Instance
                    && op.name == OpName::To(target.clone())
                    && types.is_assignable(target, &op.target)
            })
            .map(|op| &op.invoke)
    }

    fn by_precedence<'a>(
        candidates: &[&'a crate::type_registry::ConversionOp],
        order: &[OpName],
        target: &TypeKey,
    ) -> Option<&'a ConvertFn> {
        for name in order {
            // The truth-test operator only ever produces a boolean.
            if *name == OpName::TruthTest && *target != TypeKey::bool() {
                continue;
            }
            if let Some(op) = candidates.iter().find(|op| op.name == *name) {
                return Some(&op.invoke);
            }
        }
        None
    }

    fn find<'a>(
        source: &TypeKey,
        target: &TypeKey,
        types: &'a TypeRegistry,
    ) -> Option<&'a ConvertFn> {
        if let Some(spec) = types.get(source) {
            if let Some(f) = Self::static_on_source(spec, target, types) {
                return Some(f);
            }
        }
        if let Some(spec) = types.get(target) {
            if let Some(f) = Self::static_on_target(spec, source, target, types) {
                return Some(f);
            }
        }
        types
            .get(source)
            .and_then(|spec| Self::instance_on_source(spec, target, types))
    }
}

impl Converter for OperationConverter {
    fn can_convert(&self, source: &TypeKey, target: &TypeKey, types: &TypeRegistry) -> bool {
        Self::find(source, target, types).is_some()
    }

    fn convert(
        &self,
        value: Value,
        target: &TypeKey,
        types: &TypeRegistry,
    ) -> Result<Value, ConvertError> {
        let source = value_type_key(&value);
        match Self::find(&source, target, types) {
            Some(f) => f(value),
            None => Err(ConvertError::InvalidCast {
                value_kind: value.kind_name(),
                target: target.clone(),
            }),
        }
    }
}

/// Strategy 5: a public single-parameter constructor on the target type
/// whose parameter accepts the source.
#[derive(Debug, Default)]
pub struct ConstructorConverter;

impl ConstructorConverter {
    fn find<'a>(
        source: &TypeKey,
        target: &TypeKey,
        types: &'a TypeRegistry,
    ) -> Option<&'a ConvertFn> {
        types.get(target).and_then(|spec| {
            spec.constructors()
                .iter()
                .find(|c| types.is_assignable(&c.param, source))
                .map(|c| &c.build)
        })
    }
}

impl Converter for ConstructorConverter {
    fn can_convert(&self, source: &TypeKey, target: &TypeKey, types: &TypeRegistry) -> bool {
        Self::find(source, target, types).is_some()
    }

    fn convert(
        &self,
        value: Value,
        target: &TypeKey,
        types: &TypeRegistry,
    ) -> Result<Value, ConvertError> {
        let source = value_type_key(&value);
        match Self::find(&source, target, types) {
            Some(f) => f(value),
            None => Err(ConvertError::InvalidCast {
                value_kind: value.kind_name(),
                target: target.clone(),
            }),
        }
    }
}

/// Strategy 6: string ↔ enumeration member name.
#[derive(Debug, Default)]
pub struct EnumNameConverter {
    ignore_case: bool,
}

impl EnumNameConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_insensitive() -> Self {
        Self { ignore_case: true }
    }
}

impl Converter for EnumNameConverter {
    fn can_convert(&self, source: &TypeKey, target: &TypeKey, types: &TypeRegistry) -> bool {
        let is_enum = |key: &TypeKey| {
            types
                .get(key)
                .map(|spec| spec.enum_variants().is_some())
                .unwrap_or(false)
        };
        (*source == TypeKey::string() && is_enum(target))
            || (*target == TypeKey::string() && is_enum(source))
    }

    fn convert(
        &self,
        value: Value,
        target: &TypeKey,
        types: &TypeRegistry,
    ) -> Result<Value, ConvertError> {
        if *target == TypeKey::string() {
            // Enum member to its name.
            return match value {
                Value::Typed(tv) => Ok(*tv.repr),
                other => Err(ConvertError::InvalidCast {
                    value_kind: other.kind_name(),
                    target: target.clone(),
                }),
            };
        }
        let variants = types
            .get(target)
            .and_then(TypeSpec::enum_variants)
            .ok_or_else(|| ConvertError::UnknownType(target.clone()))?;
        match value {
            Value::Str(name) => {
                let found = variants.iter().find(|v| {
                    if self.ignore_case {
                        v.eq_ignore_ascii_case(&name)
                    } else {
                        *v == &name
                    }
                });
                match found {
                    Some(canonical) => Ok(Value::typed(
                        target.clone(),
                        Value::Str(canonical.clone()),
                    )),
                    None => Err(ConvertError::Parse {
                        input: name,
                        target: target.clone(),
                        message: "no such member".to_string(),
                    }),
                }
            }
            Value::Null => Err(ConvertError::MissingValue {
                target: target.clone(),
            }),
            other => Err(ConvertError::InvalidCast {
                value_kind: other.kind_name(),
                target: target.clone(),
            }),
        }
    }
}

/// Strategy 7: ordered sequence to a sequence-constructible target.
///
/// Each element is converted through the item converter chain, then the
/// target's sequence constructor rebuilds the container.
pub struct SequenceConverter {
    item_converters: Vec<Arc<dyn Converter>>,
}

impl SequenceConverter {
    pub fn new(item_converters: Vec<Arc<dyn Converter>>) -> Self {
        Self { item_converters }
    }

    fn endpoints<'a>(
        source: &TypeKey,
        target: &TypeKey,
        types: &'a TypeRegistry,
    ) -> Option<(&'a TypeKey, &'a TypeKey)> {
        let source_item = types.get(source)?.sequence_item()?;
        let (target_item, _) = types.get(target)?.sequence_constructor()?;
        Some((source_item, target_item))
    }
}

impl Converter for SequenceConverter {
    fn can_convert(&self, source: &TypeKey, target: &TypeKey, types: &TypeRegistry) -> bool {
        match Self::endpoints(source, target, types) {
            Some((source_item, target_item)) => {
                resolve_first(&self.item_converters, source_item, target_item, types).is_some()
            }
            None => false,
        }
    }

    fn convert(
        &self,
        value: Value,
        target: &TypeKey,
        types: &TypeRegistry,
    ) -> Result<Value, ConvertError> {
        let source = value_type_key(&value);
        let (source_item, target_item) = Self::endpoints(&source, target, types)
            .map(|(s, t)| (s.clone(), t.clone()))
            .ok_or_else(|| ConvertError::NotSupported {
                from: source.clone(),
                target: target.clone(),
            })?;
        let item_converter = resolve_first(&self.item_converters, &source_item, &target_item, types)
            .ok_or_else(|| ConvertError::NotSupported {
                from: source_item.clone(),
                target: target_item.clone(),
            })?;
        let items = match value {
            Value::List(items) => items,
            other => {
                return Err(ConvertError::InvalidCast {
                    value_kind: other.kind_name(),
                    target: target.clone(),
                })
            }
        };
        let mut converted = Vec::with_capacity(items.len());
        for item in items {
            converted.push(item_converter.convert(item, &target_item, types)?);
        }
        let (_, build) = types
            .get(target)
            .and_then(TypeSpec::sequence_constructor)
            .ok_or_else(|| ConvertError::UnknownType(target.clone()))?;
        build(converted)
    }
}

// Sequence conversion of typed/structural values needs the source key for
// strategy lookup; raw runtime values map onto the built-in keys.
fn value_type_key(value: &Value) -> TypeKey {
    match value {
        Value::Null => TypeKey::new("null"),
        Value::Bool(_) => TypeKey::bool(),
        Value::Int(_) => TypeKey::int(),
        Value::Float(_) => TypeKey::float(),
        Value::Str(_) => TypeKey::string(),
        Value::DateTime(_) => TypeKey::datetime(),
        Value::List(_) => TypeKey::string_list(),
        Value::Typed(tv) => tv.ty.clone(),
    }
}

/// Default item converter chain used by the sequence strategy.
pub fn default_item_converters() -> Vec<Arc<dyn Converter>> {
    vec![
        Arc::new(IdentityConverter),
        Arc::new(ScalarConverter),
        Arc::new(AssociatedConverter),
        Arc::new(OperationConverter),
        Arc::new(ConstructorConverter),
        Arc::new(EnumNameConverter::new()),
    ]
}

/// A resolved conversion: a selected strategy fixed to a target type.
#[derive(Clone)]
pub struct Conversion {
    converter: Arc<dyn Converter>,
    target: TypeKey,
}

impl Conversion {
    pub fn target(&self) -> &TypeKey {
        &self.target
    }

    /// Applies the conversion. An absent value fails rather than passing
    /// null through a strategy.
    pub fn apply(&self, value: Value, types: &TypeRegistry) -> Result<Value, ConvertError> {
        if value.is_null() {
            return Err(ConvertError::MissingValue {
                target: self.target.clone(),
            });
        }
        self.converter.convert(value, &self.target, types)
    }
}

/// Resolves converter key lists against the service registry and picks the
/// first strategy claiming a (source, target) pair.
pub struct ConversionResolver<'a> {
    services: &'a Services,
    types: &'a TypeRegistry,
}

impl<'a> ConversionResolver<'a> {
    pub fn new(services: &'a Services, types: &'a TypeRegistry) -> Self {
        Self { services, types }
    }

    /// Walks `keys` in order (duplicates keep their first position) and
    /// returns the first converter whose `can_convert` accepts the pair.
    pub fn resolve(
        &self,
        keys: &[ServiceKey],
        source: &TypeKey,
        target: &TypeKey,
    ) -> Option<Conversion> {
        let mut seen: Vec<&ServiceKey> = Vec::with_capacity(keys.len());
        for key in keys {
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            let Some(converter) = self.services.resolve_converter(key) else {
                tracing::warn!("converter {key} is not registered and cannot be resolved");
                continue;
            };
            if converter.can_convert(source, target, self.types) {
                return Some(Conversion {
                    converter,
                    target: target.clone(),
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_registry::TypeKind;

    fn registry_with_color() -> TypeRegistry {
        let mut types = TypeRegistry::with_defaults();
        types.register(TypeSpec::new(
            TypeKey::new("color"),
            TypeKind::Enum {
                variants: vec!["Red".into(), "Green".into(), "Blue".into()],
            },
        ));
        types
    }

    #[test]
    fn test_identity_accepts_assignable_pairs_only() {
        let types = TypeRegistry::with_defaults();
        let c = IdentityConverter;
        assert!(c.can_convert(&TypeKey::int(), &TypeKey::int(), &types));
        assert!(!c.can_convert(&TypeKey::string(), &TypeKey::int(), &types));
        assert_eq!(
            c.convert(Value::Int(3), &TypeKey::int(), &types).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_scalar_string_to_int_and_float() {
        let types = TypeRegistry::with_defaults();
        let c = ScalarConverter;
        assert_eq!(
            c.convert(Value::from("3"), &TypeKey::int(), &types).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            c.convert(Value::from("2"), &TypeKey::float(), &types)
                .unwrap(),
            Value::Float(2.0)
        );
        assert!(c
            .convert(Value::from("abc"), &TypeKey::int(), &types)
            .is_err());
    }

    #[test]
    fn test_scalar_requires_both_endpoints_scalar() {
        let types = registry_with_color();
        let c = ScalarConverter;
        assert!(!c.can_convert(&TypeKey::string(), &TypeKey::new("color"), &types));
    }

    #[test]
    fn test_scalar_claims_only_coercible_pairs() {
        let types = TypeRegistry::with_defaults();
        let c = ScalarConverter;
        assert!(c.can_convert(&TypeKey::string(), &TypeKey::datetime(), &types));
        assert!(c.can_convert(&TypeKey::bool(), &TypeKey::int(), &types));
        // Pairs without a coercion must fall through to later strategies.
        assert!(!c.can_convert(&TypeKey::float(), &TypeKey::bool(), &types));
        assert!(!c.can_convert(&TypeKey::datetime(), &TypeKey::int(), &types));
    }

    #[test]
    fn test_associated_prefers_convert_to_on_source() {
        let mut types = TypeRegistry::with_defaults();
        types.register(
            TypeSpec::new(TypeKey::new("celsius"), TypeKind::Opaque).converts_to(
                TypeKey::float(),
                Arc::new(|v| match v {
                    Value::Typed(tv) => Ok(*tv.repr),
                    other => Err(ConvertError::InvalidCast {
                        value_kind: other.kind_name(),
                        target: TypeKey::float(),
                    }),
                }),
            ),
        );
        let c = AssociatedConverter;
        assert!(c.can_convert(&TypeKey::new("celsius"), &TypeKey::float(), &types));
        let v = Value::typed(TypeKey::new("celsius"), Value::Float(21.5));
        assert_eq!(
            c.convert(v, &TypeKey::float(), &types).unwrap(),
            Value::Float(21.5)
        );
    }

    #[test]
    fn test_operation_precedence_prefers_implicit() {
        let mut types = TypeRegistry::with_defaults();
        types.register(
            TypeSpec::new(TypeKey::new("meters"), TypeKind::Opaque)
                .operation(
                    OpName::To(TypeKey::float()),
                    OpPlacement::StaticOnSource,
                    TypeKey::new("meters"),
                    TypeKey::float(),
                    Arc::new(|_| Ok(Value::Float(-1.0))),
                )
                .operation(
                    OpName::Implicit,
                    OpPlacement::StaticOnSource,
                    TypeKey::new("meters"),
                    TypeKey::float(),
                    Arc::new(|_| Ok(Value::Float(1.0))),
                ),
        );
        let c = OperationConverter;
        let v = Value::typed(TypeKey::new("meters"), Value::Float(5.0));
        assert_eq!(
            c.convert(v, &TypeKey::float(), &types).unwrap(),
            Value::Float(1.0)
        );
    }

    #[test]
    fn test_operation_parse_on_target() {
        let mut types = TypeRegistry::with_defaults();
        types.register(TypeSpec::new(TypeKey::new("version"), TypeKind::Opaque).operation(
            OpName::Parse,
            OpPlacement::StaticOnTarget,
            TypeKey::string(),
            TypeKey::new("version"),
            Arc::new(|v| Ok(Value::typed(TypeKey::new("version"), v))),
        ));
        let c = OperationConverter;
        assert!(c.can_convert(&TypeKey::string(), &TypeKey::new("version"), &types));
        let out = c
            .convert(Value::from("1.2.3"), &TypeKey::new("version"), &types)
            .unwrap();
        assert_eq!(out, Value::typed(TypeKey::new("version"), Value::from("1.2.3")));
    }

    #[test]
    fn test_truth_test_only_for_bool_targets() {
        let mut types = TypeRegistry::with_defaults();
        types.register(TypeSpec::new(TypeKey::new("toggle"), TypeKind::Opaque).operation(
            OpName::TruthTest,
            OpPlacement::StaticOnSource,
            TypeKey::new("toggle"),
            TypeKey::bool(),
            Arc::new(|_| Ok(Value::Bool(true))),
        ));
        let c = OperationConverter;
        assert!(c.can_convert(&TypeKey::new("toggle"), &TypeKey::bool(), &types));
        assert!(!c.can_convert(&TypeKey::new("toggle"), &TypeKey::int(), &types));
    }

    #[test]
    fn test_constructor_conversion() {
        let mut types = TypeRegistry::with_defaults();
        types.register(
            TypeSpec::new(TypeKey::new("label"), TypeKind::Opaque).constructor(
                TypeKey::string(),
                Arc::new(|v| Ok(Value::typed(TypeKey::new("label"), v))),
            ),
        );
        let c = ConstructorConverter;
        assert!(c.can_convert(&TypeKey::string(), &TypeKey::new("label"), &types));
        assert!(!c.can_convert(&TypeKey::int(), &TypeKey::new("label"), &types));
        assert_eq!(
            c.convert(Value::from("x"), &TypeKey::new("label"), &types)
                .unwrap(),
            Value::typed(TypeKey::new("label"), Value::from("x"))
        );
    }

    #[test]
    fn test_enum_name_case_sensitivity() {
        let types = registry_with_color();
        let sensitive = EnumNameConverter::new();
        let insensitive = EnumNameConverter::case_insensitive();
        assert!(sensitive
            .convert(Value::from("red"), &TypeKey::new("color"), &types)
            .is_err());
        assert_eq!(
            insensitive
                .convert(Value::from("red"), &TypeKey::new("color"), &types)
                .unwrap(),
            Value::typed(TypeKey::new("color"), Value::from("Red"))
        );
    }

    #[test]
    fn test_enum_member_back_to_string() {
        let types = registry_with_color();
        let c = EnumNameConverter::new();
        let member = Value::typed(TypeKey::new("color"), Value::from("Blue"));
        assert_eq!(
            c.convert(member, &TypeKey::string(), &types).unwrap(),
            Value::from("Blue")
        );
    }

    #[test]
    fn test_sequence_conversion_preserves_order_and_count() {
        let types = TypeRegistry::with_defaults();
        let c = SequenceConverter::new(default_item_converters());
        assert!(c.can_convert(&TypeKey::string_list(), &TypeKey::string_array(), &types));
        let input = Value::List(vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        let out = c
            .convert(input.clone(), &TypeKey::string_array(), &types)
            .unwrap();
        assert_eq!(out.as_list().unwrap().len(), 3);
        assert_eq!(out.to_string(), "a b c");
    }

    #[test]
    fn test_sequence_converts_items() {
        let mut types = TypeRegistry::with_defaults();
        types.register(
            TypeSpec::new(
                TypeKey::new("int_list"),
                TypeKind::Sequence {
                    item: TypeKey::int(),
                },
            )
            .from_items(TypeKey::int(), Arc::new(|items| Ok(Value::List(items)))),
        );
        let c = SequenceConverter::new(default_item_converters());
        let input = Value::List(vec![Value::from("1"), Value::from("2")]);
        let out = c.convert(input, &TypeKey::new("int_list"), &types).unwrap();
        assert_eq!(
            out,
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_unsupported_sequence_error_names_both_types() {
        let types = TypeRegistry::with_defaults();
        let c = SequenceConverter::new(default_item_converters());
        let err = c
            .convert(Value::List(Vec::new()), &TypeKey::int(), &types)
            .unwrap_err();
        assert_eq!(err.to_string(), "no conversion from string_list to int");
    }

    #[test]
    fn test_resolve_first_is_order_stable() {
        let types = TypeRegistry::with_defaults();
        let chain = default_item_converters();
        for _ in 0..3 {
            let picked = resolve_first(&chain, &TypeKey::string(), &TypeKey::int(), &types);
            assert!(picked.is_some());
            // Identity rejects the pair, so the scalar strategy (index 1)
            // must be selected each time.
            let picked = picked.unwrap();
            assert!(Arc::ptr_eq(picked, &chain[1]));
        }
    }
}
