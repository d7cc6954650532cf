//! Dynamic runtime values
//!
//! Commands, converters and handlers exchange values through the [`Value`]
//! enum rather than concrete Rust types: the command tree is assembled from
//! registration data, so the concrete types involved are not known until the
//! tree is built. Nominally-typed values (enumeration members, constructed
//! domain values) are carried as [`Value::Typed`], a type key wrapped around
//! a structural representation.

use std::fmt;

use chrono::NaiveDateTime;

/// Opaque identifier for a registered type.
///
/// Type keys name entries in the
/// [`TypeRegistry`](crate::type_registry::TypeRegistry); the built-in keys
/// cover the scalar and string-sequence types the binder works with
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(String);

impl TypeKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the built-in string type.
    pub fn string() -> Self {
        Self::new("string")
    }

    /// Key of the built-in boolean type.
    pub fn bool() -> Self {
        Self::new("bool")
    }

    /// Key of the built-in integer type.
    pub fn int() -> Self {
        Self::new("int")
    }

    /// Key of the built-in floating-point type.
    pub fn float() -> Self {
        Self::new("float")
    }

    /// Key of the built-in date-time type.
    pub fn datetime() -> Self {
        Self::new("datetime")
    }

    /// Key of the built-in ordered string sequence type.
    pub fn string_list() -> Self {
        Self::new("string_list")
    }

    /// Key of the built-in string array type.
    ///
    /// Both sequence keys are represented by [`Value::List`] at runtime; the
    /// distinct keys preserve the binder's list-then-array conversion
    /// precedence.
    pub fn string_array() -> Self {
        Self::new("string_array")
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A nominally-typed value: a registered type key over a structural
/// representation.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub ty: TypeKey,
    pub repr: Box<Value>,
}

/// A dynamically-typed runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value (an unset option with no declared default).
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(NaiveDateTime),
    List(Vec<Value>),
    Typed(TypedValue),
}

impl Value {
    /// Wrap `repr` as a value of the registered type `ty`.
    pub fn typed(ty: TypeKey, repr: Value) -> Self {
        Value::Typed(TypedValue {
            ty,
            repr: Box::new(repr),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::Typed(_) => "typed",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{dt}"),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Typed(tv) => write!(f, "{}", tv.repr),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
