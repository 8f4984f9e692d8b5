//! Dynamic values and supported field types
//!
//! Provides [`Value`], the value model every field stores, and [`Dtype`],
//! the set of scalar types the schema layer supports.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

use crate::error::DefinitionError;

/// A configuration value
///
/// `Null` plays the role of "unset": optional fields may hold it and list
/// items may be `Null` regardless of the item type.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// No value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(#[serde(serialize_with = "serialize_float")] f64),
    /// Text
    Str(String),
    /// Ordered sequence (possibly nested)
    List(Vec<Value>),
    /// String-keyed mapping, in insertion order
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Check for `Null`
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the runtime type, as used in error messages
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "dict",
        }
    }

    /// Get as bool
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    #[inline]
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float (integers widen)
    #[inline]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as list slice
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get as mapping
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(items) => Some(items),
            _ => None,
        }
    }

    /// Check whether this value is or contains a mapping
    #[must_use]
    pub fn contains_map(&self) -> bool {
        match self {
            Self::Map(_) => true,
            Self::List(items) => items.iter().any(Self::contains_map),
            _ => false,
        }
    }

    /// Convert to a JSON value
    ///
    /// Non-finite floats have no JSON number form and become their script
    /// literal (`".inf"`, `"-.inf"`, `".nan"`).
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or_else(|| JsonValue::String(self.to_literal()), JsonValue::Number),
            Self::Str(s) => JsonValue::String(s.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(items) => JsonValue::Object(
                items.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Convert from a JSON value
    #[must_use]
    pub fn from_json(json: &JsonValue) -> Option<Self> {
        Some(match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64()?),
            },
            JsonValue::String(s) => Self::Str(s.clone()),
            JsonValue::Array(items) => {
                Self::List(items.iter().map(Self::from_json).collect::<Option<_>>()?)
            }
            JsonValue::Object(items) => Self::Map(
                items
                    .iter()
                    .map(|(k, v)| Some((k.clone(), Self::from_json(v)?)))
                    .collect::<Option<_>>()?,
            ),
        })
    }

    /// Convert from a YAML value (used by the script loader)
    pub(crate) fn from_yaml(yaml: &serde_yaml::Value) -> Option<Self> {
        use serde_yaml::Value as Yaml;
        Some(match yaml {
            Yaml::Null => Self::Null,
            Yaml::Bool(b) => Self::Bool(*b),
            Yaml::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64()?),
            },
            Yaml::String(s) => Self::Str(s.clone()),
            Yaml::Sequence(items) => {
                Self::List(items.iter().map(Self::from_yaml).collect::<Option<_>>()?)
            }
            Yaml::Mapping(items) => Self::Map(
                items
                    .iter()
                    .map(|(k, v)| Some((k.as_str()?.to_string(), Self::from_yaml(v)?)))
                    .collect::<Option<_>>()?,
            ),
            Yaml::Tagged(_) => return None,
        })
    }

    /// Render as a literal the script loader can read back
    #[must_use]
    pub fn to_literal(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) if f.is_nan() => ".nan".to_string(),
            Self::Float(f) if f.is_infinite() => {
                let literal = if f.is_sign_positive() { ".inf" } else { "-.inf" };
                literal.to_string()
            }
            Self::Float(f) => format!("{f:?}"),
            Self::Str(s) => serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}")),
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(Self::to_literal).collect();
                format!("[{}]", inner.join(", "))
            }
            Self::Map(items) => {
                let inner: Vec<String> = items
                    .iter()
                    .map(|(k, v)| format!("{}: {}", Self::Str(k.clone()).to_literal(), v.to_literal()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_float<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_str(&Value::Float(*value).to_literal())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(items) => {
                write!(f, "{{")?;
                for (i, (key, item)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: {item}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(items: IndexMap<String, Value>) -> Self {
        Self::Map(items)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Scalar types supported by the schema layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    /// `bool`
    Bool,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `str`
    Str,
}

impl Dtype {
    /// Type name as used in messages
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
        }
    }

    /// Check whether a non-null value is an instance of this type
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Bool, Value::Bool(_))
                | (Self::Int, Value::Int(_))
                | (Self::Float, Value::Float(_))
                | (Self::Str, Value::Str(_))
        )
    }

    /// Apply the lossless coercions (`int` → `float`)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coerce(self, value: Value) -> Value {
        match (self, value) {
            (Self::Float, Value::Int(i)) => Value::Float(i as f64),
            (_, other) => other,
        }
    }

    /// Whether the type is numeric (eligible for range fields)
    #[inline]
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

impl Display for Dtype {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dtype {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(Self::Bool),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "str" => Ok(Self::Str),
            other => Err(DefinitionError::UnsupportedDtype(other.to_string())),
        }
    }
}
