//! core::value
//!
//! Member values and their declared types.
//!
//! A [`Value`] is what a node's non-node-typed member holds. Values are
//! serialized adjacently tagged (`{"type": "double", "value": 21.5}`) so
//! a round trip through JSON never changes a member's type.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::NodeId;

/// Errors from value conversion.
#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    #[error("expected a {expected} value, found {found}")]
    TypeMismatch { expected: ValueType, found: String },
}

/// A member value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    String(String),
    NodeId(NodeId),
    DateTime(DateTime<Utc>),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int64(_) => "int64",
            Value::UInt64(_) => "uint64",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::NodeId(_) => "node id",
            Value::DateTime(_) => "date time",
            Value::List(_) => "list",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Int64(i) => Some(*i as f64),
            Value::UInt64(u) => Some(*u as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::UInt64(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node_id(&self) -> Option<&NodeId> {
        match self {
            Value::NodeId(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int64(i) => write!(f, "{}", i),
            Value::UInt64(u) => write!(f, "{}", u),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{:?}", s),
            Value::NodeId(id) => write!(f, "{}", id),
            Value::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NodeId> for Value {
    fn from(v: NodeId) -> Self {
        Value::NodeId(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl TryFrom<Value> for f64 {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        value.as_f64().ok_or_else(|| ValueError::TypeMismatch {
            expected: ValueType::Double,
            found: value.kind_name().to_string(),
        })
    }
}

impl TryFrom<Value> for String {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(ValueError::TypeMismatch {
                expected: ValueType::String,
                found: other.kind_name().to_string(),
            }),
        }
    }
}

/// Declared type of a value member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Boolean,
    Int64,
    UInt64,
    Double,
    String,
    NodeId,
    DateTime,
    List,
    /// Any representable value.
    Variant,
    /// Held by the node but never serialized.
    Opaque,
}

impl ValueType {
    /// True if values of this type can appear in an attribute map.
    pub fn is_representable(self) -> bool {
        !matches!(self, ValueType::Opaque)
    }

    /// True if `value` may be stored in a member of this type.
    ///
    /// `Null` is accepted by every representable type and means "unset".
    pub fn accepts(self, value: &Value) -> bool {
        if !self.is_representable() {
            return false;
        }
        if value.is_null() {
            return true;
        }
        match self {
            ValueType::Variant => true,
            ValueType::Boolean => matches!(value, Value::Boolean(_)),
            ValueType::Int64 => matches!(value, Value::Int64(_)),
            ValueType::UInt64 => matches!(value, Value::UInt64(_)),
            ValueType::Double => matches!(value, Value::Double(_)),
            ValueType::String => matches!(value, Value::String(_)),
            ValueType::NodeId => matches!(value, Value::NodeId(_)),
            ValueType::DateTime => matches!(value, Value::DateTime(_)),
            ValueType::List => matches!(value, Value::List(_)),
            ValueType::Opaque => false,
        }
    }

    /// Checked form of [`accepts`](Self::accepts).
    pub fn check(self, value: &Value) -> Result<(), ValueError> {
        if self.accepts(value) {
            Ok(())
        } else {
            Err(ValueError::TypeMismatch {
                expected: self,
                found: value.kind_name().to_string(),
            })
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Boolean => "boolean",
            ValueType::Int64 => "int64",
            ValueType::UInt64 => "uint64",
            ValueType::Double => "double",
            ValueType::String => "string",
            ValueType::NodeId => "node id",
            ValueType::DateTime => "date time",
            ValueType::List => "list",
            ValueType::Variant => "variant",
            ValueType::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_json_keeps_type() {
        let v = Value::Double(0.0);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"type":"double","value":0.0}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn null_serializes_without_content() {
        let json = serde_json::to_string(&Value::Null).unwrap();
        assert_eq!(json, r#"{"type":"null"}"#);
    }

    #[test]
    fn nested_list() {
        let v = Value::List(vec![Value::from(1i64), Value::from("two")]);
        let back: Value = serde_json::from_str(&serde_json::to_string(&v).unwrap()).unwrap();
        assert_eq!(back, v);
        assert_eq!(v.to_string(), "[1, \"two\"]");
    }

    #[test]
    fn accepts_matches_variant() {
        assert!(ValueType::Double.accepts(&Value::Double(1.5)));
        assert!(!ValueType::Double.accepts(&Value::from("1.5")));
        assert!(ValueType::Double.accepts(&Value::Null));
        assert!(ValueType::Variant.accepts(&Value::from(true)));
        assert!(!ValueType::Opaque.accepts(&Value::Null));
    }

    #[test]
    fn check_reports_mismatch() {
        let err = ValueType::String.check(&Value::Int64(3)).unwrap_err();
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                expected: ValueType::String,
                found: "int64".into()
            }
        );
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Int64(3).as_f64(), Some(3.0));
        assert_eq!(Value::UInt64(u64::MAX).as_i64(), None);
        assert_eq!(f64::try_from(Value::Double(2.5)).unwrap(), 2.5);
        assert!(String::try_from(Value::Boolean(true)).is_err());
    }
}
