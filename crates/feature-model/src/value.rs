//! Feature Values and Value Types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a feature or input column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Unknown,
    Bytes,
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    UnixTimestamp,
    BytesList,
    StringList,
    Int32List,
    Int64List,
    Float32List,
    Float64List,
    BoolList,
    UnixTimestampList,
    Null,
}

impl ValueType {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Unknown => "unknown",
            ValueType::Bytes => "bytes",
            ValueType::String => "string",
            ValueType::Int32 => "int32",
            ValueType::Int64 => "int64",
            ValueType::Float32 => "float32",
            ValueType::Float64 => "float64",
            ValueType::Bool => "bool",
            ValueType::UnixTimestamp => "unix_timestamp",
            ValueType::BytesList => "bytes_list",
            ValueType::StringList => "string_list",
            ValueType::Int32List => "int32_list",
            ValueType::Int64List => "int64_list",
            ValueType::Float32List => "float32_list",
            ValueType::Float64List => "float64_list",
            ValueType::BoolList => "bool_list",
            ValueType::UnixTimestampList => "unix_timestamp_list",
            ValueType::Null => "null",
        }
    }

    /// Whether a feature may be declared with this type
    pub fn is_declarable(&self) -> bool {
        !matches!(self, ValueType::Unknown | ValueType::Null)
    }

    /// Whether this is one of the numeric scalar types
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Int32 | ValueType::Int64 | ValueType::Float32 | ValueType::Float64
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ValueType::Int32 | ValueType::Int64)
    }

    pub fn is_list(&self) -> bool {
        self.element_type().is_some()
    }

    /// Element type of a list type, `None` for scalars
    pub fn element_type(&self) -> Option<ValueType> {
        match self {
            ValueType::BytesList => Some(ValueType::Bytes),
            ValueType::StringList => Some(ValueType::String),
            ValueType::Int32List => Some(ValueType::Int32),
            ValueType::Int64List => Some(ValueType::Int64),
            ValueType::Float32List => Some(ValueType::Float32),
            ValueType::Float64List => Some(ValueType::Float64),
            ValueType::BoolList => Some(ValueType::Bool),
            ValueType::UnixTimestampList => Some(ValueType::UnixTimestamp),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single feature value
///
/// `Null` stands for a value the caller could not supply, such as an entity
/// missing from the online store. It conforms to every declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bytes(Vec<u8>),
    String(String),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    /// Seconds since the Unix epoch
    UnixTimestamp(i64),
    BytesList(Vec<Vec<u8>>),
    StringList(Vec<String>),
    Int32List(Vec<i32>),
    Int64List(Vec<i64>),
    Float32List(Vec<f32>),
    Float64List(Vec<f64>),
    BoolList(Vec<bool>),
    UnixTimestampList(Vec<i64>),
}

impl Value {
    /// Get the type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bytes(_) => ValueType::Bytes,
            Value::String(_) => ValueType::String,
            Value::Int32(_) => ValueType::Int32,
            Value::Int64(_) => ValueType::Int64,
            Value::Float32(_) => ValueType::Float32,
            Value::Float64(_) => ValueType::Float64,
            Value::Bool(_) => ValueType::Bool,
            Value::UnixTimestamp(_) => ValueType::UnixTimestamp,
            Value::BytesList(_) => ValueType::BytesList,
            Value::StringList(_) => ValueType::StringList,
            Value::Int32List(_) => ValueType::Int32List,
            Value::Int64List(_) => ValueType::Int64List,
            Value::Float32List(_) => ValueType::Float32List,
            Value::Float64List(_) => ValueType::Float64List,
            Value::BoolList(_) => ValueType::BoolList,
            Value::UnixTimestampList(_) => ValueType::UnixTimestampList,
        }
    }

    /// Check whether this value may be stored under `value_type`
    pub fn conforms_to(&self, value_type: ValueType) -> bool {
        self.is_null() || self.value_type() == value_type
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Representative non-null value of a declared type.
    ///
    /// Used to probe registered transformations for their output shape.
    pub fn sample(value_type: ValueType) -> Value {
        match value_type {
            ValueType::Unknown | ValueType::Null => Value::Null,
            ValueType::Bytes => Value::Bytes(vec![0]),
            ValueType::String => Value::String("a".to_string()),
            ValueType::Int32 => Value::Int32(1),
            ValueType::Int64 => Value::Int64(1),
            ValueType::Float32 => Value::Float32(1.0),
            ValueType::Float64 => Value::Float64(1.0),
            ValueType::Bool => Value::Bool(true),
            ValueType::UnixTimestamp => Value::UnixTimestamp(0),
            ValueType::BytesList => Value::BytesList(vec![vec![0]]),
            ValueType::StringList => Value::StringList(vec!["a".to_string()]),
            ValueType::Int32List => Value::Int32List(vec![1]),
            ValueType::Int64List => Value::Int64List(vec![1]),
            ValueType::Float32List => Value::Float32List(vec![1.0]),
            ValueType::Float64List => Value::Float64List(vec![1.0]),
            ValueType::BoolList => Value::BoolList(vec![true]),
            ValueType::UnixTimestampList => Value::UnixTimestampList(vec![0]),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::UnixTimestamp(v) => write!(f, "@{}", v),
            other => write!(f, "<{}>", other.value_type()),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_conforms_to_any_type() {
        assert!(Value::Null.conforms_to(ValueType::Float32));
        assert!(Value::Null.conforms_to(ValueType::StringList));
    }

    #[test]
    fn test_conformance_is_exact() {
        assert!(Value::Float32(0.5).conforms_to(ValueType::Float32));
        assert!(!Value::Float32(0.5).conforms_to(ValueType::Float64));
        assert!(!Value::Int64(1).conforms_to(ValueType::Int32));
    }

    #[test]
    fn test_declarable_types() {
        assert!(ValueType::Float64.is_declarable());
        assert!(!ValueType::Unknown.is_declarable());
        assert!(!ValueType::Null.is_declarable());
    }

    #[test]
    fn test_sample_matches_type() {
        for ty in [ValueType::Bytes, ValueType::Int32, ValueType::Float64List, ValueType::Bool] {
            assert_eq!(Value::sample(ty).value_type(), ty);
        }
    }
}
