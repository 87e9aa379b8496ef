//! Native value representation crossing the host boundary.

use std::fmt;

/// A value as seen from the host side of the bridge.
///
/// Engine values are coerced into this representation when they are handed
/// to a [`HostObject`](crate::HostObject) method or reported as a program's
/// terminal result. References and storage slots never cross the boundary;
/// a `NativeValue` is always a plain value.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A double-precision float.
    Float(f64),
    /// A string.
    Str(String),
    /// An ordered array of key/value entries, preserving insertion order.
    Array(Vec<(NativeKey, NativeValue)>),
}

/// An array key as seen from the host side.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeKey {
    /// An integer key.
    Int(i64),
    /// A string key.
    Str(String),
}

impl NativeValue {
    /// The type tag this value reports.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            NativeValue::Null => TypeTag::Null,
            NativeValue::Bool(_) => TypeTag::Boolean,
            NativeValue::Int(_) => TypeTag::Integer,
            NativeValue::Float(_) => TypeTag::Float,
            NativeValue::Str(_) => TypeTag::String,
            NativeValue::Array(_) => TypeTag::Array,
        }
    }
}

impl From<i64> for NativeValue {
    fn from(value: i64) -> Self {
        NativeValue::Int(value)
    }
}

impl From<f64> for NativeValue {
    fn from(value: f64) -> Self {
        NativeValue::Float(value)
    }
}

impl From<bool> for NativeValue {
    fn from(value: bool) -> Self {
        NativeValue::Bool(value)
    }
}

impl From<&str> for NativeValue {
    fn from(value: &str) -> Self {
        NativeValue::Str(value.to_owned())
    }
}

impl From<String> for NativeValue {
    fn from(value: String) -> Self {
        NativeValue::Str(value)
    }
}

/// The type tag paired with a terminal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// Null.
    Null,
    /// Boolean.
    Boolean,
    /// Integer.
    Integer,
    /// Float.
    Float,
    /// String.
    String,
    /// Array.
    Array,
    /// Object.
    Object,
}

impl TypeTag {
    /// The tag's conventional lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
