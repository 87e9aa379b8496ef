//! The engine's value representation.
//!
//! Values are cheap to clone: array and object variants clone a shared
//! handle, and only [`Value::copy`] (used by value assignment) duplicates
//! array contents. Operator evaluation resolves to the capability methods
//! here; arithmetic over types with no rule is a fatal condition, not a
//! coercion.

use std::cell::RefCell;
use std::rc::Rc;

use sable_sdk::{NativeKey, NativeValue, TypeTag};

use crate::error::FatalError;
use crate::vm::array::{ArrayData, ArrayKey};
use crate::vm::object::ObjectData;

/// One engine value.
#[derive(Debug, Clone)]
pub enum Value {
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
    /// A shared array handle.
    Array(Rc<RefCell<ArrayData>>),
    /// A shared object handle.
    Object(Rc<RefCell<ObjectData>>),
}

/// A value coerced for arithmetic.
#[derive(Debug, Clone, Copy)]
enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    fn as_float(self) -> f64 {
        match self {
            Numeric::Int(i) => i as f64,
            Numeric::Float(f) => f,
        }
    }
}

impl Value {
    /// An empty array value.
    pub fn empty_array() -> Value {
        Value::Array(Rc::new(RefCell::new(ArrayData::new())))
    }

    /// Wrap array data into a value.
    pub fn from_array(data: ArrayData) -> Value {
        Value::Array(Rc::new(RefCell::new(data)))
    }

    /// Wrap object data into a value.
    pub fn from_object(data: ObjectData) -> Value {
        Value::Object(Rc::new(RefCell::new(data)))
    }

    /// The type tag this value reports.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Int(_) => TypeTag::Integer,
            Value::Float(_) => TypeTag::Float,
            Value::Str(_) => TypeTag::String,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
        }
    }

    /// The copy taken by value assignment: arrays duplicate their
    /// contents, objects stay shared.
    pub fn copy(&self) -> Value {
        match self {
            Value::Array(data) => Value::from_array(data.borrow().deep_copy()),
            other => other.clone(),
        }
    }

    /// Boolean coercion. The empty string and `"0"` are false; an empty
    /// array is false; every object is true.
    pub fn coerce_to_boolean(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty() && s != "0",
            Value::Array(data) => !data.borrow().is_empty(),
            Value::Object(_) => true,
        }
    }

    /// String coercion. Floats with no fractional part print without one.
    pub fn coerce_to_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => "1".to_owned(),
            Value::Bool(false) => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::Array(_) => "Array".to_owned(),
            Value::Object(_) => "Object".to_owned(),
        }
    }

    fn numeric(&self) -> Result<Numeric, FatalError> {
        match self {
            Value::Null => Ok(Numeric::Int(0)),
            Value::Bool(b) => Ok(Numeric::Int(i64::from(*b))),
            Value::Int(i) => Ok(Numeric::Int(*i)),
            Value::Float(f) => Ok(Numeric::Float(*f)),
            Value::Str(s) => Ok(parse_numeric_prefix(s)),
            Value::Array(_) | Value::Object(_) => Err(FatalError::UnsupportedOperandTypes),
        }
    }

    /// `+`
    pub fn add(&self, other: &Value) -> Result<Value, FatalError> {
        match (self.numeric()?, other.numeric()?) {
            (Numeric::Int(a), Numeric::Int(b)) => Ok(match a.checked_add(b) {
                Some(sum) => Value::Int(sum),
                None => Value::Float(a as f64 + b as f64),
            }),
            (a, b) => Ok(Value::Float(a.as_float() + b.as_float())),
        }
    }

    /// `-`
    pub fn subtract(&self, other: &Value) -> Result<Value, FatalError> {
        match (self.numeric()?, other.numeric()?) {
            (Numeric::Int(a), Numeric::Int(b)) => Ok(match a.checked_sub(b) {
                Some(diff) => Value::Int(diff),
                None => Value::Float(a as f64 - b as f64),
            }),
            (a, b) => Ok(Value::Float(a.as_float() - b.as_float())),
        }
    }

    /// `*`
    pub fn multiply(&self, other: &Value) -> Result<Value, FatalError> {
        match (self.numeric()?, other.numeric()?) {
            (Numeric::Int(a), Numeric::Int(b)) => Ok(match a.checked_mul(b) {
                Some(product) => Value::Int(product),
                None => Value::Float(a as f64 * b as f64),
            }),
            (a, b) => Ok(Value::Float(a.as_float() * b.as_float())),
        }
    }

    /// `/` — integer division stays integral when exact; division by
    /// zero yields false.
    pub fn divide(&self, other: &Value) -> Result<Value, FatalError> {
        let (a, b) = (self.numeric()?, other.numeric()?);
        if b.as_float() == 0.0 {
            return Ok(Value::Bool(false));
        }
        match (a, b) {
            (Numeric::Int(a), Numeric::Int(b)) if a % b == 0 => Ok(Value::Int(a / b)),
            (a, b) => Ok(Value::Float(a.as_float() / b.as_float())),
        }
    }

    /// `.`
    pub fn concat(&self, other: &Value) -> Result<Value, FatalError> {
        let mut text = self.coerce_to_string();
        text.push_str(&other.coerce_to_string());
        Ok(Value::Str(text))
    }

    /// `<<`
    pub fn shift_left_by(&self, other: &Value) -> Result<Value, FatalError> {
        let (a, b) = (self.to_int()?, self.shift_amount(other)?);
        Ok(Value::Int(a.wrapping_shl(b)))
    }

    /// `>>`
    pub fn shift_right_by(&self, other: &Value) -> Result<Value, FatalError> {
        let (a, b) = (self.to_int()?, self.shift_amount(other)?);
        Ok(Value::Int(a.wrapping_shr(b)))
    }

    fn to_int(&self) -> Result<i64, FatalError> {
        Ok(match self.numeric()? {
            Numeric::Int(i) => i,
            Numeric::Float(f) => f as i64,
        })
    }

    fn shift_amount(&self, other: &Value) -> Result<u32, FatalError> {
        Ok(other.to_int()?.rem_euclid(64) as u32)
    }

    /// `==`
    pub fn is_equal_to(&self, other: &Value) -> Result<Value, FatalError> {
        Ok(Value::Bool(self.loosely_equals(other)))
    }

    /// `!=`
    pub fn is_not_equal_to(&self, other: &Value) -> Result<Value, FatalError> {
        Ok(Value::Bool(!self.loosely_equals(other)))
    }

    /// `===`
    pub fn is_identical_to(&self, other: &Value) -> Result<Value, FatalError> {
        Ok(Value::Bool(self.strictly_equals(other)))
    }

    /// `!==`
    pub fn is_not_identical_to(&self, other: &Value) -> Result<Value, FatalError> {
        Ok(Value::Bool(!self.strictly_equals(other)))
    }

    /// `<`
    pub fn is_less_than(&self, other: &Value) -> Result<Value, FatalError> {
        Ok(Value::Bool(
            self.numeric()?.as_float() < other.numeric()?.as_float(),
        ))
    }

    /// Prefix `+`
    pub fn to_positive(&self) -> Result<Value, FatalError> {
        Ok(match self.numeric()? {
            Numeric::Int(i) => Value::Int(i),
            Numeric::Float(f) => Value::Float(f),
        })
    }

    /// Prefix `-`
    pub fn to_negative(&self) -> Result<Value, FatalError> {
        Ok(match self.numeric()? {
            Numeric::Int(i) => Value::Int(-i),
            Numeric::Float(f) => Value::Float(-f),
        })
    }

    /// Prefix `~`
    pub fn ones_complement(&self) -> Result<Value, FatalError> {
        Ok(Value::Int(!self.to_int()?))
    }

    /// The value one step up, as increment produces.
    pub fn incremented(&self) -> Result<Value, FatalError> {
        self.add(&Value::Int(1))
    }

    /// The value one step down, as decrement produces.
    pub fn decremented(&self) -> Result<Value, FatalError> {
        self.subtract(&Value::Int(1))
    }

    fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(_), _) | (_, Value::Bool(_)) => {
                self.coerce_to_boolean() == other.coerce_to_boolean()
            }
            (Value::Null, Value::Str(s)) | (Value::Str(s), Value::Null) => s.is_empty(),
            (Value::Null, other) | (other, Value::Null) => !other.coerce_to_boolean(),
            (Value::Str(a), Value::Str(b)) => {
                match (parse_full_numeric(a), parse_full_numeric(b)) {
                    (Some(a), Some(b)) => a.as_float() == b.as_float(),
                    _ => a == b,
                }
            }
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.entries().iter().all(|(key, slot)| match b.get(key) {
                        Some(other) => slot.get_value().loosely_equals(&other.get_value()),
                        None => false,
                    })
            }
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(_), _)
            | (_, Value::Array(_))
            | (Value::Object(_), _)
            | (_, Value::Object(_)) => false,
            _ => match (self.numeric(), other.numeric()) {
                (Ok(a), Ok(b)) => a.as_float() == b.as_float(),
                _ => false,
            },
        }
    }

    fn strictly_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || {
                    let (a, b) = (a.borrow(), b.borrow());
                    a.len() == b.len()
                        && a.entries().iter().zip(b.entries()).all(
                            |((ak, av), (bk, bv))| {
                                ak == bk && av.get_value().strictly_equals(&bv.get_value())
                            },
                        )
                }
            }
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Coerce to the host-side representation. Array entries coerce
    /// recursively; objects flatten to their property entries.
    pub fn to_native(&self) -> NativeValue {
        match self {
            Value::Null => NativeValue::Null,
            Value::Bool(b) => NativeValue::Bool(*b),
            Value::Int(i) => NativeValue::Int(*i),
            Value::Float(f) => NativeValue::Float(*f),
            Value::Str(s) => NativeValue::Str(s.clone()),
            Value::Array(data) => NativeValue::Array(
                data.borrow()
                    .entries()
                    .iter()
                    .map(|(key, slot)| {
                        let key = match key {
                            ArrayKey::Int(i) => NativeKey::Int(*i),
                            ArrayKey::Str(s) => NativeKey::Str(s.clone()),
                        };
                        (key, slot.get_value().to_native())
                    })
                    .collect(),
            ),
            Value::Object(data) => NativeValue::Array(
                data.borrow()
                    .properties()
                    .iter()
                    .map(|(name, slot)| {
                        (NativeKey::Str(name.clone()), slot.get_value().to_native())
                    })
                    .collect(),
            ),
        }
    }

    /// Lift a host-side value into the engine.
    pub fn from_native(native: &NativeValue) -> Value {
        match native {
            NativeValue::Null => Value::Null,
            NativeValue::Bool(b) => Value::Bool(*b),
            NativeValue::Int(i) => Value::Int(*i),
            NativeValue::Float(f) => Value::Float(*f),
            NativeValue::Str(s) => Value::Str(s.clone()),
            NativeValue::Array(entries) => {
                let mut data = ArrayData::new();
                for (key, value) in entries {
                    let key = match key {
                        NativeKey::Int(i) => ArrayKey::Int(*i),
                        NativeKey::Str(s) => ArrayKey::Str(s.clone()),
                    };
                    data.set(key, Value::from_native(value));
                }
                Value::from_array(data)
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strictly_equals(other)
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Leading numeric prefix; non-numeric text coerces to integer zero.
fn parse_numeric_prefix(text: &str) -> Numeric {
    let trimmed = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (at, c) in trimmed.char_indices() {
        match c {
            '+' | '-' if at == 0 => end = at + 1,
            '0'..='9' => {
                seen_digit = true;
                end = at + 1;
            }
            '.' if !seen_dot => {
                seen_dot = true;
                end = at + 1;
            }
            _ => break,
        }
    }
    if !seen_digit {
        return Numeric::Int(0);
    }
    let prefix = &trimmed[..end];
    if seen_dot {
        Numeric::Float(prefix.parse().unwrap_or(0.0))
    } else {
        Numeric::Int(prefix.parse().unwrap_or(0))
    }
}

/// The whole string as a number, or nothing.
fn parse_full_numeric(text: &str) -> Option<Numeric> {
    let trimmed = text.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Numeric::Int(i));
    }
    trimmed.parse::<f64>().ok().map(Numeric::Float)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_addition_stays_integral() {
        let sum = Value::Int(4).add(&Value::Int(2)).unwrap();
        assert_eq!(sum, Value::Int(6));
    }

    #[test]
    fn mixed_addition_promotes_to_float() {
        let sum = Value::Int(1).add(&Value::Float(0.5)).unwrap();
        assert_eq!(sum, Value::Float(1.5));
    }

    #[test]
    fn array_arithmetic_is_fatal() {
        let err = Value::empty_array().add(&Value::Int(1)).unwrap_err();
        assert_eq!(err, FatalError::UnsupportedOperandTypes);
    }

    #[test]
    fn exact_integer_division_stays_integral() {
        assert_eq!(Value::Int(6).divide(&Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(
            Value::Int(7).divide(&Value::Int(2)).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(
            Value::Int(7).divide(&Value::Int(0)).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn boolean_coercion_edge_strings() {
        assert!(!Value::Str(String::new()).coerce_to_boolean());
        assert!(!Value::Str("0".to_owned()).coerce_to_boolean());
        assert!(Value::Str("0.0".to_owned()).coerce_to_boolean());
        assert!(!Value::empty_array().coerce_to_boolean());
    }

    #[test]
    fn integral_floats_print_without_fraction() {
        assert_eq!(Value::Float(2.0).coerce_to_string(), "2");
        assert_eq!(Value::Float(1.5).coerce_to_string(), "1.5");
    }

    #[test]
    fn loose_equality_coerces_numeric_strings() {
        let eq = Value::Str("7".to_owned())
            .is_equal_to(&Value::Int(7))
            .unwrap();
        assert_eq!(eq, Value::Bool(true));
        let ne = Value::Str("abc".to_owned())
            .is_identical_to(&Value::Str("abc".to_owned()))
            .unwrap();
        assert_eq!(ne, Value::Bool(true));
    }

    #[test]
    fn copy_detaches_array_contents() {
        let original = Value::empty_array();
        if let Value::Array(data) = &original {
            data.borrow_mut().push(Value::Int(1));
        }
        let copy = original.copy();
        if let Value::Array(data) = &copy {
            data.borrow_mut().push(Value::Int(2));
        }
        if let Value::Array(data) = &original {
            assert_eq!(data.borrow().len(), 1);
        }
    }
}
