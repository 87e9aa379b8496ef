//! Ordered array storage.
//!
//! Arrays preserve insertion order and key every entry by integer or
//! string. An explicit integer key bumps the auto-index to one past
//! itself; auto-indexed pushes take the current auto-index. The internal
//! pointer belongs to the array data, so a snapshot taken for iteration
//! carries its own cursor.

use rustc_hash::FxHashMap;

use crate::vm::value::Value;
use crate::vm::variable::Variable;

/// A normalized array key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    /// An integer key.
    Int(i64),
    /// A string key.
    Str(String),
}

impl ArrayKey {
    /// Normalize a value into a key.
    ///
    /// Floats truncate, booleans widen, null keys as the empty string,
    /// and canonical integer strings collapse to their integer form.
    pub fn from_value(value: &Value) -> ArrayKey {
        match value {
            Value::Int(i) => ArrayKey::Int(*i),
            Value::Float(f) => ArrayKey::Int(*f as i64),
            Value::Bool(b) => ArrayKey::Int(i64::from(*b)),
            Value::Null => ArrayKey::Str(String::new()),
            other => {
                let text = other.coerce_to_string();
                match canonical_integer(&text) {
                    Some(i) => ArrayKey::Int(i),
                    None => ArrayKey::Str(text),
                }
            }
        }
    }
}

/// True integer form only: no sign-less leading zeros, no whitespace.
fn canonical_integer(text: &str) -> Option<i64> {
    let parsed: i64 = text.parse().ok()?;
    if parsed.to_string() == text {
        Some(parsed)
    } else {
        None
    }
}

/// The backing store of one array value.
#[derive(Debug, Default)]
pub struct ArrayData {
    entries: Vec<(ArrayKey, Variable)>,
    index: FxHashMap<ArrayKey, usize>,
    next_index: i64,
    pointer: usize,
}

impl ArrayData {
    /// An empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the array holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries in insertion order.
    pub fn entries(&self) -> &[(ArrayKey, Variable)] {
        &self.entries
    }

    /// The entry at `position`, if any.
    pub fn entry_at(&self, position: usize) -> Option<&(ArrayKey, Variable)> {
        self.entries.get(position)
    }

    /// The internal pointer.
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Move the internal pointer.
    pub fn set_pointer(&mut self, pointer: usize) {
        self.pointer = pointer;
    }

    /// The slot stored under `key`, if present.
    pub fn get(&self, key: &ArrayKey) -> Option<Variable> {
        self.index.get(key).map(|&at| self.entries[at].1.clone())
    }

    /// The slot stored under `key`, created undefined when missing.
    pub fn element_for_write(&mut self, key: ArrayKey) -> Variable {
        if let Some(&at) = self.index.get(&key) {
            return self.entries[at].1.clone();
        }
        let slot = Variable::new();
        self.insert_slot(key, slot.clone());
        slot
    }

    /// A fresh slot under the next auto index, for `$a[] = ...` writes.
    pub fn append_slot(&mut self) -> Variable {
        let slot = Variable::new();
        self.insert_slot(ArrayKey::Int(self.next_index), slot.clone());
        slot
    }

    /// Append under the next auto index.
    pub fn push(&mut self, value: Value) {
        let slot = Variable::new();
        slot.set_value(value);
        self.insert_slot(ArrayKey::Int(self.next_index), slot);
    }

    /// Set the entry under `key`, keeping its position if it exists.
    pub fn set(&mut self, key: ArrayKey, value: Value) {
        self.element_for_write(key).set_value(value);
    }

    fn insert_slot(&mut self, key: ArrayKey, slot: Variable) {
        if let ArrayKey::Int(i) = key {
            if i >= self.next_index {
                self.next_index = i + 1;
            }
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, slot));
    }

    /// A structurally independent copy: every entry gets a fresh slot
    /// holding a copy of the value. Used by value assignment.
    pub fn deep_copy(&self) -> ArrayData {
        let mut copy = ArrayData::new();
        for (key, slot) in &self.entries {
            let fresh = Variable::new();
            fresh.set_value(slot.get_value());
            copy.insert_slot(key.clone(), fresh);
        }
        copy.next_index = self.next_index;
        copy
    }

    /// An iteration snapshot: the entry list is copied with a reset
    /// pointer, but the slots themselves are shared, so writing through a
    /// by-reference binding mutates the source array in place.
    pub fn snapshot(&self) -> ArrayData {
        ArrayData {
            entries: self.entries.clone(),
            index: self.index.clone(),
            next_index: self.next_index,
            pointer: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_bumps_auto_index() {
        let mut array = ArrayData::new();
        array.set(ArrayKey::Int(7), Value::Str("a".to_owned()));
        array.push(Value::Str("b".to_owned()));
        let keys: Vec<_> = array.entries().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, [ArrayKey::Int(7), ArrayKey::Int(8)]);
    }

    #[test]
    fn auto_index_starts_at_zero() {
        let mut array = ArrayData::new();
        array.push(Value::Int(2));
        assert_eq!(array.entries()[0].0, ArrayKey::Int(0));
        assert_eq!(array.entries()[0].1.get_value(), Value::Int(2));
    }

    #[test]
    fn numeric_string_keys_collapse() {
        assert_eq!(
            ArrayKey::from_value(&Value::Str("7".to_owned())),
            ArrayKey::Int(7)
        );
        assert_eq!(
            ArrayKey::from_value(&Value::Str("07".to_owned())),
            ArrayKey::Str("07".to_owned())
        );
        assert_eq!(ArrayKey::from_value(&Value::Float(3.9)), ArrayKey::Int(3));
    }

    #[test]
    fn snapshot_shares_slots_deep_copy_does_not() {
        let mut array = ArrayData::new();
        array.push(Value::Int(1));

        let snap = array.snapshot();
        snap.entries()[0].1.set_value(Value::Int(9));
        assert_eq!(array.entries()[0].1.get_value(), Value::Int(9));

        let copy = array.deep_copy();
        copy.entries()[0].1.set_value(Value::Int(5));
        assert_eq!(array.entries()[0].1.get_value(), Value::Int(9));
    }
}
