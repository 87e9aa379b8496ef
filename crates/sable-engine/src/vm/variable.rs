//! Storage slots.
//!
//! A [`Variable`] is a shared handle to one storage slot. Slots start
//! undefined, hold a value, or alias another slot after a by-reference
//! assignment; reads and value-writes follow the alias chain, while a new
//! by-reference assignment rebinds the slot itself.

use std::cell::RefCell;
use std::rc::Rc;

use crate::vm::value::Value;

#[derive(Debug)]
enum Slot {
    Undefined,
    Value(Value),
    Alias(Variable),
}

/// A shared handle to one storage slot.
#[derive(Debug, Clone)]
pub struct Variable {
    inner: Rc<RefCell<Slot>>,
}

impl Default for Variable {
    fn default() -> Self {
        Self::new()
    }
}

impl Variable {
    /// A fresh undefined slot.
    pub fn new() -> Self {
        Variable {
            inner: Rc::new(RefCell::new(Slot::Undefined)),
        }
    }

    /// A fresh slot already holding `value`.
    pub fn with_value(value: Value) -> Self {
        Variable {
            inner: Rc::new(RefCell::new(Slot::Value(value))),
        }
    }

    /// Read the slot's value; undefined reads as null.
    pub fn get_value(&self) -> Value {
        match &*self.inner.borrow() {
            Slot::Undefined => Value::Null,
            Slot::Value(value) => value.clone(),
            Slot::Alias(target) => target.get_value(),
        }
    }

    /// Assign a value, copying array contents so the slot owns its data.
    /// Follows the alias chain: writing through an alias writes the
    /// referenced slot.
    pub fn set_value(&self, value: Value) {
        let target = self.alias_target();
        match target {
            Some(target) => target.set_value(value),
            None => *self.inner.borrow_mut() = Slot::Value(value.copy()),
        }
    }

    /// Rebind this slot to alias `target`. Unlike [`set_value`], this
    /// replaces the slot itself even when it currently aliases elsewhere.
    ///
    /// [`set_value`]: Variable::set_value
    pub fn set_reference(&self, target: &Variable) {
        *self.inner.borrow_mut() = Slot::Alias(target.clone());
    }

    /// True once the slot (or its alias target) holds any value.
    pub fn is_defined(&self) -> bool {
        match &*self.inner.borrow() {
            Slot::Undefined => false,
            Slot::Value(_) => true,
            Slot::Alias(target) => target.is_defined(),
        }
    }

    /// True when the slot holds a non-null value; the probe `isset` uses.
    pub fn is_set(&self) -> bool {
        self.is_defined() && self.get_value() != Value::Null
    }

    /// Two handles address the same slot.
    pub fn shares_slot_with(&self, other: &Variable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn alias_target(&self) -> Option<Variable> {
        match &*self.inner.borrow() {
            Slot::Alias(target) => Some(target.clone()),
            _ => None,
        }
    }
}
