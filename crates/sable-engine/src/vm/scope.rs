//! Per-frame variable scopes.

use std::cell::{Cell, RefCell};

use rustc_hash::FxHashMap;

use crate::vm::value::Value;
use crate::vm::variable::Variable;

/// One invocation frame's variables.
///
/// Slots are created on first touch and never implicitly deleted. The
/// suppression counter nests: probes like `isset` suppress diagnostics for
/// the duration of their operand evaluation and restore on the way out,
/// fault or not.
#[derive(Debug, Default)]
pub struct Scope {
    variables: RefCell<FxHashMap<String, Variable>>,
    suppress: Cell<u32>,
}

impl Scope {
    /// A fresh scope with no receiver.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh method scope with `$this` bound to the receiver.
    pub fn with_this(this: Value) -> Self {
        let scope = Scope::new();
        scope.get_variable("this").set_value(this);
        scope
    }

    /// The slot behind `name`, created undefined when missing.
    pub fn get_variable(&self, name: &str) -> Variable {
        if let Some(slot) = self.variables.borrow().get(name) {
            return slot.clone();
        }
        let slot = Variable::new();
        self.variables
            .borrow_mut()
            .insert(name.to_owned(), slot.clone());
        slot
    }

    /// Replace the slot behind `name` outright.
    pub fn define_variable(&self, name: &str, slot: Variable) {
        self.variables.borrow_mut().insert(name.to_owned(), slot);
    }

    /// Enter a suppression span.
    pub fn suppress_errors(&self) {
        self.suppress.set(self.suppress.get() + 1);
    }

    /// Leave a suppression span.
    pub fn unsuppress_errors(&self) {
        self.suppress.set(self.suppress.get().saturating_sub(1));
    }

    /// True while any suppression span is active.
    pub fn errors_suppressed(&self) -> bool {
        self.suppress.get() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_persist_per_name() {
        let scope = Scope::new();
        let a = scope.get_variable("a");
        a.set_value(Value::Int(1));
        assert_eq!(scope.get_variable("a").get_value(), Value::Int(1));
    }

    #[test]
    fn suppression_nests() {
        let scope = Scope::new();
        scope.suppress_errors();
        scope.suppress_errors();
        scope.unsuppress_errors();
        assert!(scope.errors_suppressed());
        scope.unsuppress_errors();
        assert!(!scope.errors_suppressed());
    }
}
