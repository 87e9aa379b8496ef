//! The call stack and diagnostic reporting.

use std::cell::RefCell;
use std::rc::Rc;

use sable_sdk::OutputSink;

use crate::error::ErrorLevel;
use crate::vm::scope::Scope;
use crate::vm::value::Value;

/// One active invocation.
#[derive(Debug)]
pub struct Call {
    /// The frame's variable scope.
    pub scope: Rc<Scope>,
    /// The bound receiver for method contexts.
    pub this: Option<Value>,
}

/// The ordered stack of active invocations.
///
/// Callers must pair every push with a pop around the invocation body,
/// including across faults and suspensions. Diagnostics route through
/// here so the active frame's suppression state applies.
pub struct CallStack {
    frames: RefCell<Vec<Call>>,
    stderr: Rc<RefCell<dyn OutputSink>>,
}

impl CallStack {
    /// An empty stack reporting diagnostics to `stderr`.
    pub fn new(stderr: Rc<RefCell<dyn OutputSink>>) -> Self {
        CallStack {
            frames: RefCell::new(Vec::new()),
            stderr,
        }
    }

    /// Push a frame with a fresh scope bound to `this`.
    pub fn push(&self, this: Option<Value>) -> Rc<Scope> {
        let scope = Rc::new(match &this {
            Some(receiver) => Scope::with_this(receiver.clone()),
            None => Scope::new(),
        });
        self.frames.borrow_mut().push(Call {
            scope: Rc::clone(&scope),
            this,
        });
        scope
    }

    /// Push a frame around an existing scope (the reused global scope).
    pub fn push_scope(&self, scope: Rc<Scope>) {
        self.frames.borrow_mut().push(Call { scope, this: None });
    }

    /// Pop the top frame unconditionally.
    pub fn pop(&self) {
        self.frames.borrow_mut().pop();
    }

    /// The active frame's scope.
    ///
    /// The orchestrator pushes the top-level frame before anything
    /// executes, so an empty stack here is a harness bug.
    pub fn current_scope(&self) -> Rc<Scope> {
        let frames = self.frames.borrow();
        match frames.last() {
            Some(call) => Rc::clone(&call.scope),
            None => panic!("no active call frame"),
        }
    }

    /// The active frame's bound receiver.
    pub fn current_this(&self) -> Option<Value> {
        self.frames.borrow().last().and_then(|call| call.this.clone())
    }

    /// Report a non-fatal diagnostic, honoring the active suppression span.
    pub fn report(&self, level: ErrorLevel, message: &str) {
        if self.current_scope().errors_suppressed() {
            return;
        }
        self.stderr
            .borrow_mut()
            .write(&format!("{}: {}\n", level.as_str(), message));
    }
}
