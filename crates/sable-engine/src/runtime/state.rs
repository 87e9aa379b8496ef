//! Per-pass run state.
//!
//! Every execution pass (the first one and each resume pass) gets a fresh
//! state: a clean namespace tree with builtins installed, an empty call
//! stack, and a fresh global scope with the host's exposed objects bound.
//! Only the output already written and the host's own side effects
//! survive from one pass to the next.

use std::cell::RefCell;
use std::rc::Rc;

use sable_sdk::{HostObject, OutputSink};

use crate::error::{ErrorLevel, FatalError};
use crate::runtime::timer::Timer;
use crate::vm::builtins;
use crate::vm::call_stack::CallStack;
use crate::vm::namespace::Namespace;
use crate::vm::object::ObjectData;
use crate::vm::scope::Scope;
use crate::vm::value::Value;

/// Everything one execution pass runs against.
pub struct State {
    global_namespace: Rc<RefCell<Namespace>>,
    call_stack: CallStack,
    global_scope: Rc<Scope>,
    stdout: Rc<RefCell<dyn OutputSink>>,
    timer: Timer,
    resume_value: Option<Value>,
}

impl State {
    /// Build a clean state with builtins installed and the host's
    /// exposed objects bound as global variables.
    pub fn new(
        stdout: Rc<RefCell<dyn OutputSink>>,
        stderr: Rc<RefCell<dyn OutputSink>>,
        timer: Timer,
        exposed: &[(String, Rc<dyn HostObject>)],
        resume_value: Option<Value>,
    ) -> Result<Self, FatalError> {
        let global_namespace = Namespace::global();
        builtins::install(&global_namespace)?;

        let global_scope = Rc::new(Scope::new());
        for (name, host) in exposed {
            global_scope
                .get_variable(name)
                .set_value(Value::from_object(ObjectData::bridged(Rc::clone(host))));
        }

        Ok(State {
            global_namespace,
            call_stack: CallStack::new(stderr),
            global_scope,
            stdout,
            timer,
            resume_value,
        })
    }

    /// The global namespace root.
    pub fn global_namespace(&self) -> Rc<RefCell<Namespace>> {
        Rc::clone(&self.global_namespace)
    }

    /// The run's call stack.
    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    /// The reused top-level scope.
    pub fn global_scope(&self) -> Rc<Scope> {
        Rc::clone(&self.global_scope)
    }

    /// Write program output.
    pub fn write_out(&self, text: &str) {
        self.stdout.borrow_mut().write(text);
    }

    /// Report a non-fatal diagnostic through the call stack.
    pub fn report(&self, level: ErrorLevel, message: &str) {
        self.call_stack.report(level, message);
    }

    /// Fail once the run's deadline has passed.
    pub fn check_deadline(&self) -> Result<(), FatalError> {
        self.timer.check()
    }

    /// The settled value a resume pass injects, if this is one.
    pub fn resume_value(&self) -> Option<Value> {
        self.resume_value.clone()
    }
}
