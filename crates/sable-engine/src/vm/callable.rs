//! Callables stored in namespaces and classes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::compiler::FunctionDef;
use crate::error::FatalError;
use crate::runtime::State;
use crate::vm::namespace::Namespace;
use crate::vm::scope::Scope;
use crate::vm::value::Value;

/// A user-defined function, method, or closure.
pub struct UserFunction {
    /// The compiled body.
    pub def: Rc<FunctionDef>,
    /// The namespace the function was defined in; its body resolves
    /// names against this namespace, not the caller's.
    pub namespace: Rc<RefCell<Namespace>>,
    /// The defining scope, present for closures so explicit captures can
    /// be bound at invocation time.
    pub captured: Option<Rc<Scope>>,
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("params", &self.def.params)
            .field("captures", &self.def.bindings.len())
            .finish()
    }
}

/// A built-in implemented by the engine itself.
pub struct NativeFunction {
    /// The name the builtin is registered under.
    pub name: String,
    body: Box<dyn Fn(&State, Vec<Value>) -> Result<Value, FatalError>>,
}

impl NativeFunction {
    /// Wrap a native body.
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&State, Vec<Value>) -> Result<Value, FatalError> + 'static,
    ) -> Self {
        NativeFunction {
            name: name.into(),
            body: Box::new(body),
        }
    }

    /// Run the builtin.
    pub fn call(&self, state: &State, args: Vec<Value>) -> Result<Value, FatalError> {
        (self.body)(state, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish()
    }
}

/// Anything a call site can invoke.
#[derive(Debug, Clone)]
pub enum Callable {
    /// A compiled user function.
    User(Rc<UserFunction>),
    /// An engine builtin.
    Native(Rc<NativeFunction>),
}

impl Callable {
    /// Declared parameter count; unknown for builtins.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Callable::User(function) => Some(function.def.params.len()),
            Callable::Native(_) => None,
        }
    }
}
