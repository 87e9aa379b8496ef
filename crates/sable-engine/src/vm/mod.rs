//! The runtime the compiled program executes against.
//!
//! Values, storage slots, scopes, the call stack, the namespace tree, and
//! the instruction evaluator. Everything here is single-threaded by
//! design: one executor mutates one run's state, and the only way out
//! mid-run is an [`exec::Interrupt`].

pub mod array;
pub mod builtins;
pub mod call_stack;
pub mod callable;
pub mod exec;
pub mod namespace;
pub mod object;
pub mod scope;
pub mod value;
pub mod variable;

pub use array::{ArrayData, ArrayKey};
pub use call_stack::{Call, CallStack};
pub use callable::{Callable, NativeFunction, UserFunction};
pub use exec::{Executor, Flow, Interrupt, Operand, Suspension};
pub use namespace::{Namespace, NamespaceScope};
pub use object::{ClassData, ObjectData};
pub use scope::Scope;
pub use value::Value;
pub use variable::Variable;
