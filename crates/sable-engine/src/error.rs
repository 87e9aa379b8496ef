//! Engine error taxonomy.
//!
//! Fatal conditions abort the current run and surface to the caller;
//! diagnostics are reported on the stderr sink and execution continues.
//! Suspension is not an error and never appears here (see
//! [`crate::vm::exec::Interrupt`]).

use sable_sdk::HostFault;

/// An unrecoverable condition for the current run.
///
/// Compilation rules never decide recoverability themselves; these are
/// raised at the point the violated invariant lives (namespace, scope,
/// block assembler) and converted into the terminal outcome by the
/// orchestrator alone.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FatalError {
    /// Operand types no arithmetic rule covers.
    #[error("Unsupported operand types")]
    UnsupportedOperandTypes,

    /// Call target resolved to no function in the namespace chain.
    #[error("Call to undefined function {name}()")]
    CallToUndefinedFunction {
        /// The function name as written.
        name: String,
    },

    /// Class lookup failed even after the autoload hook ran.
    #[error("Class '{name}' not found")]
    ClassNotFound {
        /// The class name as written.
        name: String,
    },

    /// Method lookup failed on the receiver's class chain.
    #[error("Call to undefined method {class_name}::{method_name}()")]
    UndefinedMethod {
        /// The receiver's class name.
        class_name: String,
        /// The method name as written.
        method_name: String,
    },

    /// A goto targets a label inside a plain loop body.
    #[error("'goto' into loop or switch statement is disallowed")]
    GotoDisallowed,

    /// A goto references a label never defined in a visible scope.
    #[error("'goto' to undefined label '{label}'")]
    UndefinedLabel {
        /// The missing label.
        label: String,
    },

    /// The reserved autoload function was defined with the wrong arity.
    #[error("{name}() must take exactly 1 argument")]
    ExpectExactlyOneArg {
        /// The lowercased function name.
        name: String,
    },

    /// A break/continue appeared outside any switch construct.
    #[error("Cannot break/continue outside of a switch statement")]
    BreakOutsideSwitch,

    /// The wall-clock budget for the run was exhausted.
    #[error(
        "Maximum execution time of {seconds} second{} exceeded",
        if *seconds == 1 { "" } else { "s" }
    )]
    MaxExecutionTimeExceeded {
        /// The configured budget.
        seconds: u64,
    },
}

/// Severity of a reported (non-fatal) diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    /// Informational notice; execution continues.
    Notice,
    /// Strict-standards notice; execution continues.
    Strict,
}

impl ErrorLevel {
    /// The prefix diagnostics carry on the stderr sink.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorLevel::Notice => "Notice",
            ErrorLevel::Strict => "Strict standards",
        }
    }
}

/// The terminal failure of a program run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A fatal engine condition (already reported on stderr).
    #[error("Fatal error: {0}")]
    Fatal(#[from] FatalError),

    /// A fault propagated unchanged from the host bridge.
    #[error(transparent)]
    Host(#[from] HostFault),

    /// The host dropped a deferment without settling it in time.
    #[error("deferred operation was never settled by the host")]
    DefermentAbandoned,
}
