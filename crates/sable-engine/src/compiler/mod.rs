//! Compilation of an AST into the executable instruction tree.
//!
//! A unit (the top-level program or one function body) compiles in three
//! layers: [`codegen`] applies one rule per node kind, [`labels`] tracks
//! goto/label discoveries across the unit, and [`assemble`] rewrites each
//! sibling sequence's unstructured jumps into labeled blocks and loops.
//! The same pipeline runs again, with [`ResumeData`] attached, for every
//! resume pass after a suspension.

mod assemble;
mod code;
mod codegen;
mod context;
mod labels;

pub use code::{
    AccessMode, ArrayElement, BinaryOp, CaptureBinding, ChainOp, ClassDef, Expr, FunctionDef,
    Instr, MethodInvoke, Program, Sequence, SwitchArm, UnaryOp, UseBinding,
};
pub use codegen::compile;
pub use context::{Context, ResumeData, RESUME_LABEL};
pub use labels::{LabelEvent, LabelMark, LabelRepository};
