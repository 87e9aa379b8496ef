//! Compilation context threading.

use std::cell::RefCell;

use sable_sdk::NativeValue;

use crate::ast::NodeId;
use crate::compiler::labels::LabelRepository;

/// The reserved label a resume pass jumps to.
pub const RESUME_LABEL: &str = "resume";

/// Resume data for one recompile-and-replay pass.
///
/// Captured when a deferred operation unwound the previous execution:
/// the ordered call path that was active (outermost first, the deferring
/// node last) and the value the operation eventually settled with.
#[derive(Debug, Clone)]
pub struct ResumeData {
    /// The reserved label marking the resume entry point.
    pub label: String,
    /// The captured call path.
    pub nodes: Vec<NodeId>,
    /// The settled value, injected at the path's innermost node.
    pub value: NativeValue,
}

impl ResumeData {
    /// True when `node` lies on the captured path.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// True when `node` is the innermost node (the one that deferred).
    pub fn is_innermost(&self, node: NodeId) -> bool {
        self.nodes.last() == Some(&node)
    }
}

/// The record threaded through recursive compilation calls.
///
/// Immutable by convention: a child call that needs different flags gets a
/// copy with the overrides applied; the parent's context is never mutated.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    /// Compiling the left-hand side of an assignment.
    pub assignment: bool,
    /// The consumer wants a plain value rather than an addressable slot.
    pub want_value: bool,
    /// Depth of the innermost enclosing switch, if any.
    pub switch_depth: Option<usize>,
    /// The current unit's label repository.
    pub labels: &'a RefCell<LabelRepository>,
    /// Resume data, present only during a resume pass.
    pub resume: Option<&'a ResumeData>,
}

impl<'a> Context<'a> {
    /// A fresh context for a new compilation unit.
    pub fn for_unit(
        labels: &'a RefCell<LabelRepository>,
        resume: Option<&'a ResumeData>,
    ) -> Self {
        Context {
            assignment: false,
            want_value: true,
            switch_depth: None,
            labels,
            resume,
        }
    }

    /// Child context for an assignment target.
    pub fn as_target(self) -> Self {
        Context {
            assignment: true,
            want_value: false,
            ..self
        }
    }

    /// Child context reading a plain value.
    pub fn value(self) -> Self {
        Context {
            assignment: false,
            want_value: true,
            ..self
        }
    }

    /// Child context addressing a slot without reading it.
    pub fn reference(self) -> Self {
        Context {
            assignment: false,
            want_value: false,
            ..self
        }
    }

    /// Child context inside a switch at `depth`.
    pub fn in_switch(self, depth: usize) -> Self {
        Context {
            switch_depth: Some(depth),
            ..self
        }
    }
}
