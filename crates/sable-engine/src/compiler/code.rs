//! The executable form produced by the code generator.
//!
//! Instead of emitting source text for a host evaluator, compilation
//! produces a structured instruction tree. Unstructured gotos never appear
//! here: the block assembler has already rewritten them into labeled
//! block/loop constructs ([`Instr::LabeledBlock`], [`Instr::LabeledLoop`])
//! plus jump-flag guards, so the evaluator only ever sees structured exits.

use std::rc::Rc;

use crate::ast::NodeId;

/// A compiled program, ready for execution.
#[derive(Debug)]
pub struct Program {
    /// The assembled top-level statement sequence.
    pub body: Sequence,
}

/// A sibling statement sequence.
pub type Sequence = Vec<Instr>;

/// One executable instruction.
#[derive(Debug, Clone)]
pub enum Instr {
    /// Evaluate an expression for effect.
    Expr(Expr),
    /// Write the expression's string coercion to stdout.
    Echo(Expr),
    /// Write literal text to stdout.
    Write(String),
    /// Return from the enclosing invocation (null when no expression).
    Return(Option<Expr>),
    /// Conditional execution.
    If {
        /// Labels defined inside the consequent that outside gotos target;
        /// a set jump flag forces entry regardless of the condition.
        entry_labels: Vec<String>,
        /// Condition, boolean-coerced.
        condition: Expr,
        /// Truthy branch.
        consequent: Sequence,
        /// Falsy branch.
        alternate: Option<Sequence>,
    },
    /// Pre-tested loop.
    While {
        /// Condition, boolean-coerced.
        condition: Expr,
        /// Loop body.
        body: Sequence,
    },
    /// Post-tested loop.
    DoWhile {
        /// Loop body.
        body: Sequence,
        /// Condition, boolean-coerced.
        condition: Expr,
    },
    /// Counted loop.
    For {
        /// Run once before the first test.
        initializer: Option<Expr>,
        /// Tested before each iteration; absent means always true.
        condition: Option<Expr>,
        /// Run after each iteration.
        update: Option<Expr>,
        /// Loop body.
        body: Sequence,
    },
    /// Iteration over a snapshotted array.
    Foreach {
        /// The iterated expression, snapshotted before the loop.
        array: Expr,
        /// Key target slot, if specified.
        key: Option<Expr>,
        /// Value target slot.
        value: Expr,
        /// Bind the value by reference into the source array.
        by_reference: bool,
        /// Loop body.
        body: Sequence,
    },
    /// Switch with fall-through semantics.
    Switch {
        /// This switch's nesting depth (outermost is 0).
        depth: usize,
        /// The subject expression, evaluated once.
        subject: Expr,
        /// Case arms in source order.
        cases: Vec<SwitchArm>,
    },
    /// Exit the switch at `depth`.
    BreakSwitch {
        /// Target switch depth.
        depth: usize,
    },
    /// Jump to a label: sets the label's jump flag and unwinds to the
    /// labeled block or loop that resolves it.
    Goto {
        /// The target label.
        label: String,
    },
    /// A label definition site; clears the label's jump flag on arrival.
    Label {
        /// The defined label.
        label: String,
    },
    /// Forward-jump wrapper: a goto to `label` inside exits the block,
    /// landing exactly at the statement that defines the label.
    LabeledBlock {
        /// The resolved label.
        label: String,
        /// The statements strictly before the label's statement.
        body: Sequence,
    },
    /// Backward-jump wrapper: a goto to `label` inside re-enters the loop
    /// from its first statement (the label's statement).
    LabeledLoop {
        /// The resolved label.
        label: String,
        /// The span from the label's statement through the goto's.
        body: Sequence,
    },
    /// Guard wrapper: skipped while the label's jump flag is set, so a
    /// jump into a nested construct does not re-run preceding statements.
    SkipWhenJumping {
        /// The guarding label.
        label: String,
        /// The guarded statements.
        body: Sequence,
    },
    /// Bind a function into the current namespace.
    DefineFunction {
        /// The declared name.
        name: String,
        /// The compiled body.
        function: Rc<FunctionDef>,
    },
    /// Build and bind a class into the current namespace.
    DefineClass(ClassDef),
    /// Execute `body` against a descendant namespace.
    EnterNamespace {
        /// Segment-delimited path below the current namespace.
        path: String,
        /// The hoisted, assembled body.
        body: Sequence,
    },
    /// Register use/alias clauses on the current namespace scope.
    Use {
        /// The clauses in source order.
        clauses: Vec<UseBinding>,
    },
}

/// One arm of a switch.
#[derive(Debug, Clone)]
pub struct SwitchArm {
    /// The tested expression; `None` marks the default arm.
    pub test: Option<Expr>,
    /// The arm's statements.
    pub body: Sequence,
}

/// One use/alias registration.
#[derive(Debug, Clone)]
pub struct UseBinding {
    /// Segment-delimited source path.
    pub path: String,
    /// The alias; `None` aliases the last path segment.
    pub alias: Option<String>,
}

/// A compiled function, method, or closure body.
#[derive(Debug)]
pub struct FunctionDef {
    /// Parameter names in declaration order.
    pub params: Vec<String>,
    /// Explicit captures (closures only).
    pub bindings: Vec<CaptureBinding>,
    /// The assembled body.
    pub body: Sequence,
}

/// An explicit closure capture.
#[derive(Debug, Clone)]
pub struct CaptureBinding {
    /// The captured variable name.
    pub name: String,
    /// Alias the outer slot instead of copying its value.
    pub by_reference: bool,
}

/// A compiled class declaration, evaluated when the definition executes.
#[derive(Debug, Clone)]
pub struct ClassDef {
    /// Expression yielding the class name.
    pub name: Expr,
    /// Expression yielding the superclass name, if any.
    pub parent: Option<Expr>,
    /// Property names with their default-value expressions.
    pub properties: Vec<(String, Option<Expr>)>,
    /// Method names with their compiled bodies, in declaration order.
    pub methods: Vec<(String, Rc<FunctionDef>)>,
}

/// Whether a storage access addresses a slot for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read the value; missing slots yield null.
    Read,
    /// Address the slot; missing containers auto-vivify to empty arrays.
    Write,
}

/// One compiled expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// The null value.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
    /// String interpolation: parts coerced to string, concatenated.
    Interp(Vec<Expr>),
    /// Array literal, elements evaluated left to right.
    ArrayLit(Vec<ArrayElement>),
    /// Named variable in the current scope.
    Variable {
        /// The variable name.
        name: String,
        /// Deref the slot to its value.
        want_value: bool,
    },
    /// Variable named by an expression's string coercion.
    VariableVariable {
        /// Expression yielding the name.
        name: Box<Expr>,
        /// Deref the slot to its value.
        want_value: bool,
    },
    /// Array element access, possibly chained.
    Index {
        /// The indexed base.
        base: Box<Expr>,
        /// Keys, outermost first.
        indices: Vec<Expr>,
        /// Read or write addressing.
        mode: AccessMode,
    },
    /// Object property access, possibly chained.
    Property {
        /// The base expression.
        base: Box<Expr>,
        /// Property name expressions, outermost first.
        names: Vec<Expr>,
        /// Read or write addressing.
        mode: AccessMode,
    },
    /// A left-associated operation chain.
    Chain {
        /// Leftmost operand.
        left: Box<Expr>,
        /// Steps applied in order.
        ops: Vec<ChainOp>,
    },
    /// A unary operation.
    Unary {
        /// The operation.
        op: UnaryOp,
        /// The operand (a slot for increment/decrement).
        operand: Box<Expr>,
    },
    /// A ternary chain.
    Ternary {
        /// The condition.
        condition: Box<Expr>,
        /// (consequent, alternate) arms applied left to right.
        arms: Vec<(Expr, Expr)>,
    },
    /// Comma expression; yields the last value.
    Comma(Vec<Expr>),
    /// Definedness probe with error suppression.
    Isset(Vec<Expr>),
    /// Write string coercion to stdout, yield integer 1.
    Print(Box<Expr>),
    /// Function (or closure) call.
    Call {
        /// Expression yielding the callee.
        callee: Box<Expr>,
        /// Argument expressions.
        args: Vec<Expr>,
        /// The originating AST node, recorded on the call-anchor stack.
        node: NodeId,
    },
    /// Chained method call.
    MethodCall {
        /// The receiver expression.
        object: Box<Expr>,
        /// Invocations applied left to right.
        calls: Vec<MethodInvoke>,
        /// The originating AST node, recorded on the call-anchor stack.
        node: NodeId,
    },
    /// Instance construction.
    New {
        /// Expression yielding the class name.
        class_name: Box<Expr>,
        /// Constructor arguments.
        args: Vec<Expr>,
    },
    /// Closure construction over the current scope.
    Closure(Rc<FunctionDef>),
    /// Destructuring target list of addressable slots.
    List(Vec<Expr>),
    /// Yields the settled value of the operation that suspended the
    /// previous pass. Compiled in place of the captured path's innermost
    /// call node.
    ResumeValue,
}

/// One step of an operation chain.
#[derive(Debug, Clone)]
pub struct ChainOp {
    /// The operation method.
    pub op: BinaryOp,
    /// The right-hand operand.
    pub operand: Expr,
    /// The operand is reference-tagged (assignment binds the slot).
    pub by_reference: bool,
}

/// One invocation of a method chain.
#[derive(Debug, Clone)]
pub struct MethodInvoke {
    /// Expression yielding the method name.
    pub method: Expr,
    /// Argument expressions.
    pub args: Vec<Expr>,
}

/// One array literal element.
#[derive(Debug, Clone)]
pub enum ArrayElement {
    /// Auto-indexed value.
    Value(Expr),
    /// Explicitly keyed value.
    KeyValue(Expr, Expr),
}

/// Binary operations, named after the value-capability methods they
/// resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+` → `add`
    Add,
    /// `-` → `subtract`
    Subtract,
    /// `*` → `multiply`
    Multiply,
    /// `/` → `divide`
    Divide,
    /// `.` → `concat`
    Concat,
    /// `<<` → `shift_left_by`
    ShiftLeftBy,
    /// `>>` → `shift_right_by`
    ShiftRightBy,
    /// `==` → `is_equal_to`
    IsEqualTo,
    /// `!=` → `is_not_equal_to`
    IsNotEqualTo,
    /// `===` → `is_identical_to`
    IsIdenticalTo,
    /// `!==` → `is_not_identical_to`
    IsNotIdenticalTo,
    /// `<` → `is_less_than`
    IsLessThan,
    /// `=` with a plain operand → `set_value`
    SetValue,
    /// `=` with a reference-tagged operand → `set_reference`
    SetReference,
}

/// Unary operations, named after the value-capability methods they
/// resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Prefix `+` → `to_positive`
    ToPositive,
    /// Prefix `-` → `to_negative`
    ToNegative,
    /// Prefix `++` → `pre_increment`
    PreIncrement,
    /// Prefix `--` → `pre_decrement`
    PreDecrement,
    /// Prefix `~` → `ones_complement`
    OnesComplement,
    /// Suffix `++` → `post_increment`
    PostIncrement,
    /// Suffix `--` → `post_decrement`
    PostDecrement,
}
