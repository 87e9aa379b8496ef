//! Arena-backed AST.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`], a
//! stable integer index. The suspension protocol keys captured call paths
//! on these ids, so identity survives recompilation of the same program.
//! The arena is immutable once built; the engine only reads it.

mod builder;

pub use builder::AstBuilder;

/// Stable identity of one node within its [`Ast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// An immutable program tree.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Ast {
    /// The node behind `id`.
    ///
    /// Ids are only ever minted by the arena, so lookup cannot fail for a
    /// well-formed tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    /// The program root, if one was installed.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub(crate) fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }
}

/// One binary operation step in an expression chain.
#[derive(Debug, Clone)]
pub struct Operation {
    /// The source operator token (`+`, `==`, `=`, ...).
    pub operator: String,
    /// The right-hand operand.
    pub operand: NodeId,
    /// True when the operand is reference-tagged (`=& ...`).
    pub by_reference: bool,
}

/// One consequent/alternate pair of a ternary chain.
#[derive(Debug, Clone, Copy)]
pub struct TernaryArm {
    /// Expression when the condition is truthy.
    pub consequent: NodeId,
    /// Expression when the condition is falsy.
    pub alternate: NodeId,
}

/// One invocation in a chained method-call node.
#[derive(Debug, Clone)]
pub struct MethodInvocation {
    /// Expression yielding the method name.
    pub method: NodeId,
    /// Positional argument expressions.
    pub args: Vec<NodeId>,
}

/// A declared parameter.
#[derive(Debug, Clone)]
pub struct Param {
    /// The parameter's variable name.
    pub name: String,
}

/// An explicitly captured outer variable of a closure.
#[derive(Debug, Clone)]
pub struct BindingNode {
    /// The captured variable name.
    pub name: String,
    /// True for by-reference capture.
    pub by_reference: bool,
}

/// One clause of a use/alias statement.
#[derive(Debug, Clone)]
pub struct UseClause {
    /// Segment-delimited source path.
    pub path: String,
    /// Optional alias; defaults to the path's last segment.
    pub alias: Option<String>,
}

/// The closed set of node kinds.
///
/// Every kind has exactly one compilation rule; an unknown kind is
/// unrepresentable by construction.
#[derive(Debug, Clone)]
pub enum Node {
    /// Top-level program.
    Program {
        /// Statement list, in source order.
        statements: Vec<NodeId>,
    },
    /// Expression evaluated for effect.
    ExpressionStatement {
        /// The discarded expression.
        expression: NodeId,
    },
    /// `echo expr;`
    Echo {
        /// The expression written to stdout as a string.
        expression: NodeId,
    },
    /// Literal text outside code regions, passed through to stdout.
    InlineHtml {
        /// The raw text.
        html: String,
    },
    /// `return expr;` / `return;`
    Return {
        /// The returned expression, if any.
        expression: Option<NodeId>,
    },
    /// `if (cond) consequent else alternate`
    If {
        /// Condition, boolean-coerced.
        condition: NodeId,
        /// Statement executed when truthy.
        consequent: NodeId,
        /// Statement executed when falsy.
        alternate: Option<NodeId>,
    },
    /// `while (cond) { ... }`
    While {
        /// Condition, boolean-coerced.
        condition: NodeId,
        /// Loop body statements.
        statements: Vec<NodeId>,
    },
    /// `do { ... } while (cond);`
    DoWhile {
        /// Loop body statement.
        body: NodeId,
        /// Condition, boolean-coerced.
        condition: NodeId,
    },
    /// `for (init; cond; update) body`
    For {
        /// Initializer expression.
        initializer: Option<NodeId>,
        /// Condition; absent means always true.
        condition: Option<NodeId>,
        /// Update expression.
        update: Option<NodeId>,
        /// Loop body statement.
        body: NodeId,
    },
    /// `foreach (array as [key =>] value) body`
    Foreach {
        /// The iterated expression.
        array: NodeId,
        /// Key target, if specified.
        key: Option<NodeId>,
        /// Value target.
        value: NodeId,
        /// True when the value binds by reference.
        by_reference: bool,
        /// Loop body statement.
        body: NodeId,
    },
    /// `switch (expr) { cases }`
    Switch {
        /// The subject expression.
        expression: NodeId,
        /// Case/default nodes in source order.
        cases: Vec<NodeId>,
    },
    /// `case expr: body`
    Case {
        /// The tested expression.
        expression: NodeId,
        /// Case body statements.
        body: Vec<NodeId>,
    },
    /// `default: body`
    DefaultCase {
        /// Default body statements.
        body: Vec<NodeId>,
    },
    /// `break n;`
    Break {
        /// Number of enclosing switch levels exited.
        levels: usize,
    },
    /// `continue n;`
    Continue {
        /// Number of enclosing switch levels exited.
        levels: usize,
    },
    /// `goto label;`
    Goto {
        /// The target label.
        label: String,
    },
    /// `label:`
    Label {
        /// The defined label.
        label: String,
    },
    /// `{ statements }`
    CompoundStatement {
        /// Sibling statements resolved as one assembler sequence.
        statements: Vec<NodeId>,
    },
    /// `namespace path { statements }`
    NamespaceStatement {
        /// Segment-delimited namespace path.
        name: String,
        /// Statements executed in the descendant namespace.
        statements: Vec<NodeId>,
    },
    /// `use path [as alias];`
    UseStatement {
        /// The use clauses.
        uses: Vec<UseClause>,
    },
    /// A fully qualified name used as a value.
    NamespacedReference {
        /// Segment-delimited path.
        path: String,
    },
    /// `function name(args) body`
    FunctionDecl {
        /// The declared function name.
        name: String,
        /// Declared parameters.
        args: Vec<Param>,
        /// The body statement.
        body: NodeId,
    },
    /// `class name [extends parent] { members }`
    ClassDecl {
        /// Expression yielding the class name.
        name: NodeId,
        /// Expression yielding the superclass name, if any.
        extends: Option<NodeId>,
        /// Property and method member nodes.
        members: Vec<NodeId>,
    },
    /// A declared property with an optional default.
    PropertyDefinition {
        /// The property name.
        name: String,
        /// Default value expression, evaluated at class definition.
        value: Option<NodeId>,
    },
    /// A declared method.
    MethodDefinition {
        /// The method name.
        name: String,
        /// Declared parameters.
        args: Vec<Param>,
        /// The body statement.
        body: NodeId,
    },
    /// An anonymous function, optionally capturing outer variables.
    Closure {
        /// Declared parameters.
        args: Vec<Param>,
        /// Explicit captures.
        bindings: Vec<BindingNode>,
        /// The body statement.
        body: NodeId,
    },
    /// A binary/assignment expression chain, left-associated.
    Expression {
        /// Leftmost operand.
        left: NodeId,
        /// Operation steps applied in order.
        operations: Vec<Operation>,
    },
    /// A unary operation.
    Unary {
        /// The source operator token.
        operator: String,
        /// The operand.
        operand: NodeId,
        /// True for prefix position.
        prefix: bool,
    },
    /// A ternary chain.
    Ternary {
        /// The condition.
        condition: NodeId,
        /// Arms applied left to right.
        options: Vec<TernaryArm>,
    },
    /// Comma-separated expressions; yields the last.
    Comma {
        /// The expressions, evaluated left to right.
        expressions: Vec<NodeId>,
    },
    /// `isset(...)` probe.
    Isset {
        /// The probed storage expressions.
        variables: Vec<NodeId>,
    },
    /// `print expr` expression.
    Print {
        /// The printed operand.
        operand: NodeId,
    },
    /// `$name`
    Variable {
        /// The variable name without the sigil.
        name: String,
    },
    /// `$$expr` — variable named by an expression.
    VariableExpression {
        /// Expression yielding the variable name.
        expression: NodeId,
    },
    /// `base[i]...[k]`
    ArrayIndex {
        /// The indexed expression.
        array: NodeId,
        /// Index expressions, outermost first.
        indices: Vec<NodeId>,
    },
    /// `base->prop...`
    ObjectProperty {
        /// The base expression.
        object: NodeId,
        /// Property name expressions, outermost first.
        properties: Vec<NodeId>,
    },
    /// `array(...)` / `[...]`
    ArrayLiteral {
        /// Elements; plain values or key/value pairs.
        elements: Vec<NodeId>,
    },
    /// `key => value` inside an array literal.
    KeyValuePair {
        /// The key expression.
        key: NodeId,
        /// The value expression.
        value: NodeId,
    },
    /// `list(...)` destructuring target.
    List {
        /// Element targets, each an addressable expression.
        elements: Vec<NodeId>,
    },
    /// Integer literal.
    IntegerLiteral {
        /// The value.
        value: i64,
    },
    /// Float literal.
    FloatLiteral {
        /// The value.
        value: f64,
    },
    /// Boolean literal.
    BooleanLiteral {
        /// The value.
        value: bool,
    },
    /// Quoted string literal.
    StringLiteral {
        /// The text.
        value: String,
    },
    /// A bare (unquoted) name used as a value; `null` is the null literal.
    BareString {
        /// The text.
        value: String,
    },
    /// Interpolated string.
    StringExpression {
        /// The parts, concatenated after string coercion.
        parts: Vec<NodeId>,
    },
    /// `callee(args)`
    FunctionCall {
        /// Expression yielding the callee (name string or closure).
        function: NodeId,
        /// Positional argument expressions.
        args: Vec<NodeId>,
    },
    /// `object->m(...)->n(...)`
    MethodCall {
        /// The receiver expression.
        object: NodeId,
        /// Chained invocations, applied left to right.
        calls: Vec<MethodInvocation>,
    },
    /// `new ClassName(args)`
    New {
        /// Expression yielding the class name.
        class_name: NodeId,
        /// Constructor arguments.
        args: Vec<NodeId>,
    },
}
