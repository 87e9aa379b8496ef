//! Convenience builder for assembling ASTs by hand.
//!
//! The external parser produces arenas directly; tests and embedders use
//! this builder instead of spelling out `Node` variants.

use super::{
    Ast, BindingNode, MethodInvocation, Node, NodeId, Operation, Param, TernaryArm, UseClause,
};

/// Incrementally builds an [`Ast`].
#[derive(Debug, Default)]
pub struct AstBuilder {
    ast: Ast,
}

impl AstBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a raw node.
    pub fn push(&mut self, node: Node) -> NodeId {
        self.ast.push(node)
    }

    /// Install the program root and finish the arena.
    pub fn program(mut self, statements: Vec<NodeId>) -> Ast {
        let root = self.ast.push(Node::Program { statements });
        self.ast.set_root(root);
        self.ast
    }

    // ---- literals -------------------------------------------------------

    /// Integer literal.
    pub fn int(&mut self, value: i64) -> NodeId {
        self.push(Node::IntegerLiteral { value })
    }

    /// Float literal.
    pub fn float(&mut self, value: f64) -> NodeId {
        self.push(Node::FloatLiteral { value })
    }

    /// Boolean literal.
    pub fn bool(&mut self, value: bool) -> NodeId {
        self.push(Node::BooleanLiteral { value })
    }

    /// Quoted string literal.
    pub fn string(&mut self, value: impl Into<String>) -> NodeId {
        let value = value.into();
        self.push(Node::StringLiteral { value })
    }

    /// Bare name (class/function names, `null`).
    pub fn bare(&mut self, value: impl Into<String>) -> NodeId {
        let value = value.into();
        self.push(Node::BareString { value })
    }

    /// The null literal.
    pub fn null(&mut self) -> NodeId {
        self.bare("null")
    }

    /// Interpolated string from parts.
    pub fn interp(&mut self, parts: Vec<NodeId>) -> NodeId {
        self.push(Node::StringExpression { parts })
    }

    // ---- storage --------------------------------------------------------

    /// `$name`
    pub fn var(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        self.push(Node::Variable { name })
    }

    /// `$$expr`
    pub fn var_var(&mut self, expression: NodeId) -> NodeId {
        self.push(Node::VariableExpression { expression })
    }

    /// `base[index]`
    pub fn index(&mut self, array: NodeId, indices: Vec<NodeId>) -> NodeId {
        self.push(Node::ArrayIndex { array, indices })
    }

    /// `base->prop`
    pub fn prop(&mut self, object: NodeId, properties: Vec<NodeId>) -> NodeId {
        self.push(Node::ObjectProperty { object, properties })
    }

    // ---- expressions ----------------------------------------------------

    /// A single binary operation.
    pub fn binary(&mut self, left: NodeId, operator: &str, right: NodeId) -> NodeId {
        self.push(Node::Expression {
            left,
            operations: vec![Operation {
                operator: operator.to_owned(),
                operand: right,
                by_reference: false,
            }],
        })
    }

    /// A chain of operations applied to `left`.
    pub fn chain(&mut self, left: NodeId, operations: Vec<Operation>) -> NodeId {
        self.push(Node::Expression { left, operations })
    }

    /// `target = value`
    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.binary(target, "=", value)
    }

    /// `target =& value`
    pub fn assign_ref(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.push(Node::Expression {
            left: target,
            operations: vec![Operation {
                operator: "=".to_owned(),
                operand: value,
                by_reference: true,
            }],
        })
    }

    /// Prefix or suffix unary operation.
    pub fn unary(&mut self, operator: &str, operand: NodeId, prefix: bool) -> NodeId {
        self.push(Node::Unary {
            operator: operator.to_owned(),
            operand,
            prefix,
        })
    }

    /// `cond ? a : b`
    pub fn ternary(&mut self, condition: NodeId, consequent: NodeId, alternate: NodeId) -> NodeId {
        self.push(Node::Ternary {
            condition,
            options: vec![TernaryArm {
                consequent,
                alternate,
            }],
        })
    }

    /// Comma expression.
    pub fn comma(&mut self, expressions: Vec<NodeId>) -> NodeId {
        self.push(Node::Comma { expressions })
    }

    /// `isset(...)`
    pub fn isset(&mut self, variables: Vec<NodeId>) -> NodeId {
        self.push(Node::Isset { variables })
    }

    /// `print expr`
    pub fn print(&mut self, operand: NodeId) -> NodeId {
        self.push(Node::Print { operand })
    }

    /// Array literal.
    pub fn array(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.push(Node::ArrayLiteral { elements })
    }

    /// `key => value`
    pub fn kv(&mut self, key: NodeId, value: NodeId) -> NodeId {
        self.push(Node::KeyValuePair { key, value })
    }

    /// `list(...)`
    pub fn list(&mut self, elements: Vec<NodeId>) -> NodeId {
        self.push(Node::List { elements })
    }

    /// Call a function by bare name.
    pub fn call(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        let function = self.bare(name);
        self.push(Node::FunctionCall { function, args })
    }

    /// Call whatever `function` evaluates to.
    pub fn call_expr(&mut self, function: NodeId, args: Vec<NodeId>) -> NodeId {
        self.push(Node::FunctionCall { function, args })
    }

    /// Single method call `object->method(args)`.
    pub fn method_call(&mut self, object: NodeId, method: &str, args: Vec<NodeId>) -> NodeId {
        let method = self.bare(method);
        self.push(Node::MethodCall {
            object,
            calls: vec![MethodInvocation { method, args }],
        })
    }

    /// `new Name(args)`
    pub fn new_object(&mut self, class_name: &str, args: Vec<NodeId>) -> NodeId {
        let class_name = self.bare(class_name);
        self.push(Node::New { class_name, args })
    }

    /// Closure expression.
    pub fn closure(
        &mut self,
        params: &[&str],
        bindings: Vec<BindingNode>,
        body: Vec<NodeId>,
    ) -> NodeId {
        let body = self.compound(body);
        self.push(Node::Closure {
            args: params.iter().map(|p| Param { name: (*p).into() }).collect(),
            bindings,
            body,
        })
    }

    // ---- statements -----------------------------------------------------

    /// Expression statement.
    pub fn expr_stmt(&mut self, expression: NodeId) -> NodeId {
        self.push(Node::ExpressionStatement { expression })
    }

    /// `echo expr;`
    pub fn echo(&mut self, expression: NodeId) -> NodeId {
        self.push(Node::Echo { expression })
    }

    /// Inline passthrough text.
    pub fn inline_html(&mut self, html: impl Into<String>) -> NodeId {
        let html = html.into();
        self.push(Node::InlineHtml { html })
    }

    /// `return [expr];`
    pub fn return_stmt(&mut self, expression: Option<NodeId>) -> NodeId {
        self.push(Node::Return { expression })
    }

    /// `{ ... }`
    pub fn compound(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.push(Node::CompoundStatement { statements })
    }

    /// `if` with optional `else`.
    pub fn if_stmt(
        &mut self,
        condition: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    ) -> NodeId {
        self.push(Node::If {
            condition,
            consequent,
            alternate,
        })
    }

    /// `while` loop.
    pub fn while_stmt(&mut self, condition: NodeId, statements: Vec<NodeId>) -> NodeId {
        self.push(Node::While {
            condition,
            statements,
        })
    }

    /// `do/while` loop.
    pub fn do_while(&mut self, body: NodeId, condition: NodeId) -> NodeId {
        self.push(Node::DoWhile { body, condition })
    }

    /// `for` loop.
    pub fn for_stmt(
        &mut self,
        initializer: Option<NodeId>,
        condition: Option<NodeId>,
        update: Option<NodeId>,
        body: NodeId,
    ) -> NodeId {
        self.push(Node::For {
            initializer,
            condition,
            update,
            body,
        })
    }

    /// `foreach` loop.
    pub fn foreach(
        &mut self,
        array: NodeId,
        key: Option<NodeId>,
        value: NodeId,
        by_reference: bool,
        body: NodeId,
    ) -> NodeId {
        self.push(Node::Foreach {
            array,
            key,
            value,
            by_reference,
            body,
        })
    }

    /// `switch` statement.
    pub fn switch(&mut self, expression: NodeId, cases: Vec<NodeId>) -> NodeId {
        self.push(Node::Switch { expression, cases })
    }

    /// `case expr:` arm.
    pub fn case(&mut self, expression: NodeId, body: Vec<NodeId>) -> NodeId {
        self.push(Node::Case { expression, body })
    }

    /// `default:` arm.
    pub fn default_case(&mut self, body: Vec<NodeId>) -> NodeId {
        self.push(Node::DefaultCase { body })
    }

    /// `break n;`
    pub fn break_stmt(&mut self, levels: usize) -> NodeId {
        self.push(Node::Break { levels })
    }

    /// `continue n;`
    pub fn continue_stmt(&mut self, levels: usize) -> NodeId {
        self.push(Node::Continue { levels })
    }

    /// `goto label;`
    pub fn goto(&mut self, label: &str) -> NodeId {
        self.push(Node::Goto {
            label: label.to_owned(),
        })
    }

    /// `label:`
    pub fn label(&mut self, label: &str) -> NodeId {
        self.push(Node::Label {
            label: label.to_owned(),
        })
    }

    /// Function declaration with a compound body.
    pub fn function_decl(&mut self, name: &str, params: &[&str], body: Vec<NodeId>) -> NodeId {
        let body = self.compound(body);
        self.push(Node::FunctionDecl {
            name: name.to_owned(),
            args: params.iter().map(|p| Param { name: (*p).into() }).collect(),
            body,
        })
    }

    /// Class declaration.
    pub fn class_decl(
        &mut self,
        name: &str,
        extends: Option<&str>,
        members: Vec<NodeId>,
    ) -> NodeId {
        let name = self.bare(name);
        let extends = extends.map(|parent| self.bare(parent));
        self.push(Node::ClassDecl {
            name,
            extends,
            members,
        })
    }

    /// Property member with optional default.
    pub fn property(&mut self, name: &str, value: Option<NodeId>) -> NodeId {
        self.push(Node::PropertyDefinition {
            name: name.to_owned(),
            value,
        })
    }

    /// Method member with a compound body.
    pub fn method(&mut self, name: &str, params: &[&str], body: Vec<NodeId>) -> NodeId {
        let body = self.compound(body);
        self.push(Node::MethodDefinition {
            name: name.to_owned(),
            args: params.iter().map(|p| Param { name: (*p).into() }).collect(),
            body,
        })
    }

    /// `namespace path { ... }`
    pub fn namespace(&mut self, name: &str, statements: Vec<NodeId>) -> NodeId {
        self.push(Node::NamespaceStatement {
            name: name.to_owned(),
            statements,
        })
    }

    /// `use path [as alias];`
    pub fn use_stmt(&mut self, uses: Vec<UseClause>) -> NodeId {
        self.push(Node::UseStatement { uses })
    }

    /// A fully qualified name used as a value.
    pub fn namespaced_ref(&mut self, path: &str) -> NodeId {
        self.push(Node::NamespacedReference {
            path: path.to_owned(),
        })
    }
}
