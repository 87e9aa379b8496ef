//! Per-node code generation.
//!
//! Every node kind has exactly one compilation rule, dispatched on the
//! node's tag; the enum is closed, so an unknown kind is unrepresentable.
//! Rules thread a [`Context`] through recursive calls and publish label
//! discoveries to the unit's repository; sibling sequences are handed to
//! the block assembler for goto resolution.

use std::cell::RefCell;
use std::rc::Rc;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::ast::{Ast, BindingNode, Node, NodeId, Param};
use crate::compiler::assemble::{assemble, StatementFacts};
use crate::compiler::code::{
    ArrayElement, BinaryOp, CaptureBinding, ChainOp, ClassDef, Expr, FunctionDef, Instr,
    MethodInvoke, Program, Sequence, SwitchArm, UnaryOp, UseBinding,
};
use crate::compiler::context::{Context, ResumeData};
use crate::compiler::labels::{LabelEvent, LabelRepository};
use crate::error::FatalError;

static BINARY_OPERATOR_TO_METHOD: Lazy<FxHashMap<&'static str, BinaryOp>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("+", BinaryOp::Add);
    map.insert("-", BinaryOp::Subtract);
    map.insert("*", BinaryOp::Multiply);
    map.insert("/", BinaryOp::Divide);
    map.insert(".", BinaryOp::Concat);
    map.insert("<<", BinaryOp::ShiftLeftBy);
    map.insert(">>", BinaryOp::ShiftRightBy);
    map.insert("==", BinaryOp::IsEqualTo);
    map.insert("!=", BinaryOp::IsNotEqualTo);
    map.insert("===", BinaryOp::IsIdenticalTo);
    map.insert("!==", BinaryOp::IsNotIdenticalTo);
    map.insert("<", BinaryOp::IsLessThan);
    map
});

static PREFIX_OPERATOR_TO_METHOD: Lazy<FxHashMap<&'static str, UnaryOp>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("+", UnaryOp::ToPositive);
    map.insert("-", UnaryOp::ToNegative);
    map.insert("++", UnaryOp::PreIncrement);
    map.insert("--", UnaryOp::PreDecrement);
    map.insert("~", UnaryOp::OnesComplement);
    map
});

static SUFFIX_OPERATOR_TO_METHOD: Lazy<FxHashMap<&'static str, UnaryOp>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    map.insert("++", UnaryOp::PostIncrement);
    map.insert("--", UnaryOp::PostDecrement);
    map
});

/// Compile a whole program, optionally under resume data.
pub fn compile(ast: &Ast, resume: Option<&ResumeData>) -> Result<Program, FatalError> {
    let Some(root) = ast.root() else {
        return Ok(Program { body: Vec::new() });
    };
    let Node::Program { statements } = ast.node(root) else {
        panic!("AST root is not a program node");
    };

    let compiler = Compiler { ast };
    let repo = RefCell::new(LabelRepository::new());
    let ctx = Context::for_unit(&repo, resume);
    let ordered = hoist_declarations(ast, statements);
    let body = compiler.compile_sequence(&ordered, ctx)?;
    fail_on_unresolved(&repo)?;
    Ok(Program { body })
}

/// Declarations execute before any other statement of their sequence,
/// preserving relative order on both sides of the split.
fn hoist_declarations(ast: &Ast, statements: &[NodeId]) -> Vec<NodeId> {
    let mut declarations = Vec::new();
    let mut rest = Vec::new();
    for &id in statements {
        match ast.node(id) {
            Node::FunctionDecl { .. } | Node::ClassDecl { .. } => declarations.push(id),
            _ => rest.push(id),
        }
    }
    declarations.extend(rest);
    declarations
}

fn fail_on_unresolved(repo: &RefCell<LabelRepository>) -> Result<(), FatalError> {
    match repo.borrow().pending_labels().into_iter().next() {
        Some(label) => Err(FatalError::UndefinedLabel { label }),
        None => Ok(()),
    }
}

fn push_unique(list: &mut Vec<String>, label: &str) {
    if !list.iter().any(|l| l == label) {
        list.push(label.to_owned());
    }
}

struct Compiler<'a> {
    ast: &'a Ast,
}

impl<'a> Compiler<'a> {
    /// Compile one sibling sequence and resolve its gotos.
    fn compile_sequence(&self, statements: &[NodeId], ctx: Context<'_>) -> Result<Sequence, FatalError> {
        let mut facts = Vec::with_capacity(statements.len());
        for &id in statements {
            let mark = ctx.labels.borrow().mark();
            let instrs = self.compile_statement(id, ctx)?;
            let mut gotos = Vec::new();
            let mut labels = Vec::new();
            for event in ctx.labels.borrow().events_since(mark) {
                match event {
                    LabelEvent::Pending(label) => push_unique(&mut gotos, label),
                    LabelEvent::Found(label) => push_unique(&mut labels, label),
                }
            }
            facts.push(StatementFacts {
                instrs,
                gotos,
                labels,
                is_declaration: matches!(
                    self.ast.node(id),
                    Node::FunctionDecl { .. } | Node::ClassDecl { .. }
                ),
            });
        }
        let resume_label = ctx.resume.map(|r| r.label.as_str());
        Ok(assemble(facts, resume_label))
    }

    fn compile_statement(&self, id: NodeId, ctx: Context<'_>) -> Result<Vec<Instr>, FatalError> {
        match self.ast.node(id) {
            Node::ExpressionStatement { expression } => {
                Ok(vec![Instr::Expr(self.compile_expr(*expression, ctx.value())?)])
            }
            Node::Echo { expression } => {
                Ok(vec![Instr::Echo(self.compile_expr(*expression, ctx.value())?)])
            }
            Node::InlineHtml { html } => Ok(vec![Instr::Write(html.clone())]),
            Node::Return { expression } => {
                let expression = expression
                    .map(|e| self.compile_expr(e, ctx.value()))
                    .transpose()?;
                Ok(vec![Instr::Return(expression)])
            }
            Node::If {
                condition,
                consequent,
                alternate,
            } => self.compile_if(*condition, *consequent, *alternate, ctx),
            Node::While {
                condition,
                statements,
            } => self.compile_while(*condition, statements, ctx),
            Node::DoWhile { body, condition } => Ok(vec![Instr::DoWhile {
                body: self.compile_statement(*body, ctx)?,
                condition: self.compile_expr(*condition, ctx.value())?,
            }]),
            Node::For {
                initializer,
                condition,
                update,
                body,
            } => Ok(vec![Instr::For {
                initializer: initializer
                    .map(|e| self.compile_expr(e, ctx.value()))
                    .transpose()?,
                condition: condition
                    .map(|e| self.compile_expr(e, ctx.value()))
                    .transpose()?,
                update: update.map(|e| self.compile_expr(e, ctx.value())).transpose()?,
                body: self.compile_statement(*body, ctx)?,
            }]),
            Node::Foreach {
                array,
                key,
                value,
                by_reference,
                body,
            } => Ok(vec![Instr::Foreach {
                array: self.compile_expr(*array, ctx.value())?,
                key: key.map(|k| self.compile_expr(k, ctx.reference())).transpose()?,
                value: self.compile_expr(*value, ctx.reference())?,
                by_reference: *by_reference,
                body: self.compile_statement(*body, ctx)?,
            }]),
            Node::Switch { expression, cases } => self.compile_switch(*expression, cases, ctx),
            Node::Break { levels } | Node::Continue { levels } => {
                let depth = ctx.switch_depth.ok_or(FatalError::BreakOutsideSwitch)?;
                let exited = levels.saturating_sub(1);
                if exited > depth {
                    return Err(FatalError::BreakOutsideSwitch);
                }
                Ok(vec![Instr::BreakSwitch {
                    depth: depth - exited,
                }])
            }
            Node::Goto { label } => {
                ctx.labels.borrow_mut().add_pending(label);
                Ok(vec![Instr::Goto {
                    label: label.clone(),
                }])
            }
            Node::Label { label } => {
                ctx.labels.borrow_mut().found(label);
                Ok(vec![Instr::Label {
                    label: label.clone(),
                }])
            }
            Node::CompoundStatement { statements } => self.compile_sequence(statements, ctx),
            Node::NamespaceStatement { name, statements } => {
                let ordered = hoist_declarations(self.ast, statements);
                let mut body = Vec::new();
                for id in ordered {
                    body.extend(self.compile_statement(id, ctx)?);
                }
                Ok(vec![Instr::EnterNamespace {
                    path: name.clone(),
                    body,
                }])
            }
            Node::UseStatement { uses } => Ok(vec![Instr::Use {
                clauses: uses
                    .iter()
                    .map(|clause| UseBinding {
                        path: clause.path.clone(),
                        alias: clause.alias.clone(),
                    })
                    .collect(),
            }]),
            Node::FunctionDecl { name, args, body } => {
                let function = self.compile_function(args, None, *body, ctx.resume)?;
                Ok(vec![Instr::DefineFunction {
                    name: name.clone(),
                    function: Rc::new(function),
                }])
            }
            Node::ClassDecl {
                name,
                extends,
                members,
            } => self.compile_class(*name, *extends, members, ctx),
            other => panic!("no statement compilation rule for {other:?}"),
        }
    }

    fn compile_if(
        &self,
        condition: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
        ctx: Context<'_>,
    ) -> Result<Vec<Instr>, FatalError> {
        let condition = self.compile_expr(condition, ctx.value())?;

        // Labels found inside the consequent are entry points for gotos
        // from outside; a pending goto compiled afterwards inside the same
        // branch cancels the entry (the jump stays internal).
        let mark = ctx.labels.borrow().mark();
        let consequent = self.compile_statement(consequent, ctx)?;
        let mut entry_labels = Vec::new();
        for event in ctx.labels.borrow().events_since(mark) {
            match event {
                LabelEvent::Found(label) => push_unique(&mut entry_labels, label),
                LabelEvent::Pending(label) => entry_labels.retain(|l| l != label),
            }
        }

        let alternate = alternate
            .map(|a| self.compile_statement(a, ctx))
            .transpose()?;
        Ok(vec![Instr::If {
            entry_labels,
            condition,
            consequent,
            alternate,
        }])
    }

    fn compile_while(
        &self,
        condition: NodeId,
        statements: &[NodeId],
        ctx: Context<'_>,
    ) -> Result<Vec<Instr>, FatalError> {
        let condition = self.compile_expr(condition, ctx.value())?;
        let mark = ctx.labels.borrow().mark();
        let mut body = Vec::new();
        for &id in statements {
            body.extend(self.compile_statement(id, ctx)?);
        }
        // A label inside a plain loop body would allow jumping into the
        // loop from outside; that is a fatal condition, not a diagnostic.
        let found = ctx
            .labels
            .borrow()
            .events_since(mark)
            .iter()
            .any(|event| matches!(event, LabelEvent::Found(_)));
        if found {
            return Err(FatalError::GotoDisallowed);
        }
        Ok(vec![Instr::While { condition, body }])
    }

    fn compile_switch(
        &self,
        expression: NodeId,
        cases: &[NodeId],
        ctx: Context<'_>,
    ) -> Result<Vec<Instr>, FatalError> {
        let depth = ctx.switch_depth.map_or(0, |d| d + 1);
        let subject = self.compile_expr(expression, ctx.value())?;
        let case_ctx = ctx.in_switch(depth);

        let mut arms = Vec::with_capacity(cases.len());
        for &case in cases {
            let arm = match self.ast.node(case) {
                Node::Case { expression, body } => SwitchArm {
                    test: Some(self.compile_expr(*expression, case_ctx.value())?),
                    body: self.compile_case_body(body, case_ctx)?,
                },
                Node::DefaultCase { body } => SwitchArm {
                    test: None,
                    body: self.compile_case_body(body, case_ctx)?,
                },
                other => panic!("switch arm is not a case node: {other:?}"),
            };
            arms.push(arm);
        }
        Ok(vec![Instr::Switch {
            depth,
            subject,
            cases: arms,
        }])
    }

    fn compile_case_body(
        &self,
        body: &[NodeId],
        ctx: Context<'_>,
    ) -> Result<Sequence, FatalError> {
        let mut out = Vec::new();
        for &id in body {
            out.extend(self.compile_statement(id, ctx)?);
        }
        Ok(out)
    }

    fn compile_class(
        &self,
        name: NodeId,
        extends: Option<NodeId>,
        members: &[NodeId],
        ctx: Context<'_>,
    ) -> Result<Vec<Instr>, FatalError> {
        let name = self.compile_expr(name, ctx.value())?;
        let parent = extends
            .map(|e| self.compile_expr(e, ctx.value()))
            .transpose()?;

        let mut properties = Vec::new();
        let mut methods = Vec::new();
        for &member in members {
            match self.ast.node(member) {
                Node::PropertyDefinition { name, value } => {
                    let value = value.map(|v| self.compile_expr(v, ctx.value())).transpose()?;
                    properties.push((name.clone(), value));
                }
                Node::MethodDefinition { name, args, body } => {
                    let function = self.compile_function(args, None, *body, ctx.resume)?;
                    methods.push((name.clone(), Rc::new(function)));
                }
                other => panic!("class member is not a member node: {other:?}"),
            }
        }
        Ok(vec![Instr::DefineClass(ClassDef {
            name,
            parent,
            properties,
            methods,
        })])
    }

    /// Compile a function, method, or closure body as its own unit, with a
    /// fresh label repository.
    fn compile_function(
        &self,
        params: &[Param],
        bindings: Option<&[BindingNode]>,
        body: NodeId,
        resume: Option<&ResumeData>,
    ) -> Result<FunctionDef, FatalError> {
        let repo = RefCell::new(LabelRepository::new());
        let ctx = Context::for_unit(&repo, resume);
        let body = self.compile_statement(body, ctx)?;
        fail_on_unresolved(&repo)?;
        Ok(FunctionDef {
            params: params.iter().map(|p| p.name.clone()).collect(),
            bindings: bindings
                .unwrap_or(&[])
                .iter()
                .map(|b| CaptureBinding {
                    name: b.name.clone(),
                    by_reference: b.by_reference,
                })
                .collect(),
            body,
        })
    }

    fn compile_expr(&self, id: NodeId, ctx: Context<'_>) -> Result<Expr, FatalError> {
        match self.ast.node(id) {
            Node::IntegerLiteral { value } => Ok(Expr::Int(*value)),
            Node::FloatLiteral { value } => Ok(Expr::Float(*value)),
            Node::BooleanLiteral { value } => Ok(Expr::Bool(*value)),
            Node::StringLiteral { value } => Ok(Expr::Str(value.clone())),
            Node::BareString { value } => match value.as_str() {
                "null" => Ok(Expr::Null),
                _ => Ok(Expr::Str(value.clone())),
            },
            Node::StringExpression { parts } => {
                let parts = parts
                    .iter()
                    .map(|&p| self.compile_expr(p, ctx.value()))
                    .collect::<Result<_, _>>()?;
                Ok(Expr::Interp(parts))
            }
            Node::NamespacedReference { path } => Ok(Expr::Str(path.clone())),
            Node::Variable { name } => Ok(Expr::Variable {
                name: name.clone(),
                want_value: ctx.want_value,
            }),
            Node::VariableExpression { expression } => Ok(Expr::VariableVariable {
                name: Box::new(self.compile_expr(*expression, ctx.value())?),
                want_value: ctx.want_value,
            }),
            Node::ArrayIndex { array, indices } => self.compile_index(*array, indices, ctx),
            Node::ObjectProperty { object, properties } => {
                self.compile_property(*object, properties, ctx)
            }
            Node::ArrayLiteral { elements } => {
                let elements = elements
                    .iter()
                    .map(|&element| match self.ast.node(element) {
                        Node::KeyValuePair { key, value } => Ok(ArrayElement::KeyValue(
                            self.compile_expr(*key, ctx.value())?,
                            self.compile_expr(*value, ctx.value())?,
                        )),
                        _ => Ok(ArrayElement::Value(self.compile_expr(element, ctx.value())?)),
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Expr::ArrayLit(elements))
            }
            Node::Expression { left, operations } => self.compile_chain(*left, operations, ctx),
            Node::Unary {
                operator,
                operand,
                prefix,
            } => {
                let table = if *prefix {
                    &PREFIX_OPERATOR_TO_METHOD
                } else {
                    &SUFFIX_OPERATOR_TO_METHOD
                };
                let op = *table
                    .get(operator.as_str())
                    .unwrap_or_else(|| panic!("no compilation rule for unary `{operator}`"));
                // Increment/decrement mutate the slot itself.
                let operand_ctx = match op {
                    UnaryOp::PreIncrement
                    | UnaryOp::PreDecrement
                    | UnaryOp::PostIncrement
                    | UnaryOp::PostDecrement => ctx.reference(),
                    _ => ctx.value(),
                };
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(self.compile_expr(*operand, operand_ctx)?),
                })
            }
            Node::Ternary { condition, options } => {
                let condition = Box::new(self.compile_expr(*condition, ctx.value())?);
                let arms = options
                    .iter()
                    .map(|arm| {
                        Ok((
                            self.compile_expr(arm.consequent, ctx.value())?,
                            self.compile_expr(arm.alternate, ctx.value())?,
                        ))
                    })
                    .collect::<Result<_, FatalError>>()?;
                Ok(Expr::Ternary { condition, arms })
            }
            Node::Comma { expressions } => {
                let expressions = expressions
                    .iter()
                    .map(|&e| self.compile_expr(e, ctx.value()))
                    .collect::<Result<_, _>>()?;
                Ok(Expr::Comma(expressions))
            }
            Node::Isset { variables } => {
                let variables = variables
                    .iter()
                    .map(|&v| self.compile_expr(v, ctx.reference()))
                    .collect::<Result<_, _>>()?;
                Ok(Expr::Isset(variables))
            }
            Node::Print { operand } => Ok(Expr::Print(Box::new(
                self.compile_expr(*operand, ctx.value())?,
            ))),
            Node::List { elements } => {
                let elements = elements
                    .iter()
                    .map(|&e| self.compile_expr(e, ctx.reference()))
                    .collect::<Result<_, _>>()?;
                Ok(Expr::List(elements))
            }
            Node::FunctionCall { function, args } => {
                if let Some(resume) = ctx.resume {
                    if resume.contains(id) {
                        ctx.labels.borrow_mut().found(&resume.label);
                        if resume.is_innermost(id) {
                            return Ok(Expr::ResumeValue);
                        }
                    }
                }
                let callee = Box::new(self.compile_expr(*function, ctx.value())?);
                let args = args
                    .iter()
                    .map(|&a| self.compile_expr(a, ctx.value()))
                    .collect::<Result<_, _>>()?;
                Ok(Expr::Call {
                    callee,
                    args,
                    node: id,
                })
            }
            Node::MethodCall { object, calls } => {
                if let Some(resume) = ctx.resume {
                    if resume.contains(id) {
                        ctx.labels.borrow_mut().found(&resume.label);
                        if resume.is_innermost(id) {
                            return Ok(Expr::ResumeValue);
                        }
                    }
                }
                let object = Box::new(self.compile_expr(*object, ctx.value())?);
                let calls = calls
                    .iter()
                    .map(|call| {
                        Ok(MethodInvoke {
                            method: self.compile_expr(call.method, ctx.value())?,
                            args: call
                                .args
                                .iter()
                                .map(|&a| self.compile_expr(a, ctx.value()))
                                .collect::<Result<_, FatalError>>()?,
                        })
                    })
                    .collect::<Result<_, FatalError>>()?;
                Ok(Expr::MethodCall {
                    object,
                    calls,
                    node: id,
                })
            }
            Node::New { class_name, args } => Ok(Expr::New {
                class_name: Box::new(self.compile_expr(*class_name, ctx.value())?),
                args: args
                    .iter()
                    .map(|&a| self.compile_expr(a, ctx.value()))
                    .collect::<Result<_, _>>()?,
            }),
            Node::Closure {
                args,
                bindings,
                body,
            } => {
                let function = self.compile_function(args, Some(bindings), *body, ctx.resume)?;
                Ok(Expr::Closure(Rc::new(function)))
            }
            other => panic!("no expression compilation rule for {other:?}"),
        }
    }

    fn compile_index(
        &self,
        array: NodeId,
        indices: &[NodeId],
        ctx: Context<'_>,
    ) -> Result<Expr, FatalError> {
        let mode = if ctx.assignment {
            crate::compiler::code::AccessMode::Write
        } else {
            crate::compiler::code::AccessMode::Read
        };
        let base_ctx = if ctx.assignment {
            ctx.as_target()
        } else {
            ctx.value()
        };
        let base = Box::new(self.compile_expr(array, base_ctx)?);
        let indices = indices
            .iter()
            .map(|&i| self.compile_expr(i, ctx.value()))
            .collect::<Result<_, _>>()?;
        Ok(Expr::Index {
            base,
            indices,
            mode,
        })
    }

    fn compile_property(
        &self,
        object: NodeId,
        properties: &[NodeId],
        ctx: Context<'_>,
    ) -> Result<Expr, FatalError> {
        let mode = if ctx.assignment {
            crate::compiler::code::AccessMode::Write
        } else {
            crate::compiler::code::AccessMode::Read
        };
        let base_ctx = if ctx.assignment {
            ctx.as_target()
        } else {
            ctx.value()
        };
        let base = Box::new(self.compile_expr(object, base_ctx)?);
        let names = properties
            .iter()
            .map(|&p| self.compile_expr(p, ctx.value()))
            .collect::<Result<_, _>>()?;
        Ok(Expr::Property { base, names, mode })
    }

    fn compile_chain(
        &self,
        left: NodeId,
        operations: &[crate::ast::Operation],
        ctx: Context<'_>,
    ) -> Result<Expr, FatalError> {
        let is_assignment = operations
            .first()
            .is_some_and(|op| op.operator == "=");
        let left_ctx = if is_assignment { ctx.as_target() } else { ctx.value() };
        let left = Box::new(self.compile_expr(left, left_ctx)?);

        let ops = operations
            .iter()
            .map(|operation| {
                let by_reference = is_assignment && operation.by_reference;
                let op = if operation.operator == "=" {
                    if by_reference {
                        BinaryOp::SetReference
                    } else {
                        BinaryOp::SetValue
                    }
                } else {
                    *BINARY_OPERATOR_TO_METHOD
                        .get(operation.operator.as_str())
                        .unwrap_or_else(|| {
                            panic!("no compilation rule for operator `{}`", operation.operator)
                        })
                };
                let operand_ctx = if by_reference { ctx.reference() } else { ctx.value() };
                Ok(ChainOp {
                    op,
                    operand: self.compile_expr(operation.operand, operand_ctx)?,
                    by_reference,
                })
            })
            .collect::<Result<_, FatalError>>()?;
        Ok(Expr::Chain { left, ops })
    }
}
