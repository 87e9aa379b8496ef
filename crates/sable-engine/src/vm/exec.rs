//! The instruction evaluator.
//!
//! Evaluation returns [`Flow`] for statements and [`Operand`] for
//! expressions; anything that aborts the current pass travels as an
//! [`Interrupt`]. Suspension is an interrupt, not an error: when a bridged
//! call defers, the evaluator snapshots its anchor stack (the call nodes
//! currently being invoked) and unwinds, leaving the orchestrator to await
//! settlement and drive a resume pass.

use std::rc::Rc;

use rustc_hash::FxHashSet;
use sable_sdk::{BridgeValue, DefermentHandle, HostFault};

use crate::ast::NodeId;
use crate::compiler::{
    AccessMode, ArrayElement, BinaryOp, ClassDef, Expr, Instr, MethodInvoke, Program, Sequence,
    SwitchArm, UnaryOp, UnaryOp::*,
};
use crate::error::{ErrorLevel, FatalError};
use crate::runtime::State;
use crate::vm::array::{ArrayData, ArrayKey};
use crate::vm::callable::{Callable, UserFunction};
use crate::vm::namespace::{Namespace, NamespaceScope, MAGIC_AUTOLOAD, PATH_SEPARATOR};
use crate::vm::object::{ClassData, ObjectData};
use crate::vm::value::Value;
use crate::vm::variable::Variable;

/// How a statement sequence left off.
#[derive(Debug)]
pub enum Flow {
    /// Fell through to the next statement.
    Next,
    /// A return unwinds to the enclosing invocation with this value.
    Return(Value),
    /// A break/continue unwinds to the switch at this depth.
    BreakSwitch(usize),
    /// A goto unwinds to the block or loop that resolves this label.
    Jump(String),
}

/// An execution pass aborted before completing.
#[derive(Debug)]
pub enum Interrupt {
    /// A fatal condition; the run is over.
    Fatal(FatalError),
    /// A bridged operation deferred; the orchestrator takes over.
    Suspend(Suspension),
    /// A fault raised by the host, forwarded unchanged.
    Host(HostFault),
}

impl From<FatalError> for Interrupt {
    fn from(error: FatalError) -> Self {
        Interrupt::Fatal(error)
    }
}

impl From<HostFault> for Interrupt {
    fn from(fault: HostFault) -> Self {
        Interrupt::Host(fault)
    }
}

/// The captured context of one deferral.
#[derive(Debug)]
pub struct Suspension {
    /// The call nodes active at the deferral, outermost first; the last
    /// entry is the node whose operation deferred.
    pub path: Vec<NodeId>,
    /// Settles with the operation's eventual outcome.
    pub handle: DefermentHandle,
}

/// What an expression evaluated to.
#[derive(Debug)]
pub enum Operand {
    /// A plain value.
    Value(Value),
    /// An addressable storage slot.
    Slot(Variable),
    /// A destructuring target list.
    List(Vec<Operand>),
}

impl Operand {
    /// The operand's value; a list target has none.
    pub fn value(&self) -> Value {
        match self {
            Operand::Value(value) => value.clone(),
            Operand::Slot(slot) => slot.get_value(),
            Operand::List(_) => Value::Null,
        }
    }
}

/// Evaluates one compiled program against a run's state.
pub struct Executor<'a> {
    state: &'a State,
    namespace_scope: Rc<NamespaceScope>,
    jump_flags: FxHashSet<String>,
    anchors: Vec<NodeId>,
}

impl<'a> Executor<'a> {
    /// An executor over `state`, starting in the global namespace.
    pub fn new(state: &'a State) -> Self {
        Executor {
            namespace_scope: Rc::new(NamespaceScope::new(
                state.global_namespace(),
                state.global_namespace(),
            )),
            jump_flags: FxHashSet::default(),
            anchors: Vec::new(),
            state,
        }
    }

    /// Run the program's top-level sequence in the global frame and
    /// produce its terminal value.
    pub fn run_program(&mut self, program: &Program) -> Result<Value, Interrupt> {
        self.state.call_stack().push_scope(self.state.global_scope());
        let result = self.run(&program.body);
        self.state.call_stack().pop();
        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Null),
        }
    }

    fn run(&mut self, sequence: &Sequence) -> Result<Flow, Interrupt> {
        for instr in sequence {
            match self.exec(instr)? {
                Flow::Next => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Next)
    }

    fn exec(&mut self, instr: &Instr) -> Result<Flow, Interrupt> {
        match instr {
            Instr::Expr(expr) => {
                self.eval(expr)?;
                Ok(Flow::Next)
            }
            Instr::Echo(expr) => {
                let text = self.eval_value(expr)?.coerce_to_string();
                self.state.write_out(&text);
                Ok(Flow::Next)
            }
            Instr::Write(text) => {
                self.state.write_out(text);
                Ok(Flow::Next)
            }
            Instr::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_value(expr)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Instr::If {
                entry_labels,
                condition,
                consequent,
                alternate,
            } => {
                // A set jump flag forces entry without evaluating the
                // condition, so a goto can land on a label inside.
                let jumping_in = entry_labels.iter().any(|l| self.jump_flags.contains(l));
                if jumping_in || self.eval_value(condition)?.coerce_to_boolean() {
                    self.run(consequent)
                } else if let Some(alternate) = alternate {
                    self.run(alternate)
                } else {
                    Ok(Flow::Next)
                }
            }
            Instr::While { condition, body } => {
                loop {
                    self.state.check_deadline()?;
                    if !self.eval_value(condition)?.coerce_to_boolean() {
                        break;
                    }
                    match self.run(body)? {
                        Flow::Next => {}
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Next)
            }
            Instr::DoWhile { body, condition } => {
                loop {
                    self.state.check_deadline()?;
                    match self.run(body)? {
                        Flow::Next => {}
                        other => return Ok(other),
                    }
                    if !self.eval_value(condition)?.coerce_to_boolean() {
                        break;
                    }
                }
                Ok(Flow::Next)
            }
            Instr::For {
                initializer,
                condition,
                update,
                body,
            } => {
                if let Some(initializer) = initializer {
                    self.eval(initializer)?;
                }
                loop {
                    self.state.check_deadline()?;
                    if let Some(condition) = condition {
                        if !self.eval_value(condition)?.coerce_to_boolean() {
                            break;
                        }
                    }
                    match self.run(body)? {
                        Flow::Next => {}
                        other => return Ok(other),
                    }
                    if let Some(update) = update {
                        self.eval(update)?;
                    }
                }
                Ok(Flow::Next)
            }
            Instr::Foreach {
                array,
                key,
                value,
                by_reference,
                body,
            } => self.exec_foreach(array, key.as_ref(), value, *by_reference, body),
            Instr::Switch {
                depth,
                subject,
                cases,
            } => self.exec_switch(*depth, subject, cases),
            Instr::BreakSwitch { depth } => Ok(Flow::BreakSwitch(*depth)),
            Instr::Goto { label } => {
                self.jump_flags.insert(label.clone());
                Ok(Flow::Jump(label.clone()))
            }
            Instr::Label { label } => {
                self.jump_flags.remove(label);
                Ok(Flow::Next)
            }
            Instr::LabeledBlock { label, body } => match self.run(body)? {
                Flow::Jump(target) if target == *label => Ok(Flow::Next),
                other => Ok(other),
            },
            Instr::LabeledLoop { label, body } => {
                loop {
                    self.state.check_deadline()?;
                    match self.run(body)? {
                        Flow::Jump(target) if target == *label => {}
                        Flow::Next => break,
                        other => return Ok(other),
                    }
                }
                Ok(Flow::Next)
            }
            Instr::SkipWhenJumping { label, body } => {
                if self.jump_flags.contains(label) {
                    Ok(Flow::Next)
                } else {
                    self.run(body)
                }
            }
            Instr::DefineFunction { name, function } => {
                let callable = Callable::User(Rc::new(UserFunction {
                    def: Rc::clone(function),
                    namespace: self.namespace_scope.namespace(),
                    captured: None,
                }));
                self.namespace_scope
                    .namespace()
                    .borrow_mut()
                    .define_function(name, callable)?;
                Ok(Flow::Next)
            }
            Instr::DefineClass(def) => {
                self.exec_define_class(def)?;
                Ok(Flow::Next)
            }
            Instr::EnterNamespace { path, body } => {
                let descendant =
                    Namespace::descendant(&self.namespace_scope.namespace(), path);
                let saved = std::mem::replace(
                    &mut self.namespace_scope,
                    Rc::new(NamespaceScope::new(descendant, self.state.global_namespace())),
                );
                let result = self.run(body);
                self.namespace_scope = saved;
                result
            }
            Instr::Use { clauses } => {
                for clause in clauses {
                    self.namespace_scope
                        .add_use(&clause.path, clause.alias.as_deref());
                }
                Ok(Flow::Next)
            }
        }
    }

    fn exec_foreach(
        &mut self,
        array: &Expr,
        key: Option<&Expr>,
        value: &Expr,
        by_reference: bool,
        body: &Sequence,
    ) -> Result<Flow, Interrupt> {
        let source = self.eval_value(array)?;
        let snapshot = match &source {
            Value::Array(data) => Rc::new(std::cell::RefCell::new(data.borrow().snapshot())),
            _ => return Ok(Flow::Next),
        };
        let len = snapshot.borrow().len();
        for at in 0..len {
            self.state.check_deadline()?;
            // Advance the cursor before the body runs.
            snapshot.borrow_mut().set_pointer(at + 1);
            let (entry_key, slot) = match snapshot.borrow().entry_at(at) {
                Some(entry) => entry.clone(),
                None => break,
            };
            if let Some(key_target) = key {
                if let Operand::Slot(target) = self.eval(key_target)? {
                    target.set_value(key_to_value(&entry_key));
                }
            }
            if let Operand::Slot(target) = self.eval(value)? {
                if by_reference {
                    target.set_reference(&slot);
                } else {
                    target.set_value(slot.get_value());
                }
            }
            match self.run(body)? {
                Flow::Next => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Next)
    }

    fn exec_switch(
        &mut self,
        depth: usize,
        subject: &Expr,
        cases: &[SwitchArm],
    ) -> Result<Flow, Interrupt> {
        let subject = self.eval_value(subject)?;
        let mut matched = false;
        for arm in cases {
            if !matched {
                matched = match &arm.test {
                    Some(test) => {
                        let test = self.eval_value(test)?;
                        subject.is_equal_to(&test)?.coerce_to_boolean()
                    }
                    None => true,
                };
            }
            if matched {
                match self.run(&arm.body)? {
                    Flow::Next => {}
                    Flow::BreakSwitch(target) if target == depth => return Ok(Flow::Next),
                    other => return Ok(other),
                }
            }
        }
        Ok(Flow::Next)
    }

    fn exec_define_class(&mut self, def: &ClassDef) -> Result<(), Interrupt> {
        let name = self.eval_value(&def.name)?.coerce_to_string();
        let parent = match &def.parent {
            Some(parent) => {
                let parent_name = self.eval_value(parent)?.coerce_to_string();
                Some(self.get_class(&parent_name)?)
            }
            None => None,
        };

        let mut constructor: Option<String> = None;
        let mut candidates = 0;
        for (method, _) in &def.methods {
            let magic = method.eq_ignore_ascii_case("__construct");
            if magic || method.eq_ignore_ascii_case(&name) {
                candidates += 1;
                match &constructor {
                    None => constructor = Some(method.clone()),
                    Some(current) if magic && !current.eq_ignore_ascii_case("__construct") => {
                        constructor = Some(method.clone());
                    }
                    Some(_) => {}
                }
            }
        }
        if candidates > 1 {
            self.state.report(
                ErrorLevel::Strict,
                &format!("Redefining already defined constructor for class {name}"),
            );
        }

        let namespace = self.namespace_scope.namespace();
        let methods = def
            .methods
            .iter()
            .map(|(method, function)| {
                (
                    method.clone(),
                    Callable::User(Rc::new(UserFunction {
                        def: Rc::clone(function),
                        namespace: Rc::clone(&namespace),
                        captured: None,
                    })),
                )
            })
            .collect();

        let qualified = format!("{}{}", namespace.borrow().prefix(), name);
        let class = Rc::new(ClassData::new(
            qualified,
            constructor,
            parent,
            def.properties.clone(),
            methods,
        ));
        namespace.borrow_mut().define_class(class);
        Ok(())
    }

    fn eval_value(&mut self, expr: &Expr) -> Result<Value, Interrupt> {
        Ok(self.eval(expr)?.value())
    }

    fn eval(&mut self, expr: &Expr) -> Result<Operand, Interrupt> {
        match expr {
            Expr::Null => Ok(Operand::Value(Value::Null)),
            Expr::Bool(b) => Ok(Operand::Value(Value::Bool(*b))),
            Expr::Int(i) => Ok(Operand::Value(Value::Int(*i))),
            Expr::Float(f) => Ok(Operand::Value(Value::Float(*f))),
            Expr::Str(s) => Ok(Operand::Value(Value::Str(s.clone()))),
            Expr::Interp(parts) => {
                let mut text = String::new();
                for part in parts {
                    text.push_str(&self.eval_value(part)?.coerce_to_string());
                }
                Ok(Operand::Value(Value::Str(text)))
            }
            Expr::ArrayLit(elements) => {
                let mut data = ArrayData::new();
                for element in elements {
                    match element {
                        ArrayElement::Value(value) => {
                            let value = self.eval_value(value)?;
                            data.push(value);
                        }
                        ArrayElement::KeyValue(key, value) => {
                            let key = ArrayKey::from_value(&self.eval_value(key)?);
                            let value = self.eval_value(value)?;
                            data.set(key, value);
                        }
                    }
                }
                Ok(Operand::Value(Value::from_array(data)))
            }
            Expr::Variable { name, want_value } => self.eval_variable(name, *want_value),
            Expr::VariableVariable { name, want_value } => {
                let name = self.eval_value(name)?.coerce_to_string();
                self.eval_variable(&name, *want_value)
            }
            Expr::Index {
                base,
                indices,
                mode,
            } => self.eval_index(base, indices, *mode),
            Expr::Property { base, names, mode } => self.eval_property(base, names, *mode),
            Expr::Chain { left, ops } => self.eval_chain(left, ops),
            Expr::Unary { op, operand } => self.eval_unary(*op, operand),
            Expr::Ternary { condition, arms } => {
                let mut current = self.eval_value(condition)?;
                for (consequent, alternate) in arms {
                    current = if current.coerce_to_boolean() {
                        self.eval_value(consequent)?
                    } else {
                        self.eval_value(alternate)?
                    };
                }
                Ok(Operand::Value(current))
            }
            Expr::Comma(expressions) => {
                let mut last = Value::Null;
                for expression in expressions {
                    last = self.eval_value(expression)?;
                }
                Ok(Operand::Value(last))
            }
            Expr::Isset(variables) => {
                let scope = self.state.call_stack().current_scope();
                scope.suppress_errors();
                let probed = self.probe_all_set(variables);
                scope.unsuppress_errors();
                Ok(Operand::Value(Value::Bool(probed?)))
            }
            Expr::Print(operand) => {
                let text = self.eval_value(operand)?.coerce_to_string();
                self.state.write_out(&text);
                Ok(Operand::Value(Value::Int(1)))
            }
            Expr::Call { callee, args, node } => self.eval_call(callee, args, *node),
            Expr::MethodCall {
                object,
                calls,
                node,
            } => self.eval_method_call(object, calls, *node),
            Expr::New { class_name, args } => {
                let name = self.eval_value(class_name)?.coerce_to_string();
                let args = self.eval_args(args)?;
                Ok(Operand::Value(self.instantiate(&name, args)?))
            }
            Expr::Closure(function) => {
                let callable = Callable::User(Rc::new(UserFunction {
                    def: Rc::clone(function),
                    namespace: self.namespace_scope.namespace(),
                    captured: Some(self.state.call_stack().current_scope()),
                }));
                Ok(Operand::Value(Value::from_object(ObjectData::closure(
                    callable,
                ))))
            }
            Expr::List(elements) => {
                let targets = elements
                    .iter()
                    .map(|element| self.eval(element))
                    .collect::<Result<_, _>>()?;
                Ok(Operand::List(targets))
            }
            Expr::ResumeValue => Ok(Operand::Value(
                self.state.resume_value().unwrap_or(Value::Null),
            )),
        }
    }

    fn eval_variable(&mut self, name: &str, want_value: bool) -> Result<Operand, Interrupt> {
        let slot = self.state.call_stack().current_scope().get_variable(name);
        if want_value {
            if !slot.is_defined() {
                self.state
                    .report(ErrorLevel::Notice, &format!("Undefined variable: {name}"));
            }
            Ok(Operand::Value(slot.get_value()))
        } else {
            Ok(Operand::Slot(slot))
        }
    }

    fn eval_index(
        &mut self,
        base: &Expr,
        indices: &[Expr],
        mode: AccessMode,
    ) -> Result<Operand, Interrupt> {
        let mut current = self.eval(base)?;

        // `$a[]` has no key; a write appends, a read yields nothing.
        if indices.is_empty() {
            return match mode {
                AccessMode::Write => {
                    let slot = match &current {
                        Operand::Slot(slot) => slot.clone(),
                        other => Variable::with_value(other.value()),
                    };
                    let array = self.imply_array(&slot)?;
                    let element = array.borrow_mut().append_slot();
                    Ok(Operand::Slot(element))
                }
                AccessMode::Read => Ok(Operand::Value(Value::Null)),
            };
        }

        for index in indices {
            let key = ArrayKey::from_value(&self.eval_value(index)?);
            current = match mode {
                AccessMode::Write => {
                    let slot = match &current {
                        Operand::Slot(slot) => slot.clone(),
                        other => Variable::with_value(other.value()),
                    };
                    let array = self.imply_array(&slot)?;
                    let element = array.borrow_mut().element_for_write(key);
                    Operand::Slot(element)
                }
                AccessMode::Read => match current.value() {
                    Value::Array(data) => {
                        let element = data.borrow().get(&key);
                        match element {
                            Some(slot) => Operand::Slot(slot),
                            None => {
                                self.report_missing_key(&key);
                                Operand::Value(Value::Null)
                            }
                        }
                    }
                    _ => {
                        self.report_missing_key(&key);
                        Operand::Value(Value::Null)
                    }
                },
            };
        }
        Ok(current)
    }

    /// Replace an undefined or null slot with a fresh empty array and
    /// hand back the array it now holds.
    fn imply_array(
        &mut self,
        slot: &Variable,
    ) -> Result<Rc<std::cell::RefCell<ArrayData>>, Interrupt> {
        if matches!(slot.get_value(), Value::Null) {
            slot.set_value(Value::empty_array());
        }
        match slot.get_value() {
            Value::Array(data) => Ok(data),
            _ => Err(FatalError::UnsupportedOperandTypes.into()),
        }
    }

    fn report_missing_key(&self, key: &ArrayKey) {
        let message = match key {
            ArrayKey::Int(i) => format!("Undefined offset: {i}"),
            ArrayKey::Str(s) => format!("Undefined index: {s}"),
        };
        self.state.report(ErrorLevel::Notice, &message);
    }

    fn eval_property(
        &mut self,
        base: &Expr,
        names: &[Expr],
        mode: AccessMode,
    ) -> Result<Operand, Interrupt> {
        let mut current = self.eval(base)?;
        for name in names {
            let name = self.eval_value(name)?.coerce_to_string();
            current = match mode {
                AccessMode::Write => {
                    let slot = match &current {
                        Operand::Slot(slot) => slot.clone(),
                        other => Variable::with_value(other.value()),
                    };
                    if matches!(slot.get_value(), Value::Null) {
                        slot.set_value(Value::from_object(ObjectData::plain()));
                    }
                    match slot.get_value() {
                        Value::Object(data) => {
                            Operand::Slot(data.borrow_mut().property_for_write(&name))
                        }
                        _ => return Err(FatalError::UnsupportedOperandTypes.into()),
                    }
                }
                AccessMode::Read => match current.value() {
                    Value::Object(data) => {
                        let (slot, class_name) =
                            (data.borrow().property(&name), data.borrow().class_name());
                        match slot {
                            Some(slot) => Operand::Slot(slot),
                            None => {
                                self.state.report(
                                    ErrorLevel::Notice,
                                    &format!("Undefined property: {class_name}::${name}"),
                                );
                                Operand::Value(Value::Null)
                            }
                        }
                    }
                    _ => Operand::Value(Value::Null),
                },
            };
        }
        Ok(current)
    }

    fn eval_chain(
        &mut self,
        left: &Expr,
        ops: &[crate::compiler::ChainOp],
    ) -> Result<Operand, Interrupt> {
        let mut current = self.eval(left)?;
        for op in ops {
            current = match op.op {
                BinaryOp::SetValue => {
                    let value = self.eval_value(&op.operand)?;
                    self.assign(&current, &value)?;
                    Operand::Value(value)
                }
                BinaryOp::SetReference => {
                    let operand = self.eval(&op.operand)?;
                    if let (Operand::Slot(target), Operand::Slot(source)) = (&current, &operand) {
                        target.set_reference(source);
                    }
                    Operand::Value(operand.value())
                }
                arithmetic => {
                    let lhs = current.value();
                    let rhs = self.eval_value(&op.operand)?;
                    Operand::Value(apply_binary(arithmetic, &lhs, &rhs)?)
                }
            };
        }
        Ok(current)
    }

    fn assign(&mut self, target: &Operand, value: &Value) -> Result<(), Interrupt> {
        match target {
            Operand::Slot(slot) => slot.set_value(value.clone()),
            Operand::List(targets) => {
                if let Value::Array(data) = value {
                    for (at, element) in targets.iter().enumerate() {
                        let item = data
                            .borrow()
                            .get(&ArrayKey::Int(at as i64))
                            .map(|slot| slot.get_value())
                            .unwrap_or(Value::Null);
                        self.assign(element, &item)?;
                    }
                }
            }
            Operand::Value(_) => {}
        }
        Ok(())
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr) -> Result<Operand, Interrupt> {
        let operand = self.eval(operand)?;
        let value = match op {
            ToPositive => operand.value().to_positive()?,
            ToNegative => operand.value().to_negative()?,
            OnesComplement => operand.value().ones_complement()?,
            PreIncrement | PreDecrement | PostIncrement | PostDecrement => {
                let old = operand.value();
                let new = match op {
                    PreIncrement | PostIncrement => old.incremented()?,
                    _ => old.decremented()?,
                };
                if let Operand::Slot(slot) = &operand {
                    slot.set_value(new.clone());
                }
                match op {
                    PostIncrement | PostDecrement => old,
                    _ => new,
                }
            }
        };
        Ok(Operand::Value(value))
    }

    fn probe_all_set(&mut self, variables: &[Expr]) -> Result<bool, Interrupt> {
        for variable in variables {
            let set = match self.eval(variable)? {
                Operand::Slot(slot) => slot.is_set(),
                Operand::Value(value) => value != Value::Null,
                Operand::List(_) => false,
            };
            if !set {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, Interrupt> {
        args.iter().map(|arg| self.eval_value(arg)).collect()
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        node: NodeId,
    ) -> Result<Operand, Interrupt> {
        let callee = self.eval_value(callee)?;
        let args = self.eval_args(args)?;

        let callable = match &callee {
            Value::Str(name) => self.resolve_function(name)?,
            Value::Object(data) => {
                let invoke = data.borrow().invoke.clone();
                match invoke {
                    Some(callable) => callable,
                    None => {
                        return Err(FatalError::CallToUndefinedFunction {
                            name: data.borrow().class_name(),
                        }
                        .into())
                    }
                }
            }
            other => {
                return Err(FatalError::CallToUndefinedFunction {
                    name: other.coerce_to_string(),
                }
                .into())
            }
        };

        self.anchors.push(node);
        let result = self.invoke(&callable, args, None);
        self.anchors.pop();
        Ok(Operand::Value(result?))
    }

    fn eval_method_call(
        &mut self,
        object: &Expr,
        calls: &[MethodInvoke],
        node: NodeId,
    ) -> Result<Operand, Interrupt> {
        let mut receiver = self.eval_value(object)?;
        self.anchors.push(node);
        let result = (|| -> Result<Value, Interrupt> {
            for call in calls {
                let method = self.eval_value(&call.method)?.coerce_to_string();
                let args = self.eval_args(&call.args)?;
                receiver = self.dispatch_method(&receiver, &method, args)?;
            }
            Ok(receiver.clone())
        })();
        self.anchors.pop();
        Ok(Operand::Value(result?))
    }

    fn dispatch_method(
        &mut self,
        receiver: &Value,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, Interrupt> {
        let data = match receiver {
            Value::Object(data) => data,
            other => {
                return Err(FatalError::UndefinedMethod {
                    class_name: other.type_tag().as_str().to_owned(),
                    method_name: method.to_owned(),
                }
                .into())
            }
        };

        let host = data.borrow().host.clone();
        if let Some(host) = host {
            let native_args = args.iter().map(Value::to_native).collect();
            return match host.call_method(method, native_args)? {
                BridgeValue::Ready(value) => Ok(Value::from_native(&value)),
                BridgeValue::Deferred(handle) => Err(Interrupt::Suspend(Suspension {
                    path: self.anchors.clone(),
                    handle,
                })),
            };
        }

        let (class, invoke, class_name) = {
            let borrowed = data.borrow();
            (
                borrowed.class.clone(),
                borrowed.invoke.clone(),
                borrowed.class_name(),
            )
        };
        let callable = class
            .as_ref()
            .and_then(|class| class.find_method(method))
            .or_else(|| {
                invoke.filter(|_| method.eq_ignore_ascii_case("__invoke"))
            })
            .ok_or(FatalError::UndefinedMethod {
                class_name,
                method_name: method.to_owned(),
            })?;
        self.invoke(&callable, args, Some(receiver.clone()))
    }

    fn invoke(
        &mut self,
        callable: &Callable,
        args: Vec<Value>,
        this: Option<Value>,
    ) -> Result<Value, Interrupt> {
        match callable {
            Callable::Native(native) => Ok(native.call(self.state, args)?),
            Callable::User(function) => self.invoke_user(function, args, this),
        }
    }

    fn invoke_user(
        &mut self,
        function: &UserFunction,
        args: Vec<Value>,
        this: Option<Value>,
    ) -> Result<Value, Interrupt> {
        let scope = self.state.call_stack().push(this);
        for (at, param) in function.def.params.iter().enumerate() {
            scope
                .get_variable(param)
                .set_value(args.get(at).cloned().unwrap_or(Value::Null));
        }
        if let Some(captured) = &function.captured {
            for binding in &function.def.bindings {
                let outer = captured.get_variable(&binding.name);
                if binding.by_reference {
                    scope.get_variable(&binding.name).set_reference(&outer);
                } else {
                    scope.get_variable(&binding.name).set_value(outer.get_value());
                }
            }
        }

        // Function bodies are their own compilation unit: jump flags and
        // the namespace they resolve names against do not leak either way.
        let saved_flags = std::mem::take(&mut self.jump_flags);
        let saved_scope = std::mem::replace(
            &mut self.namespace_scope,
            Rc::new(NamespaceScope::new(
                Rc::clone(&function.namespace),
                self.state.global_namespace(),
            )),
        );
        let result = self.run(&function.def.body);
        self.namespace_scope = saved_scope;
        self.jump_flags = saved_flags;
        self.state.call_stack().pop();

        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Null),
        }
    }

    fn resolve_function(&mut self, name: &str) -> Result<Callable, Interrupt> {
        if name.contains(PATH_SEPARATOR) {
            let (namespace, local) = self.namespace_scope.resolve(name);
            let found = namespace.borrow().local_function(&local);
            return found.ok_or_else(|| {
                FatalError::CallToUndefinedFunction {
                    name: name.to_owned(),
                }
                .into()
            });
        }
        Ok(Namespace::get_function(
            &self.namespace_scope.namespace(),
            name,
        )?)
    }

    fn get_class(&mut self, path: &str) -> Result<Rc<ClassData>, Interrupt> {
        let (namespace, name) = self.namespace_scope.resolve(path);
        if let Some(class) = namespace.borrow().find_class(&name) {
            return Ok(class);
        }

        // One autoload attempt per miss, then one retry.
        let hook = self
            .state
            .global_namespace()
            .borrow()
            .local_function(MAGIC_AUTOLOAD);
        if let Some(hook) = hook {
            let qualified = format!("{}{}", namespace.borrow().prefix(), name);
            self.invoke(&hook, vec![Value::Str(qualified)], None)?;
            if let Some(class) = namespace.borrow().find_class(&name) {
                return Ok(class);
            }
        }
        Err(FatalError::ClassNotFound {
            name: path.to_owned(),
        }
        .into())
    }

    fn instantiate(&mut self, class_name: &str, args: Vec<Value>) -> Result<Value, Interrupt> {
        let class = self.get_class(class_name)?;
        let instance = Value::from_object(ObjectData::instance_of(Rc::clone(&class)));

        // Inherited property defaults initialize before the subclass's own.
        for ancestor in class.chain() {
            for (property, default) in &ancestor.properties {
                let value = match default {
                    Some(default) => self.eval_value(default)?,
                    None => Value::Null,
                };
                if let Value::Object(data) = &instance {
                    data.borrow_mut().property_for_write(property).set_value(value);
                }
            }
        }

        if let Some(constructor) = constructor_name(&class) {
            if let Some(callable) = class.find_method(&constructor) {
                self.invoke(&callable, args, Some(instance.clone()))?;
            }
        }
        Ok(instance)
    }
}

fn constructor_name(class: &Rc<ClassData>) -> Option<String> {
    match &class.constructor {
        Some(name) => Some(name.clone()),
        None => class.parent.as_ref().and_then(constructor_name),
    }
}

fn key_to_value(key: &ArrayKey) -> Value {
    match key {
        ArrayKey::Int(i) => Value::Int(*i),
        ArrayKey::Str(s) => Value::Str(s.clone()),
    }
}

fn apply_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, FatalError> {
    match op {
        BinaryOp::Add => lhs.add(rhs),
        BinaryOp::Subtract => lhs.subtract(rhs),
        BinaryOp::Multiply => lhs.multiply(rhs),
        BinaryOp::Divide => lhs.divide(rhs),
        BinaryOp::Concat => lhs.concat(rhs),
        BinaryOp::ShiftLeftBy => lhs.shift_left_by(rhs),
        BinaryOp::ShiftRightBy => lhs.shift_right_by(rhs),
        BinaryOp::IsEqualTo => lhs.is_equal_to(rhs),
        BinaryOp::IsNotEqualTo => lhs.is_not_equal_to(rhs),
        BinaryOp::IsIdenticalTo => lhs.is_identical_to(rhs),
        BinaryOp::IsNotIdenticalTo => lhs.is_not_identical_to(rhs),
        BinaryOp::IsLessThan => lhs.is_less_than(rhs),
        BinaryOp::SetValue | BinaryOp::SetReference => Err(FatalError::UnsupportedOperandTypes),
    }
}
