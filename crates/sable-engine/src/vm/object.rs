//! Classes and object instances.

use std::fmt;
use std::rc::Rc;

use sable_sdk::HostObject;

use crate::compiler::Expr;
use crate::vm::callable::Callable;
use crate::vm::variable::Variable;

/// A defined class.
///
/// Single inheritance only: the parent link chains descriptors, and
/// construction walks the chain outermost ancestor first so inherited
/// property defaults initialize before the subclass's own.
pub struct ClassData {
    /// The fully qualified class name.
    pub name: String,
    /// The resolved constructor method name, if the class declares one.
    pub constructor: Option<String>,
    /// The superclass, if any.
    pub parent: Option<Rc<ClassData>>,
    /// Declared property names with their default-value code, evaluated
    /// at construction time.
    pub properties: Vec<(String, Option<Expr>)>,
    methods: Vec<(String, Callable)>,
}

impl ClassData {
    /// Assemble a class descriptor.
    pub fn new(
        name: String,
        constructor: Option<String>,
        parent: Option<Rc<ClassData>>,
        properties: Vec<(String, Option<Expr>)>,
        methods: Vec<(String, Callable)>,
    ) -> Self {
        ClassData {
            name,
            constructor,
            parent,
            properties,
            methods,
        }
    }

    /// The class name without its namespace prefix.
    pub fn simple_name(&self) -> &str {
        match self.name.rfind('\\') {
            Some(at) => &self.name[at + 1..],
            None => &self.name,
        }
    }

    /// Look `method` up on this class, then up the inheritance chain.
    /// Method names match case-insensitively.
    pub fn find_method(&self, method: &str) -> Option<Callable> {
        for (name, callable) in &self.methods {
            if name.eq_ignore_ascii_case(method) {
                return Some(callable.clone());
            }
        }
        self.parent.as_ref().and_then(|p| p.find_method(method))
    }

    /// The inheritance chain, outermost ancestor first.
    pub fn chain(self: &Rc<Self>) -> Vec<Rc<ClassData>> {
        let mut chain = match &self.parent {
            Some(parent) => parent.chain(),
            None => Vec::new(),
        };
        chain.push(Rc::clone(self));
        chain
    }
}

impl fmt::Debug for ClassData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassData")
            .field("name", &self.name)
            .field("constructor", &self.constructor)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// One object instance.
pub struct ObjectData {
    /// The instance's class; anonymous objects (closures, auto-vivified
    /// property containers) have none.
    pub class: Option<Rc<ClassData>>,
    /// Callable bound to the object when it is invoked as a function.
    pub invoke: Option<Callable>,
    /// The bridged host object this instance wraps, if any.
    pub host: Option<Rc<dyn HostObject>>,
    properties: Vec<(String, Variable)>,
}

impl ObjectData {
    /// A plain property bag with no class.
    pub fn plain() -> Self {
        ObjectData {
            class: None,
            invoke: None,
            host: None,
            properties: Vec::new(),
        }
    }

    /// A fresh, not yet initialized instance of `class`.
    pub fn instance_of(class: Rc<ClassData>) -> Self {
        ObjectData {
            class: Some(class),
            invoke: None,
            host: None,
            properties: Vec::new(),
        }
    }

    /// A closure: invokable, classless, no properties.
    pub fn closure(callable: Callable) -> Self {
        ObjectData {
            class: None,
            invoke: Some(callable),
            host: None,
            properties: Vec::new(),
        }
    }

    /// A wrapper around a host-exposed object.
    pub fn bridged(host: Rc<dyn HostObject>) -> Self {
        ObjectData {
            class: None,
            invoke: None,
            host: Some(host),
            properties: Vec::new(),
        }
    }

    /// The name this instance reports in diagnostics.
    pub fn class_name(&self) -> String {
        match (&self.class, &self.invoke, &self.host) {
            (Some(class), _, _) => class.name.clone(),
            (None, Some(_), _) => "Closure".to_owned(),
            (None, None, Some(_)) => "Object".to_owned(),
            (None, None, None) => "stdClass".to_owned(),
        }
    }

    /// The properties in definition order.
    pub fn properties(&self) -> &[(String, Variable)] {
        &self.properties
    }

    /// The slot behind `name`, if the property exists.
    pub fn property(&self, name: &str) -> Option<Variable> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| slot.clone())
    }

    /// The slot behind `name`, created undefined when missing.
    pub fn property_for_write(&mut self, name: &str) -> Variable {
        if let Some(slot) = self.property(name) {
            return slot;
        }
        let slot = Variable::new();
        self.properties.push((name.to_owned(), slot.clone()));
        slot
    }
}

impl fmt::Debug for ObjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectData")
            .field("class", &self.class.as_ref().map(|c| c.name.clone()))
            .field("properties", &self.properties.len())
            .field("invokable", &self.invoke.is_some())
            .field("bridged", &self.host.is_some())
            .finish()
    }
}
