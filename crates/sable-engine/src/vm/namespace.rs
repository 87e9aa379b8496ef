//! Hierarchical symbol tables.
//!
//! One namespace node per path segment, rooted at the single global
//! namespace. Function names match case-sensitively with parent-chain
//! fallback; class names match case-insensitively with no fallback (a
//! miss goes to the autoload hook instead, driven by the evaluator).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use crate::error::FatalError;
use crate::vm::callable::Callable;
use crate::vm::object::ClassData;

/// The reserved autoload hook name.
pub const MAGIC_AUTOLOAD: &str = "__autoload";

/// The path separator in qualified names.
pub const PATH_SEPARATOR: char = '\\';

/// One node of the namespace tree.
pub struct Namespace {
    name: String,
    parent: Option<Weak<RefCell<Namespace>>>,
    children: FxHashMap<String, Rc<RefCell<Namespace>>>,
    functions: FxHashMap<String, Callable>,
    classes: FxHashMap<String, Rc<ClassData>>,
}

impl Namespace {
    /// The global root namespace.
    pub fn global() -> Rc<RefCell<Namespace>> {
        Rc::new(RefCell::new(Namespace {
            name: String::new(),
            parent: None,
            children: FxHashMap::default(),
            functions: FxHashMap::default(),
            classes: FxHashMap::default(),
        }))
    }

    /// True for the global root.
    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    /// The qualified prefix names under this namespace carry
    /// (empty for the global namespace, otherwise `A\B\`).
    pub fn prefix(&self) -> String {
        match &self.parent {
            None => String::new(),
            Some(parent) => match parent.upgrade() {
                Some(parent) => {
                    let mut prefix = parent.borrow().prefix();
                    prefix.push_str(&self.name);
                    prefix.push(PATH_SEPARATOR);
                    prefix
                }
                None => String::new(),
            },
        }
    }

    /// Walk (and create) the descendant at `path`, one node per segment.
    /// Idempotent for a given path.
    pub fn descendant(this: &Rc<RefCell<Namespace>>, path: &str) -> Rc<RefCell<Namespace>> {
        let mut current = Rc::clone(this);
        for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            let existing = current.borrow().children.get(segment).cloned();
            let next = match existing {
                Some(child) => child,
                None => {
                    let child = Rc::new(RefCell::new(Namespace {
                        name: segment.to_owned(),
                        parent: Some(Rc::downgrade(&current)),
                        children: FxHashMap::default(),
                        functions: FxHashMap::default(),
                        classes: FxHashMap::default(),
                    }));
                    current
                        .borrow_mut()
                        .children
                        .insert(segment.to_owned(), Rc::clone(&child));
                    child
                }
            };
            current = next;
        }
        current
    }

    /// Bind a function. The reserved autoload name must take exactly one
    /// argument; the arity rule applies in the global namespace only.
    pub fn define_function(&mut self, name: &str, callable: Callable) -> Result<(), FatalError> {
        if self.is_global()
            && name.eq_ignore_ascii_case(MAGIC_AUTOLOAD)
            && callable.arity() != Some(1)
        {
            return Err(FatalError::ExpectExactlyOneArg {
                name: MAGIC_AUTOLOAD.to_owned(),
            });
        }
        self.functions.insert(name.to_owned(), callable);
        Ok(())
    }

    /// The function bound locally under `name`, if any.
    pub fn local_function(&self, name: &str) -> Option<Callable> {
        self.functions.get(name).cloned()
    }

    /// Resolve `name` against this namespace, walking up through parents.
    pub fn get_function(
        this: &Rc<RefCell<Namespace>>,
        name: &str,
    ) -> Result<Callable, FatalError> {
        let mut current = Rc::clone(this);
        loop {
            if let Some(callable) = current.borrow().local_function(name) {
                return Ok(callable);
            }
            let parent = current
                .borrow()
                .parent
                .as_ref()
                .and_then(|weak| weak.upgrade());
            match parent {
                Some(parent) => current = parent,
                None => {
                    return Err(FatalError::CallToUndefinedFunction {
                        name: name.to_owned(),
                    })
                }
            }
        }
    }

    /// Bind a class under its lowercased name.
    pub fn define_class(&mut self, class: Rc<ClassData>) {
        self.classes
            .insert(class.simple_name().to_ascii_lowercase(), class);
    }

    /// The class bound locally under `name`, matched case-insensitively.
    pub fn find_class(&self, name: &str) -> Option<Rc<ClassData>> {
        self.classes.get(&name.to_ascii_lowercase()).cloned()
    }
}

/// Name resolution state for one executing region: the current namespace
/// plus the aliases its `use` clauses registered.
pub struct NamespaceScope {
    namespace: Rc<RefCell<Namespace>>,
    global: Rc<RefCell<Namespace>>,
    aliases: RefCell<FxHashMap<String, String>>,
}

impl NamespaceScope {
    /// A scope over `namespace` with no aliases.
    pub fn new(namespace: Rc<RefCell<Namespace>>, global: Rc<RefCell<Namespace>>) -> Self {
        NamespaceScope {
            namespace,
            global,
            aliases: RefCell::new(FxHashMap::default()),
        }
    }

    /// The namespace this scope executes against.
    pub fn namespace(&self) -> Rc<RefCell<Namespace>> {
        Rc::clone(&self.namespace)
    }

    /// Register one alias. Without an explicit alias the path's last
    /// segment becomes the alias.
    pub fn add_use(&self, path: &str, alias: Option<&str>) {
        let alias = alias
            .map(str::to_owned)
            .unwrap_or_else(|| last_segment(path).to_owned());
        self.aliases
            .borrow_mut()
            .insert(alias, path.trim_start_matches(PATH_SEPARATOR).to_owned());
    }

    /// Split `path` into the namespace holding it and the final name
    /// segment. A leading separator anchors at the global root; an alias
    /// on the first segment expands from the global root; anything else
    /// resolves relative to the current namespace.
    pub fn resolve(&self, path: &str) -> (Rc<RefCell<Namespace>>, String) {
        let name = last_segment(path).to_owned();
        if let Some(rest) = path.strip_prefix(PATH_SEPARATOR) {
            return (self.descend(&self.global, parent_path(rest)), name);
        }
        let first = path
            .split(PATH_SEPARATOR)
            .next()
            .unwrap_or_default()
            .to_owned();
        if let Some(target) = self.aliases.borrow().get(&first) {
            let remainder = &path[first.len()..];
            let full = format!("{target}{remainder}");
            return (
                self.descend(&self.global, parent_path(&full)),
                last_segment(&full).to_owned(),
            );
        }
        (self.descend(&self.namespace, parent_path(path)), name)
    }

    fn descend(&self, from: &Rc<RefCell<Namespace>>, path: &str) -> Rc<RefCell<Namespace>> {
        if path.is_empty() {
            Rc::clone(from)
        } else {
            Namespace::descendant(from, path)
        }
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}

fn parent_path(path: &str) -> &str {
    match path.rfind(PATH_SEPARATOR) {
        Some(at) => &path[..at],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::FunctionDef;
    use crate::vm::callable::UserFunction;

    fn user_function(global: &Rc<RefCell<Namespace>>, params: &[&str]) -> Callable {
        Callable::User(Rc::new(UserFunction {
            def: Rc::new(FunctionDef {
                params: params.iter().map(|p| (*p).to_owned()).collect(),
                bindings: Vec::new(),
                body: Vec::new(),
            }),
            namespace: Rc::clone(global),
            captured: None,
        }))
    }

    #[test]
    fn descendant_is_idempotent() {
        let global = Namespace::global();
        let a = Namespace::descendant(&global, "A\\B");
        let b = Namespace::descendant(&global, "A\\B");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(a.borrow().prefix(), "A\\B\\");
    }

    #[test]
    fn function_lookup_walks_parents() {
        let global = Namespace::global();
        let callable = user_function(&global, &[]);
        global
            .borrow_mut()
            .define_function("strlen_like", callable)
            .unwrap();

        let child = Namespace::descendant(&global, "App");
        assert!(Namespace::get_function(&child, "strlen_like").is_ok());
        assert!(matches!(
            Namespace::get_function(&child, "missing"),
            Err(FatalError::CallToUndefinedFunction { .. })
        ));
    }

    #[test]
    fn autoload_arity_is_enforced_globally_only() {
        let global = Namespace::global();
        let wrong = user_function(&global, &[]);
        assert_eq!(
            global.borrow_mut().define_function("__autoload", wrong),
            Err(FatalError::ExpectExactlyOneArg {
                name: "__autoload".to_owned()
            })
        );

        let ok = user_function(&global, &["class_name"]);
        assert!(global.borrow_mut().define_function("__autoload", ok).is_ok());

        let child = Namespace::descendant(&global, "App");
        let nested = user_function(&global, &[]);
        assert!(child.borrow_mut().define_function("__autoload", nested).is_ok());
    }

    #[test]
    fn class_names_match_case_insensitively() {
        let global = Namespace::global();
        let class = Rc::new(ClassData::new(
            "Animal".to_owned(),
            None,
            None,
            Vec::new(),
            Vec::new(),
        ));
        global.borrow_mut().define_class(class);
        assert!(global.borrow().find_class("ANIMAL").is_some());
        assert!(global.borrow().find_class("animal").is_some());
    }

    #[test]
    fn aliases_expand_first_segment() {
        let global = Namespace::global();
        Namespace::descendant(&global, "Vendor\\Lib");
        let scope = NamespaceScope::new(Rc::clone(&global), Rc::clone(&global));
        scope.add_use("Vendor\\Lib", None);

        let (ns, name) = scope.resolve("Lib\\Widget");
        assert_eq!(ns.borrow().prefix(), "Vendor\\Lib\\");
        assert_eq!(name, "Widget");
    }
}
