//! Built-in functions and classes installed into every run.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::FatalError;
use crate::runtime::State;
use crate::vm::array::ArrayKey;
use crate::vm::callable::{Callable, NativeFunction};
use crate::vm::namespace::Namespace;
use crate::vm::object::ClassData;
use crate::vm::value::Value;

/// Install the builtin library into the global namespace.
pub fn install(global: &Rc<RefCell<Namespace>>) -> Result<(), FatalError> {
    let mut ns = global.borrow_mut();

    ns.define_function(
        "var_dump",
        Callable::Native(Rc::new(NativeFunction::new("var_dump", var_dump))),
    )?;
    ns.define_function(
        "strlen",
        Callable::Native(Rc::new(NativeFunction::new("strlen", strlen))),
    )?;

    ns.define_class(Rc::new(ClassData::new(
        "stdClass".to_owned(),
        None,
        None,
        Vec::new(),
        Vec::new(),
    )));
    Ok(())
}

fn var_dump(state: &State, args: Vec<Value>) -> Result<Value, FatalError> {
    let mut out = String::new();
    for arg in &args {
        dump(arg, 0, &mut out);
    }
    state.write_out(&out);
    Ok(Value::Null)
}

fn dump(value: &Value, depth: usize, out: &mut String) {
    let pad = "  ".repeat(depth);
    match value {
        Value::Null => out.push_str(&format!("{pad}NULL\n")),
        Value::Bool(b) => out.push_str(&format!("{pad}bool({b})\n")),
        Value::Int(i) => out.push_str(&format!("{pad}int({i})\n")),
        Value::Float(f) => out.push_str(&format!("{pad}float({})\n", Value::Float(*f).coerce_to_string())),
        Value::Str(s) => out.push_str(&format!("{pad}string({}) \"{s}\"\n", s.len())),
        Value::Array(data) => {
            let data = data.borrow();
            out.push_str(&format!("{pad}array({}) {{\n", data.len()));
            for (key, slot) in data.entries() {
                match key {
                    ArrayKey::Int(i) => out.push_str(&format!("{pad}  [{i}]=>\n")),
                    ArrayKey::Str(s) => out.push_str(&format!("{pad}  [\"{s}\"]=>\n")),
                }
                dump(&slot.get_value(), depth + 1, out);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        Value::Object(data) => {
            let data = data.borrow();
            out.push_str(&format!(
                "{pad}object({}) ({}) {{\n",
                data.class_name(),
                data.properties().len()
            ));
            for (name, slot) in data.properties() {
                out.push_str(&format!("{pad}  [\"{name}\"]=>\n"));
                dump(&slot.get_value(), depth + 1, out);
            }
            out.push_str(&format!("{pad}}}\n"));
        }
    }
}

fn strlen(_state: &State, args: Vec<Value>) -> Result<Value, FatalError> {
    Ok(match args.first() {
        Some(value) => Value::Int(value.coerce_to_string().len() as i64),
        None => Value::Null,
    })
}
