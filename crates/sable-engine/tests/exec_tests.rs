//! End-to-end execution of compiled programs.

use std::cell::RefCell;
use std::rc::Rc;

use sable_engine::ast::{Ast, AstBuilder};
use sable_engine::{BufferSink, Engine, EngineError, FatalError, NativeValue, TypeTag};

fn run(ast: &Ast) -> (Result<(NativeValue, TypeTag), EngineError>, String, String) {
    let stdout = Rc::new(RefCell::new(BufferSink::new()));
    let stderr = Rc::new(RefCell::new(BufferSink::new()));
    let mut engine = Engine::default();
    engine.set_stdout(stdout.clone());
    engine.set_stderr(stderr.clone());
    let result = engine.run(ast);
    let out = stdout.borrow().contents().to_owned();
    let err = stderr.borrow().contents().to_owned();
    (result, out, err)
}

fn run_value(ast: &Ast) -> (NativeValue, TypeTag) {
    let (result, _out, err) = run(ast);
    match result {
        Ok(value) => value,
        Err(e) => panic!("run failed: {e} (stderr: {err})"),
    }
}

#[test]
fn returns_terminal_value_with_tag() {
    let mut b = AstBuilder::new();
    let value = b.int(23);
    let ret = b.return_stmt(Some(value));
    let ast = b.program(vec![ret]);
    assert_eq!(run_value(&ast), (NativeValue::Int(23), TypeTag::Integer));
}

#[test]
fn program_without_return_yields_null() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let stmt = b.expr_stmt(one);
    let ast = b.program(vec![stmt]);
    assert_eq!(run_value(&ast), (NativeValue::Null, TypeTag::Null));
}

#[test]
fn echo_coerces_and_writes_in_order() {
    let mut b = AstBuilder::new();
    let hello = b.string("hello ");
    let e1 = b.echo(hello);
    let seven = b.int(7);
    let e2 = b.echo(seven);
    let html = b.inline_html("<br>");
    let ast = b.program(vec![e1, e2, html]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "hello 7<br>");
}

#[test]
fn arithmetic_chains_left_to_right() {
    // 10 - 2 - 3 is (10 - 2) - 3.
    let mut b = AstBuilder::new();
    let ten = b.int(10);
    let two = b.int(2);
    let three = b.int(3);
    let diff = b.binary(ten, "-", two);
    let chain = b.binary(diff, "-", three);
    let ret = b.return_stmt(Some(chain));
    let ast = b.program(vec![ret]);
    assert_eq!(run_value(&ast), (NativeValue::Int(5), TypeTag::Integer));
}

#[test]
fn variables_assign_and_read() {
    let mut b = AstBuilder::new();
    let target = b.var("x");
    let five = b.int(5);
    let assign = b.assign(target, five);
    let s1 = b.expr_stmt(assign);
    let read = b.var("x");
    let one = b.int(1);
    let sum = b.binary(read, "+", one);
    let ret = b.return_stmt(Some(sum));
    let ast = b.program(vec![s1, ret]);
    assert_eq!(run_value(&ast), (NativeValue::Int(6), TypeTag::Integer));
}

#[test]
fn undefined_variable_read_reports_notice() {
    let mut b = AstBuilder::new();
    let read = b.var("missing");
    let e = b.echo(read);
    let ast = b.program(vec![e]);
    let (_, out, err) = run(&ast);
    assert_eq!(out, "");
    assert_eq!(err, "Notice: Undefined variable: missing\n");
}

#[test]
fn string_interpolation_concatenates_parts() {
    let mut b = AstBuilder::new();
    let target = b.var("n");
    let three = b.int(3);
    let assign = b.assign(target, three);
    let s1 = b.expr_stmt(assign);
    let lead = b.string("n=");
    let read = b.var("n");
    let interp = b.interp(vec![lead, read]);
    let e = b.echo(interp);
    let ast = b.program(vec![s1, e]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "n=3");
}

#[test]
fn if_else_selects_branch() {
    let mut b = AstBuilder::new();
    let cond = b.bool(false);
    let yes = b.string("yes");
    let yes_echo = b.echo(yes);
    let consequent = b.compound(vec![yes_echo]);
    let no = b.string("no");
    let no_echo = b.echo(no);
    let alternate = b.compound(vec![no_echo]);
    let stmt = b.if_stmt(cond, consequent, Some(alternate));
    let ast = b.program(vec![stmt]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "no");
}

#[test]
fn while_loop_counts() {
    // $i = 0; while ($i < 3) { echo $i; $i = $i + 1; }
    let mut b = AstBuilder::new();
    let i0 = b.var("i");
    let zero = b.int(0);
    let init = b.assign(i0, zero);
    let s1 = b.expr_stmt(init);

    let i1 = b.var("i");
    let three = b.int(3);
    let cond = b.binary(i1, "<", three);

    let i2 = b.var("i");
    let body_echo = b.echo(i2);
    let i3 = b.var("i");
    let i4 = b.var("i");
    let one = b.int(1);
    let next = b.binary(i4, "+", one);
    let bump = b.assign(i3, next);
    let body_bump = b.expr_stmt(bump);

    let stmt = b.while_stmt(cond, vec![body_echo, body_bump]);
    let ast = b.program(vec![s1, stmt]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "012");
}

#[test]
fn for_loop_runs_initializer_condition_update() {
    let mut b = AstBuilder::new();
    let i0 = b.var("i");
    let zero = b.int(0);
    let init = b.assign(i0, zero);
    let i1 = b.var("i");
    let limit = b.int(3);
    let cond = b.binary(i1, "<", limit);
    let i2 = b.var("i");
    let i3 = b.var("i");
    let one = b.int(1);
    let next = b.binary(i3, "+", one);
    let update = b.assign(i2, next);
    let i4 = b.var("i");
    let body_echo = b.echo(i4);
    let body = b.compound(vec![body_echo]);
    let stmt = b.for_stmt(Some(init), Some(cond), Some(update), body);
    let ast = b.program(vec![stmt]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "012");
}

#[test]
fn do_while_runs_body_at_least_once() {
    let mut b = AstBuilder::new();
    let x = b.string("x");
    let e = b.echo(x);
    let body = b.compound(vec![e]);
    let cond = b.bool(false);
    let stmt = b.do_while(body, cond);
    let ast = b.program(vec![stmt]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "x");
}

#[test]
fn functions_hoist_above_their_call_sites() {
    // A call that textually precedes the declaration still resolves.
    let mut b = AstBuilder::new();
    let call = b.call("shout", vec![]);
    let call_echo = b.echo(call);
    let hi = b.string("hi");
    let ret = b.return_stmt(Some(hi));
    let decl = b.function_decl("shout", &[], vec![ret]);
    let ast = b.program(vec![call_echo, decl]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "hi");
}

#[test]
fn function_arguments_bind_by_position() {
    let mut b = AstBuilder::new();
    let a = b.var("a");
    let bb = b.var("b");
    let sum = b.binary(a, "+", bb);
    let ret = b.return_stmt(Some(sum));
    let decl = b.function_decl("add", &["a", "b"], vec![ret]);
    let four = b.int(4);
    let two = b.int(2);
    let call = b.call("add", vec![four, two]);
    let ret2 = b.return_stmt(Some(call));
    let ast = b.program(vec![decl, ret2]);
    assert_eq!(run_value(&ast), (NativeValue::Int(6), TypeTag::Integer));
}

#[test]
fn missing_arguments_default_to_null() {
    let mut b = AstBuilder::new();
    let arg = b.var("x");
    let probe = b.isset(vec![arg]);
    let ret = b.return_stmt(Some(probe));
    let decl = b.function_decl("probe", &["x"], vec![ret]);
    let call = b.call("probe", vec![]);
    let ret2 = b.return_stmt(Some(call));
    let ast = b.program(vec![decl, ret2]);
    assert_eq!(run_value(&ast), (NativeValue::Bool(false), TypeTag::Boolean));
}

#[test]
fn call_to_undefined_function_is_fatal() {
    let mut b = AstBuilder::new();
    let call = b.call("nope", vec![]);
    let stmt = b.expr_stmt(call);
    let ast = b.program(vec![stmt]);
    let (result, _, err) = run(&ast);
    assert!(matches!(
        result,
        Err(EngineError::Fatal(FatalError::CallToUndefinedFunction { name })) if name == "nope"
    ));
    assert_eq!(err, "Fatal error: Call to undefined function nope()\n");
}

#[test]
fn closures_capture_by_value_and_by_reference() {
    use sable_engine::ast::BindingNode;

    // $n = 10; $f = function ($x) use (&$n) { $n = 99; return $x + $n; };
    // return $f(3) then observe $n.
    let mut b = AstBuilder::new();
    let n0 = b.var("n");
    let ten = b.int(10);
    let init = b.assign(n0, ten);
    let s1 = b.expr_stmt(init);

    let n1 = b.var("n");
    let nn = b.int(99);
    let set = b.assign(n1, nn);
    let set_stmt = b.expr_stmt(set);
    let x = b.var("x");
    let n2 = b.var("n");
    let sum = b.binary(x, "+", n2);
    let ret = b.return_stmt(Some(sum));
    let closure = b.closure(
        &["x"],
        vec![BindingNode {
            name: "n".to_owned(),
            by_reference: true,
        }],
        vec![set_stmt, ret],
    );
    let f = b.var("f");
    let bind = b.assign(f, closure);
    let s2 = b.expr_stmt(bind);

    let f2 = b.var("f");
    let three = b.int(3);
    let call = b.call_expr(f2, vec![three]);
    let r = b.var("r");
    let keep = b.assign(r, call);
    let s3 = b.expr_stmt(keep);

    // [$f(3) result, $n after the call]
    let r2 = b.var("r");
    let n3 = b.var("n");
    let pair = b.array(vec![r2, n3]);
    let ret2 = b.return_stmt(Some(pair));
    let ast = b.program(vec![s1, s2, s3, ret2]);

    let (value, tag) = run_value(&ast);
    assert_eq!(tag, TypeTag::Array);
    assert_eq!(
        value,
        NativeValue::Array(vec![
            (sable_engine::NativeKey::Int(0), NativeValue::Int(102)),
            (sable_engine::NativeKey::Int(1), NativeValue::Int(99)),
        ])
    );
}

#[test]
fn ternary_and_comma_yield_expected_values() {
    let mut b = AstBuilder::new();
    let cond = b.bool(true);
    let yes = b.int(1);
    let no = b.int(2);
    let pick = b.ternary(cond, yes, no);
    let extra = b.int(9);
    let both = b.comma(vec![extra, pick]);
    let ret = b.return_stmt(Some(both));
    let ast = b.program(vec![ret]);
    assert_eq!(run_value(&ast), (NativeValue::Int(1), TypeTag::Integer));
}

#[test]
fn print_writes_and_yields_one() {
    let mut b = AstBuilder::new();
    let text = b.string("out");
    let p = b.print(text);
    let ret = b.return_stmt(Some(p));
    let ast = b.program(vec![ret]);
    let (result, out, _) = run(&ast);
    assert_eq!(out, "out");
    assert_eq!(result.unwrap(), (NativeValue::Int(1), TypeTag::Integer));
}

#[test]
fn isset_probes_without_diagnostics() {
    let mut b = AstBuilder::new();
    let a0 = b.var("a");
    let one = b.int(1);
    let init = b.assign(a0, one);
    let s1 = b.expr_stmt(init);
    let a1 = b.var("a");
    let missing = b.var("missing");
    let probe = b.isset(vec![a1, missing]);
    let ret = b.return_stmt(Some(probe));
    let ast = b.program(vec![s1, ret]);
    let (result, _, err) = run(&ast);
    assert_eq!(result.unwrap(), (NativeValue::Bool(false), TypeTag::Boolean));
    assert_eq!(err, "", "isset must not surface notices");
}

#[test]
fn switch_falls_through_until_break() {
    let mut b = AstBuilder::new();
    let subject = b.int(2);
    let t1 = b.int(1);
    let one = b.string("one");
    let e1 = b.echo(one);
    let br1 = b.break_stmt(1);
    let c1 = b.case(t1, vec![e1, br1]);
    let t2 = b.int(2);
    let two = b.string("two");
    let e2 = b.echo(two);
    let c2 = b.case(t2, vec![e2]);
    let t3 = b.int(3);
    let three = b.string("three");
    let e3 = b.echo(three);
    let br3 = b.break_stmt(1);
    let c3 = b.case(t3, vec![e3, br3]);
    let none = b.string("none");
    let e4 = b.echo(none);
    let d = b.default_case(vec![e4]);
    let stmt = b.switch(subject, vec![c1, c2, c3, d]);
    let ast = b.program(vec![stmt]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "twothree");
}

#[test]
fn break_two_exits_nested_switches() {
    let mut b = AstBuilder::new();
    let inner_subject = b.int(2);
    let inner_test = b.int(2);
    let inner_text = b.string("inner");
    let inner_echo = b.echo(inner_text);
    let br = b.break_stmt(2);
    let inner_case = b.case(inner_test, vec![inner_echo, br]);
    let inner = b.switch(inner_subject, vec![inner_case]);

    let skipped = b.string("not");
    let skipped_echo = b.echo(skipped);
    let outer_test = b.int(1);
    let outer_case = b.case(outer_test, vec![inner, skipped_echo]);
    let outer_subject = b.int(1);
    let outer = b.switch(outer_subject, vec![outer_case]);
    let ast = b.program(vec![outer]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "inner");
}

#[test]
fn break_outside_switch_is_fatal() {
    let mut b = AstBuilder::new();
    let br = b.break_stmt(1);
    let ast = b.program(vec![br]);
    let (result, _, _) = run(&ast);
    assert!(matches!(
        result,
        Err(EngineError::Fatal(FatalError::BreakOutsideSwitch))
    ));
}

#[test]
fn variable_variables_resolve_through_names() {
    // $name = 'x'; $x = 7; return $$name;
    let mut b = AstBuilder::new();
    let name0 = b.var("name");
    let x_name = b.string("x");
    let s1e = b.assign(name0, x_name);
    let s1 = b.expr_stmt(s1e);
    let x0 = b.var("x");
    let seven = b.int(7);
    let s2e = b.assign(x0, seven);
    let s2 = b.expr_stmt(s2e);
    let name1 = b.var("name");
    let indirect = b.var_var(name1);
    let ret = b.return_stmt(Some(indirect));
    let ast = b.program(vec![s1, s2, ret]);
    assert_eq!(run_value(&ast), (NativeValue::Int(7), TypeTag::Integer));
}

#[test]
fn builtin_strlen_counts_bytes() {
    let mut b = AstBuilder::new();
    let text = b.string("four");
    let call = b.call("strlen", vec![text]);
    let ret = b.return_stmt(Some(call));
    let ast = b.program(vec![ret]);
    assert_eq!(run_value(&ast), (NativeValue::Int(4), TypeTag::Integer));
}

#[test]
fn builtin_var_dump_writes_structure() {
    let mut b = AstBuilder::new();
    let five = b.int(5);
    let call = b.call("var_dump", vec![five]);
    let stmt = b.expr_stmt(call);
    let ast = b.program(vec![stmt]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "int(5)\n");
}

#[test]
fn namespaced_function_resolves_by_qualified_path() {
    let mut b = AstBuilder::new();
    let hi = b.string("hi");
    let ret = b.return_stmt(Some(hi));
    let decl = b.function_decl("greet", &[], vec![ret]);
    let ns = b.namespace("App", vec![decl]);

    let path = b.namespaced_ref("\\App\\greet");
    let call = b.call_expr(path, vec![]);
    let ret2 = b.return_stmt(Some(call));
    let ast = b.program(vec![ns, ret2]);
    assert_eq!(
        run_value(&ast),
        (NativeValue::Str("hi".to_owned()), TypeTag::String)
    );
}

#[test]
fn use_alias_rewrites_first_segment() {
    use sable_engine::ast::UseClause;

    let mut b = AstBuilder::new();
    let hi = b.string("aliased");
    let ret = b.return_stmt(Some(hi));
    let decl = b.function_decl("greet", &[], vec![ret]);
    let ns = b.namespace("Vendor\\Lib", vec![decl]);

    let use_stmt = b.use_stmt(vec![UseClause {
        path: "Vendor\\Lib".to_owned(),
        alias: Some("L".to_owned()),
    }]);
    let path = b.namespaced_ref("L\\greet");
    let call = b.call_expr(path, vec![]);
    let ret2 = b.return_stmt(Some(call));
    let ast = b.program(vec![ns, use_stmt, ret2]);
    assert_eq!(
        run_value(&ast),
        (NativeValue::Str("aliased".to_owned()), TypeTag::String)
    );
}

#[test]
fn post_and_pre_increment_differ_in_yield() {
    let mut b = AstBuilder::new();
    let i0 = b.var("i");
    let five = b.int(5);
    let init = b.assign(i0, five);
    let s1 = b.expr_stmt(init);
    let i1 = b.var("i");
    let post = b.unary("++", i1, false);
    let post_echo = b.echo(post);
    let i2 = b.var("i");
    let pre = b.unary("++", i2, true);
    let pre_echo = b.echo(pre);
    let ast = b.program(vec![s1, post_echo, pre_echo]);
    let (_, out, _) = run(&ast);
    assert_eq!(out, "57");
}
