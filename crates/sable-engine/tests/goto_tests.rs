//! Goto and label resolution through the block assembler.

use std::cell::RefCell;
use std::rc::Rc;

use sable_engine::ast::{Ast, AstBuilder};
use sable_engine::{BufferSink, Engine, EngineError, FatalError};

fn run(ast: &Ast) -> (Result<(), EngineError>, String, String) {
    let stdout = Rc::new(RefCell::new(BufferSink::new()));
    let stderr = Rc::new(RefCell::new(BufferSink::new()));
    let mut engine = Engine::default();
    engine.set_stdout(stdout.clone());
    engine.set_stderr(stderr.clone());
    let result = engine.run(ast).map(|_| ());
    let out = stdout.borrow().contents().to_owned();
    let err = stderr.borrow().contents().to_owned();
    (result, out, err)
}

#[test]
fn forward_goto_skips_everything_up_to_its_label() {
    // echo 'a'; goto end; echo 'skipped'; end: echo 'b';
    let mut b = AstBuilder::new();
    let a = b.string("a");
    let e1 = b.echo(a);
    let jump = b.goto("end");
    let skipped = b.string("skipped");
    let e2 = b.echo(skipped);
    let label = b.label("end");
    let bb = b.string("b");
    let e3 = b.echo(bb);
    let ast = b.program(vec![e1, jump, e2, label, e3]);
    let (result, out, _) = run(&ast);
    assert!(result.is_ok());
    assert_eq!(out, "ab");
}

#[test]
fn backward_goto_reruns_the_labelled_region() {
    // $i = 0; start: $i = $i + 1; echo 'x'; if ($i < 2) { goto start; } echo 'done';
    let mut b = AstBuilder::new();
    let i0 = b.var("i");
    let zero = b.int(0);
    let init = b.assign(i0, zero);
    let s1 = b.expr_stmt(init);
    let label = b.label("start");
    let i1 = b.var("i");
    let i2 = b.var("i");
    let one = b.int(1);
    let next = b.binary(i2, "+", one);
    let bump = b.assign(i1, next);
    let s2 = b.expr_stmt(bump);
    let x = b.string("x");
    let e1 = b.echo(x);
    let i3 = b.var("i");
    let two = b.int(2);
    let cond = b.binary(i3, "<", two);
    let jump = b.goto("start");
    let consequent = b.compound(vec![jump]);
    let guard = b.if_stmt(cond, consequent, None);
    let done = b.string("done");
    let e2 = b.echo(done);
    let ast = b.program(vec![s1, label, s2, e1, guard, e2]);
    let (result, out, _) = run(&ast);
    assert!(result.is_ok());
    assert_eq!(out, "xxdone");
}

#[test]
fn forward_goto_past_an_unrelated_label_still_lands() {
    // echo 'a'; goto finish; mid: echo 'skip'; finish: echo 'end';
    let mut b = AstBuilder::new();
    let a = b.string("a");
    let e1 = b.echo(a);
    let jump = b.goto("finish");
    let mid = b.label("mid");
    let skip = b.string("skip");
    let e2 = b.echo(skip);
    let finish = b.label("finish");
    let end = b.string("end");
    let e3 = b.echo(end);
    let ast = b.program(vec![e1, jump, mid, e2, finish, e3]);
    let (result, out, _) = run(&ast);
    assert!(result.is_ok());
    assert_eq!(out, "aend");
}

#[test]
fn interleaved_forward_and_backward_gotos_resolve() {
    // echo 'a'; goto mid; back: echo 'b'; goto finish;
    // mid: echo 'c'; goto back; finish: echo 'd';
    let mut b = AstBuilder::new();
    let a = b.string("a");
    let e1 = b.echo(a);
    let j1 = b.goto("mid");
    let back = b.label("back");
    let bb = b.string("b");
    let e2 = b.echo(bb);
    let j2 = b.goto("finish");
    let mid = b.label("mid");
    let c = b.string("c");
    let e3 = b.echo(c);
    let j3 = b.goto("back");
    let finish = b.label("finish");
    let d = b.string("d");
    let e4 = b.echo(d);
    let ast = b.program(vec![e1, j1, back, e2, j2, mid, e3, j3, finish, e4]);
    let (result, out, _) = run(&ast);
    assert!(result.is_ok());
    assert_eq!(out, "acbd");
}

#[test]
fn goto_enters_an_if_consequent_without_evaluating_its_condition() {
    // goto inside; if (false) { inside: echo 'in'; } echo 'after';
    let mut b = AstBuilder::new();
    let jump = b.goto("inside");
    let cond = b.bool(false);
    let label = b.label("inside");
    let inner = b.string("in");
    let e1 = b.echo(inner);
    let consequent = b.compound(vec![label, e1]);
    let stmt = b.if_stmt(cond, consequent, None);
    let after = b.string("after");
    let e2 = b.echo(after);
    let ast = b.program(vec![jump, stmt, e2]);
    let (result, out, _) = run(&ast);
    assert!(result.is_ok());
    assert_eq!(out, "inafter");
}

#[test]
fn goto_out_of_an_if_reaches_a_sibling_label() {
    // if (true) { goto after; } echo 'skipped'; after: echo 'done';
    let mut b = AstBuilder::new();
    let cond = b.bool(true);
    let jump = b.goto("after");
    let consequent = b.compound(vec![jump]);
    let stmt = b.if_stmt(cond, consequent, None);
    let skipped = b.string("skipped");
    let e1 = b.echo(skipped);
    let label = b.label("after");
    let done = b.string("done");
    let e2 = b.echo(done);
    let ast = b.program(vec![stmt, e1, label, e2]);
    let (result, out, _) = run(&ast);
    assert!(result.is_ok());
    assert_eq!(out, "done");
}

#[test]
fn goto_to_undefined_label_is_fatal() {
    let mut b = AstBuilder::new();
    let jump = b.goto("nowhere");
    let ast = b.program(vec![jump]);
    let (result, out, err) = run(&ast);
    assert!(matches!(
        result,
        Err(EngineError::Fatal(FatalError::UndefinedLabel { label })) if label == "nowhere"
    ));
    assert_eq!(out, "");
    assert_eq!(err, "Fatal error: 'goto' to undefined label 'nowhere'\n");
}

#[test]
fn goto_into_a_while_body_is_rejected() {
    // goto trap; while (true) { trap: echo 'x'; }
    let mut b = AstBuilder::new();
    let jump = b.goto("trap");
    let cond = b.bool(true);
    let label = b.label("trap");
    let x = b.string("x");
    let e = b.echo(x);
    let stmt = b.while_stmt(cond, vec![label, e]);
    let ast = b.program(vec![jump, stmt]);
    let (result, _, _) = run(&ast);
    assert!(matches!(
        result,
        Err(EngineError::Fatal(FatalError::GotoDisallowed))
    ));
}

#[test]
fn labels_do_not_leak_across_function_boundaries() {
    // function f() { goto missing; } — the label exists only outside f.
    let mut b = AstBuilder::new();
    let jump = b.goto("missing");
    let decl = b.function_decl("f", &[], vec![jump]);
    let label = b.label("missing");
    let call = b.call("f", vec![]);
    let stmt = b.expr_stmt(call);
    let ast = b.program(vec![decl, label, stmt]);
    let (result, _, _) = run(&ast);
    assert!(matches!(
        result,
        Err(EngineError::Fatal(FatalError::UndefinedLabel { label })) if label == "missing"
    ));
}

#[test]
fn goto_inside_a_function_body_resolves_locally() {
    // function f() { goto out; echo 'skipped'; out: echo 'f'; } f();
    let mut b = AstBuilder::new();
    let jump = b.goto("out");
    let skipped = b.string("skipped");
    let e1 = b.echo(skipped);
    let label = b.label("out");
    let text = b.string("f");
    let e2 = b.echo(text);
    let decl = b.function_decl("f", &[], vec![jump, e1, label, e2]);
    let call = b.call("f", vec![]);
    let stmt = b.expr_stmt(call);
    let ast = b.program(vec![decl, stmt]);
    let (result, out, _) = run(&ast);
    assert!(result.is_ok());
    assert_eq!(out, "f");
}
