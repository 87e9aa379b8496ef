//! Suspend, recompile, and replay around deferred host calls.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use sable_engine::ast::{Ast, AstBuilder};
use sable_engine::{
    deferment, BridgeValue, BufferSink, Engine, EngineError, FatalError, HostFault, HostObject,
    NativeValue, TypeTag,
};

/// A host object whose `get` method always defers, settling each call
/// with its first argument (or 23 when called without arguments) before
/// the engine starts waiting. `fail` defers and rejects. `drop` defers
/// and abandons the deferment. `now` answers synchronously.
#[derive(Default)]
struct TestHost {
    calls: Cell<u32>,
}

impl HostObject for TestHost {
    fn call_method(&self, method: &str, args: Vec<NativeValue>) -> Result<BridgeValue, HostFault> {
        self.calls.set(self.calls.get() + 1);
        match method {
            "get" => {
                let value = match args.into_iter().next() {
                    Some(value) => value,
                    None => NativeValue::Int(23),
                };
                let (deferment, handle) = deferment();
                deferment.resolve(value);
                Ok(BridgeValue::Deferred(handle))
            }
            "fail" => {
                let (deferment, handle) = deferment();
                deferment.reject(HostFault::new("backend unavailable"));
                Ok(BridgeValue::Deferred(handle))
            }
            "drop" => {
                let (_deferment, handle) = deferment();
                Ok(BridgeValue::Deferred(handle))
            }
            "now" => Ok(BridgeValue::Ready(NativeValue::Int(5))),
            other => Err(HostFault::new(format!("no such method: {other}"))),
        }
    }
}

fn engine_with(host: Rc<TestHost>) -> (Engine, Rc<RefCell<BufferSink>>, Rc<RefCell<BufferSink>>) {
    let stdout = Rc::new(RefCell::new(BufferSink::new()));
    let stderr = Rc::new(RefCell::new(BufferSink::new()));
    let mut engine = Engine::default();
    engine.set_stdout(stdout.clone());
    engine.set_stderr(stderr.clone());
    engine.expose("host", host);
    (engine, stdout, stderr)
}

fn run_with_host(ast: &Ast) -> (Result<(NativeValue, TypeTag), EngineError>, String, u32) {
    let host = Rc::new(TestHost::default());
    let (engine, stdout, _) = engine_with(host.clone());
    let result = engine.run(ast);
    let out = stdout.borrow().contents().to_owned();
    (result, out, host.calls.get())
}

#[test]
fn synchronous_host_call_answers_inline() {
    let mut b = AstBuilder::new();
    let host = b.var("host");
    let call = b.method_call(host, "now", vec![]);
    let ret = b.return_stmt(Some(call));
    let ast = b.program(vec![ret]);
    let (result, _, calls) = run_with_host(&ast);
    assert_eq!(result.unwrap(), (NativeValue::Int(5), TypeTag::Integer));
    assert_eq!(calls, 1);
}

#[test]
fn deferred_call_result_becomes_the_terminal_value() {
    // return $host->get();
    let mut b = AstBuilder::new();
    let host = b.var("host");
    let call = b.method_call(host, "get", vec![]);
    let ret = b.return_stmt(Some(call));
    let ast = b.program(vec![ret]);
    let (result, _, calls) = run_with_host(&ast);
    assert_eq!(result.unwrap(), (NativeValue::Int(23), TypeTag::Integer));
    // The resume pass substitutes the settled value; the bridged method
    // itself runs exactly once.
    assert_eq!(calls, 1);
}

#[test]
fn deferred_result_feeds_the_enclosing_expression() {
    // return 7 + $host->get();
    let mut b = AstBuilder::new();
    let seven = b.int(7);
    let host = b.var("host");
    let call = b.method_call(host, "get", vec![]);
    let sum = b.binary(seven, "+", call);
    let ret = b.return_stmt(Some(sum));
    let ast = b.program(vec![ret]);
    let (result, _, calls) = run_with_host(&ast);
    assert_eq!(result.unwrap(), (NativeValue::Int(30), TypeTag::Integer));
    assert_eq!(calls, 1);
}

#[test]
fn statements_before_the_suspension_point_do_not_replay() {
    // echo 'go'; return 4 + $host->get(2);
    let mut b = AstBuilder::new();
    let go = b.string("go");
    let e = b.echo(go);
    let four = b.int(4);
    let host = b.var("host");
    let two = b.int(2);
    let call = b.method_call(host, "get", vec![two]);
    let sum = b.binary(four, "+", call);
    let ret = b.return_stmt(Some(sum));
    let ast = b.program(vec![e, ret]);
    let (result, out, calls) = run_with_host(&ast);
    assert_eq!(result.unwrap(), (NativeValue::Int(6), TypeTag::Integer));
    assert_eq!(out, "go", "top-level output before the suspension runs once");
    assert_eq!(calls, 1);
}

#[test]
fn suspension_inside_a_user_function_resumes_through_its_call() {
    // function fetch($n, $h) { return $n + $h->get(2); } return fetch(4, $host);
    // Function scopes cannot see globals, so the host object travels in
    // as an argument; object arguments share their handle.
    let mut b = AstBuilder::new();
    let n = b.var("n");
    let h = b.var("h");
    let two = b.int(2);
    let call = b.method_call(h, "get", vec![two]);
    let sum = b.binary(n, "+", call);
    let ret = b.return_stmt(Some(sum));
    let decl = b.function_decl("fetch", &["n", "h"], vec![ret]);
    let four = b.int(4);
    let host = b.var("host");
    let outer = b.call("fetch", vec![four, host]);
    let ret2 = b.return_stmt(Some(outer));
    let ast = b.program(vec![decl, ret2]);
    let (result, _, calls) = run_with_host(&ast);
    assert_eq!(result.unwrap(), (NativeValue::Int(6), TypeTag::Integer));
    assert_eq!(calls, 1);
}

#[test]
fn side_effects_inside_the_replayed_call_run_again() {
    // The function is re-entered from its top on the resume pass, so output
    // produced before the bridged call is emitted once per pass.
    let mut b = AstBuilder::new();
    let x = b.string("x");
    let e = b.echo(x);
    let h = b.var("h");
    let call = b.method_call(h, "get", vec![]);
    let ret = b.return_stmt(Some(call));
    let decl = b.function_decl("fetch", &["h"], vec![e, ret]);
    let host = b.var("host");
    let outer = b.call("fetch", vec![host]);
    let ret2 = b.return_stmt(Some(outer));
    let ast = b.program(vec![decl, ret2]);
    let (result, out, calls) = run_with_host(&ast);
    assert_eq!(result.unwrap(), (NativeValue::Int(23), TypeTag::Integer));
    assert_eq!(out, "xx", "the enclosing call replays from its start");
    assert_eq!(calls, 1);
}

#[test]
fn a_second_suspension_restarts_past_completed_statements() {
    // $a = $host->get(1); $b = $host->get(10); return $a + $b;
    //
    // Each pass starts from fresh state and jumps straight to the
    // suspended statement, so the assignment completed in an earlier
    // pass is gone by the time the final pass runs: $a reads as null.
    let mut b = AstBuilder::new();
    let a0 = b.var("a");
    let h1 = b.var("host");
    let one = b.int(1);
    let c1 = b.method_call(h1, "get", vec![one]);
    let w1 = b.assign(a0, c1);
    let s1 = b.expr_stmt(w1);
    let b0 = b.var("b");
    let h2 = b.var("host");
    let ten = b.int(10);
    let c2 = b.method_call(h2, "get", vec![ten]);
    let w2 = b.assign(b0, c2);
    let s2 = b.expr_stmt(w2);
    let a1 = b.var("a");
    let b1 = b.var("b");
    let sum = b.binary(a1, "+", b1);
    let ret = b.return_stmt(Some(sum));
    let ast = b.program(vec![s1, s2, ret]);

    let host = Rc::new(TestHost::default());
    let (engine, _, stderr) = engine_with(host.clone());
    let result = engine.run(&ast);
    assert_eq!(result.unwrap(), (NativeValue::Int(10), TypeTag::Integer));
    assert_eq!(host.calls.get(), 2, "each bridged site defers exactly once");
    assert_eq!(stderr.borrow().contents(), "Notice: Undefined variable: a\n");
}

#[test]
fn host_fault_from_settlement_surfaces_unchanged() {
    let mut b = AstBuilder::new();
    let host = b.var("host");
    let call = b.method_call(host, "fail", vec![]);
    let ret = b.return_stmt(Some(call));
    let ast = b.program(vec![ret]);
    let (result, _, _) = run_with_host(&ast);
    assert!(matches!(
        result,
        Err(EngineError::Host(fault)) if fault.message == "backend unavailable"
    ));
}

#[test]
fn host_fault_raised_synchronously_surfaces_unchanged() {
    let mut b = AstBuilder::new();
    let host = b.var("host");
    let call = b.method_call(host, "bogus", vec![]);
    let ret = b.return_stmt(Some(call));
    let ast = b.program(vec![ret]);
    let (result, _, _) = run_with_host(&ast);
    assert!(matches!(
        result,
        Err(EngineError::Host(fault)) if fault.message == "no such method: bogus"
    ));
}

#[test]
fn abandoned_deferment_is_reported_distinctly() {
    let mut b = AstBuilder::new();
    let host = b.var("host");
    let call = b.method_call(host, "drop", vec![]);
    let ret = b.return_stmt(Some(call));
    let ast = b.program(vec![ret]);
    let (result, _, _) = run_with_host(&ast);
    assert!(matches!(result, Err(EngineError::DefermentAbandoned)));
}

#[test]
fn settlement_from_another_thread_is_received() {
    struct SlowHost;
    impl HostObject for SlowHost {
        fn call_method(
            &self,
            _method: &str,
            _args: Vec<NativeValue>,
        ) -> Result<BridgeValue, HostFault> {
            let (deferment, handle) = deferment();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(10));
                deferment.resolve(NativeValue::Str("late".to_owned()));
            });
            Ok(BridgeValue::Deferred(handle))
        }
    }

    let mut b = AstBuilder::new();
    let host = b.var("host");
    let call = b.method_call(host, "get", vec![]);
    let ret = b.return_stmt(Some(call));
    let ast = b.program(vec![ret]);

    let mut engine = Engine::default();
    engine.expose("host", Rc::new(SlowHost));
    assert_eq!(
        engine.run(&ast).unwrap(),
        (NativeValue::Str("late".to_owned()), TypeTag::String)
    );
}

#[test]
fn infinite_loop_exhausts_the_run_budget() {
    let mut b = AstBuilder::new();
    let cond = b.bool(true);
    let stmt = b.while_stmt(cond, vec![]);
    let ast = b.program(vec![stmt]);

    let stderr = Rc::new(RefCell::new(BufferSink::new()));
    let mut engine = Engine::default();
    engine.set_stderr(stderr.clone());
    engine.set_time_limit(0);
    let result = engine.run(&ast);
    assert!(matches!(
        result,
        Err(EngineError::Fatal(FatalError::MaxExecutionTimeExceeded { seconds: 0 }))
    ));
    assert_eq!(
        stderr.borrow().contents(),
        "Fatal error: Maximum execution time of 0 seconds exceeded\n"
    );
}

#[test]
fn resume_passes_share_the_original_deadline() {
    // A deferment that never settles inside the budget reports the timer,
    // not abandonment, once the budget is spent.
    struct NeverHost;
    impl HostObject for NeverHost {
        fn call_method(
            &self,
            _method: &str,
            _args: Vec<NativeValue>,
        ) -> Result<BridgeValue, HostFault> {
            let (deferment, handle) = deferment();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(100));
                deferment.resolve(NativeValue::Null);
            });
            Ok(BridgeValue::Deferred(handle))
        }
    }

    let mut b = AstBuilder::new();
    let host = b.var("host");
    let call = b.method_call(host, "get", vec![]);
    let ret = b.return_stmt(Some(call));
    let ast = b.program(vec![ret]);

    let mut engine = Engine::default();
    engine.expose("host", Rc::new(NeverHost));
    engine.set_time_limit(0);
    let result = engine.run(&ast);
    assert!(matches!(
        result,
        Err(EngineError::Fatal(FatalError::MaxExecutionTimeExceeded { seconds: 0 }))
    ));
}
