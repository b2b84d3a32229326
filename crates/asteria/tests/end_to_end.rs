//! End-to-end scenarios exercising the full pipeline (lexer through
//! interpreter) via the embedding surface, one test per scenario.

use asteria::{Runner, Value};

fn run(code: &str) -> Value {
    let mut runner: Runner = Runner::default();
    runner.reload_string("test", code).unwrap();
    runner.execute(Vec::new()).unwrap().read().unwrap()
}

fn run_err(code: &str) -> String {
    let mut runner: Runner = Runner::default();
    runner.reload_string("test", code).unwrap();
    format!("{}", runner.execute(Vec::new()).unwrap_err())
}

#[test]
fn factorial_and_return() {
    let result = run("func fact(n) { return n <= 1 ? 1 : n * fact(n-1); } return fact(10);");
    assert!(matches!(result, Value::Integer(3628800)));
}

#[test]
fn try_catch_rethrow_from_deferred_supersedes_original() {
    let result = run(r#"try { defer throw "dtor"; throw "orig"; } catch(e) { return e; }"#);
    match result {
        Value::String(s) => assert_eq!(&*s, b"dtor"),
        other => panic!("expected string \"dtor\", got {other:?}"),
    }
}

#[test]
fn proper_tail_call_chain_reaches_one_million_without_overflow() {
    let result = run("func f(n) { return n == 0 ? \"done\" : f(n-1); } return f(1000000);");
    match result {
        Value::String(s) => assert_eq!(&*s, b"done"),
        other => panic!("expected string \"done\", got {other:?}"),
    }
}

#[test]
fn structured_binding_pads_missing_elements_with_null() {
    let result = run("var [a, b, c] = [1, 2]; return [a, b, c];");
    let Value::Array(arr) = result else { panic!("expected array, got {result:?}") };
    assert!(arr[0].equals(&Value::Integer(1)));
    assert!(arr[1].equals(&Value::Integer(2)));
    assert!(arr[2].is_null());
}

#[test]
fn for_each_over_object_sees_mutations() {
    let result = run("var o = { x: 1, y: 2 }; var s = 0; for each (k, v : o) { s += v; } return s;");
    assert!(matches!(result, Value::Integer(3)));
}

#[test]
fn switch_fallthrough_concatenates_through_matching_and_following_clauses() {
    let result = run(
        r#"var r = "";
        switch (2) {
          case 1: var z = "a"; r += z;
          case 2: r += "b";
          case 3: r += "c"; break;
          default: r += "d";
        }
        return r;"#,
    );
    match result {
        Value::String(s) => assert_eq!(&*s, b"bc"),
        other => panic!("expected string \"bc\", got {other:?}"),
    }
}

#[test]
fn switch_bypassed_variable_read_throws() {
    let message = run_err(
        r#"var r = "";
        switch (2) {
          case 1: var z = "a"; r += z;
          case 2: r += z;
          case 3: r += "c"; break;
          default: r += "d";
        }
        return r;"#,
    );
    assert!(message.contains("bypass"), "expected a bypassed-variable error, got: {message}");
}

#[test]
fn execute_binds_host_arguments_under_varg() {
    let mut runner: Runner = Runner::default();
    runner.reload_string("test", "return __varg[0] + __varg[1];").unwrap();
    let result = runner.execute(vec![Value::Integer(10), Value::Integer(32)]).unwrap().read().unwrap();
    assert!(matches!(result, Value::Integer(42)));
}
