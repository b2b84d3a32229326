// Use codspeed-criterion-compat when running on CodSpeed (CI), real criterion otherwise (for flamegraphs)
#[cfg(codspeed)]
use codspeed_criterion_compat::{Bencher, Criterion, black_box, criterion_group, criterion_main};
#[cfg(not(codspeed))]
use criterion::{Bencher, Criterion, black_box, criterion_group, criterion_main};

use asteria::Runner;
use asteria::value::Value;

/// Runs a benchmark through the solidified AVMC queue via `Runner::execute`.
///
/// Each benchmark body is written to avoid the kind of constant folding the
/// AIR optimizer's rebind pass (§4.4) could otherwise short-circuit, so the
/// measured time reflects runtime operator dispatch rather than a single
/// `PushTemporary` of a pre-computed result.
fn run_asteria(bench: &mut Bencher, code: &str, expected: i64) {
    let mut runner: Runner = Runner::default();
    runner.reload_string("bench", code).unwrap();

    let r = runner.execute(Vec::new()).unwrap();
    assert!(matches!(r.read().unwrap(), Value::Integer(n) if n == expected));

    bench.iter(|| {
        let r = runner.execute(Vec::new()).unwrap();
        let Value::Integer(n) = r.read().unwrap() else {
            panic!("expected integer result");
        };
        black_box(n);
    });
}

/// Two locals added at runtime.
///
/// This shape requires statement execution (two `var` declarations) before
/// producing the final expression, rather than letting a constant-folding
/// pass fold the whole body down to one `PushTemporary`.
const ADD_TWO_LOCALS: &str = "
var x = 1;
var y = 2;
return x + y;
";

/// Tight arithmetic loop over local ints, exercising repeated integer
/// addition, the `for` AIR node, and compound assignment (`+=`).
const ADD_TWO_LOOP_1000: &str = "
var x = 1;
var y = 2;
var total = 0;
for (var i = 0; i < 1000; ++i) {
  total += x + y;
}
return total;
";

/// Deep non-tail recursion through the interpreter's call/return path,
/// exercising `interpreter::call` without engaging the PTC trampoline
/// (the recursive call is not in tail position).
const FIBONACCI_NON_TAIL: &str = "
func fib(n) {
  return n < 2 ? n : fib(n - 1) + fib(n - 2);
}
return fib(20);
";

/// Deep proper-tail-call recursion, exercising the PTC trampoline
/// (§4.9/§4.10) instead of growing the Rust call stack.
const TAIL_COUNTDOWN: &str = "
func countdown(n, acc) {
  return n == 0 ? acc : countdown(n - 1, acc + 1);
}
return countdown(10000, 0);
";

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("add_two_locals", |b| run_asteria(b, ADD_TWO_LOCALS, 3));
    c.bench_function("add_two_loop_1000", |b| run_asteria(b, ADD_TWO_LOOP_1000, 3000));
    c.bench_function("fibonacci_non_tail_20", |b| run_asteria(b, FIBONACCI_NON_TAIL, 6765));
    c.bench_function("tail_countdown_10000", |b| run_asteria(b, TAIL_COUNTDOWN, 10000));
}

// Use pprof flamegraph profiler when running locally (not on CodSpeed)
#[cfg(not(codspeed))]
criterion_group!(benches, criterion_benchmark);

// Use default config when running on CodSpeed
#[cfg(codspeed)]
criterion_group!(benches, criterion_benchmark);

criterion_main!(benches);
