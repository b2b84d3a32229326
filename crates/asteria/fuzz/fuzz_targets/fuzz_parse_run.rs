//! Fuzz target: parse and execute arbitrary source.
//!
//! This target exercises the full pipeline — lexing, parsing, AIR/AVMC
//! solidification, and interpretation — with a tight recursion ceiling to
//! prevent the fuzzer from triggering legitimate resource exhaustion (which
//! is handled gracefully, not a bug).
//!
//! Findings from this target indicate real safety issues: panics, stack
//! overflows, infinite loops that evade the recursion sentry, or PTC
//! trampoline bugs that let a deep call chain grow the Rust stack.

#![no_main]

use libfuzzer_sys::fuzz_target;

use asteria::Runner;

fuzz_target!(|data: &[u8]| {
    // Only fuzz valid UTF-8 — source is always text.
    let Ok(code) = std::str::from_utf8(data) else {
        return;
    };

    // Skip excessively large inputs — they slow the fuzzer without finding
    // interesting bugs. Most parser/runtime bugs reproduce with small inputs.
    // The interpreter's own recursion sentry (§4.6/§5) bounds non-tail
    // recursion; tail calls run through the PTC trampoline and don't grow it.
    if code.len() > 4096 {
        return;
    }

    let mut runner: Runner = Runner::default();
    if runner.reload_string("fuzz", code).is_err() {
        return;
    }

    // Discard the result — we only care that execution doesn't panic.
    let _ = runner.execute(Vec::new());
});
