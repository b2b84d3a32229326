//! Fuzz target: tokenize and parse arbitrary source (no execution).
//!
//! This target exercises only the lexer, the recursive-descent parser, and
//! AIR/AVMC solidification, skipping execution entirely. It runs much faster
//! than `fuzz_parse_run` and is effective for finding panics in the
//! hand-rolled precedence-climbing expression parser and the AIR lowering
//! passes.
//!
//! A crash here indicates a bug in parse/compile — these should never panic
//! regardless of input, only return errors.

#![no_main]

use libfuzzer_sys::fuzz_target;

use asteria::CompilerOptions;
use asteria::runner::compile_source;

fuzz_target!(|data: &[u8]| {
    let Ok(code) = std::str::from_utf8(data) else {
        return;
    };

    // Skip excessively large inputs.
    if code.len() > 8192 {
        return;
    }

    // Attempt to compile. We don't care about the result — only that it
    // doesn't panic.
    let _ = compile_source("fuzz", 1, code, &CompilerOptions::default());
});
