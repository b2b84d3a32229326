//! Execution hooks (§6.5): a trait-based tracing seam at key interpreter
//! events, with every method defaulted to a no-op so that `NoopHooks`
//! compiles away entirely via monomorphization — the interpreter is
//! generic over `H: Hooks`, not boxed, so there's nothing left to call in
//! the hot path when hooks aren't wanted.

use std::collections::HashMap;

use crate::sloc::SourceLocation;

/// Hook points an embedder can observe without altering execution (§6.5).
/// All methods return `()`; hooks cannot veto or rewrite what happens, only
/// watch it.
pub trait Hooks: std::fmt::Debug {
    /// Fired once per AVMC node when `CompilerOptions::single_step_trap` is
    /// set, before the node executes.
    #[inline(always)]
    fn on_single_step(&mut self, _sloc: SourceLocation) {}

    /// Fired when a function call (script or native) is about to begin.
    #[inline(always)]
    fn on_function_call(&mut self, _name: &str, _sloc: SourceLocation, _depth: usize) {}

    /// Fired after a function call returns normally.
    #[inline(always)]
    fn on_function_return(&mut self, _name: &str, _depth: usize) {}

    /// Fired when a proper tail call replaces the current frame instead of
    /// pushing a new one (§4.9).
    #[inline(always)]
    fn on_proper_tail_call(&mut self, _name: &str, _depth: usize) {}

    /// Fired when a variable is declared (before it is initialized).
    #[inline(always)]
    fn on_variable_declare(&mut self, _name: &str, _sloc: SourceLocation) {}

    /// Fired when a `RuntimeException` starts unwinding through a frame.
    #[inline(always)]
    fn on_exception_unwind(&mut self, _sloc: SourceLocation, _depth: usize) {}
}

/// Zero-cost hooks for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl Hooks for NoopHooks {}

/// Prints a line to stderr for every event; useful for interactively
/// debugging a script's control flow.
#[derive(Debug, Default)]
pub struct StderrHooks {
    limit: Option<usize>,
    count: usize,
}

impl StderrHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit), count: 0 }
    }

    fn tick(&mut self) -> bool {
        if self.limit.is_some_and(|l| self.count >= l) {
            return false;
        }
        self.count += 1;
        true
    }
}

impl Hooks for StderrHooks {
    fn on_single_step(&mut self, sloc: SourceLocation) {
        if self.tick() {
            eprintln!("[step] {sloc}");
        }
    }

    fn on_function_call(&mut self, name: &str, sloc: SourceLocation, depth: usize) {
        if self.tick() {
            eprintln!("  >>> call {name} at {sloc} (depth={depth})");
        }
    }

    fn on_function_return(&mut self, name: &str, depth: usize) {
        if self.tick() {
            eprintln!("  <<< return {name} (depth={depth})");
        }
    }

    fn on_proper_tail_call(&mut self, name: &str, depth: usize) {
        if self.tick() {
            eprintln!("  ==> tail call {name} (depth={depth})");
        }
    }

    fn on_variable_declare(&mut self, name: &str, sloc: SourceLocation) {
        if self.tick() {
            eprintln!("  let {name} at {sloc}");
        }
    }

    fn on_exception_unwind(&mut self, sloc: SourceLocation, depth: usize) {
        if self.tick() {
            eprintln!("  !!! unwind at {sloc} (depth={depth})");
        }
    }
}

/// Collects call-count statistics, grouped by function name.
#[derive(Debug, Default)]
pub struct ProfilingHooks {
    calls: HashMap<String, u64>,
    max_depth: usize,
}

impl ProfilingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self.calls.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl Hooks for ProfilingHooks {
    fn on_function_call(&mut self, name: &str, _sloc: SourceLocation, depth: usize) {
        *self.calls.entry(name.to_string()).or_insert(0) += 1;
        self.max_depth = self.max_depth.max(depth);
    }
}
