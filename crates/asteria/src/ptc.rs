//! Proper tail calls (§4.9): instead of recursing on the Rust call stack, a
//! call in tail position is packaged as `PtcArguments` and handed back to a
//! trampoline loop (`interpreter::call::run_trampoline`) that keeps
//! replacing the current frame until a call finally returns a value
//! outright. This is what lets `func loop(n) { if (n == 0) return 0; return
//! loop(n - 1); }` run in constant Rust stack space.

use std::rc::Rc;

use crate::function::Function;
use crate::opcode::PtcAware;
use crate::reference::Reference;
use crate::sloc::SourceLocation;

/// A call site's PTC-awareness together with the arguments already
/// evaluated for it, deferred rather than dispatched immediately.
pub struct PtcArguments {
    pub target: Rc<Function>,
    /// The receiver recovered from the tail call's own callee reference
    /// (§4.9), carried alongside the deferred call so a native target
    /// invoked at the bottom of the trampoline still sees it.
    pub self_ref: Reference,
    pub args: Vec<Reference>,
    pub aware: PtcAware,
    pub sloc: SourceLocation,
}

impl PtcArguments {
    pub fn new(target: Rc<Function>, self_ref: Reference, args: Vec<Reference>, aware: PtcAware, sloc: SourceLocation) -> Self {
        Self { target, self_ref, args, aware, sloc }
    }
}

/// What one trampoline step produced.
pub enum CallOutcome {
    /// The call returned a concrete result.
    Done(Reference),
    /// The call ended in another tail position; keep trampolining.
    Tail(PtcArguments),
}
