//! AVMC: the solidified instruction queue (§4.5) handed to the interpreter.
//!
//! The original implementation packs each node into a `{fn_ptr, uparam,
//! sparam}` header so the execution loop dispatches through a raw function
//! pointer for cache-friendly, branch-predictor-friendly execution. Rust's
//! `match` over an enum already compiles to the same dense jump table a
//! hand-rolled fn-ptr dispatch would buy, so "solidifying" here means
//! something narrower and still faithful to the phase's purpose: the
//! finished, optimizer-passed [`AirNode`] tree is frozen behind a cheaply
//! cloneable `Rc<[AirNode]>` so one compiled function body can be shared by
//! every closure instance created from it without re-lowering or deep
//! cloning, exactly as a function's bytecode is shared by all of its
//! closures in the original design.

use std::rc::Rc;

use crate::air::AirNode;
use crate::air::{codegen::codegen_program, optimizer::optimize};
use crate::ast::Statement;
use crate::compiler_options::CompilerOptions;

/// An immutable, shareable, fully lowered function or top-level body.
#[derive(Clone)]
pub struct AvmcQueue {
    nodes: Rc<[AirNode]>,
}

impl AvmcQueue {
    pub fn solidify(nodes: Vec<AirNode>) -> Self {
        Self { nodes: Rc::from(nodes) }
    }

    /// Wraps an already-shared node slice (e.g. a `DefineFunction` node's
    /// `body`) without cloning it.
    pub fn from_shared(nodes: Rc<[AirNode]>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[AirNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Runs codegen and the optimizer, then solidifies the result. The single
/// entry point used by both script-loading (`runner.rs`) and nested
/// function-body compilation during codegen's own lowering of `func`
/// expressions (those are solidified separately, once embedded inside
/// `AirNode::DefineFunction`, the first time the closure value is built).
pub fn compile(stmts: &[Statement], opts: &CompilerOptions) -> AvmcQueue {
    let air = codegen_program(stmts);
    let air = optimize(air, opts);
    AvmcQueue::solidify(air)
}
