//! Two independent, composable optimization passes over an AIR tree
//! (§4.4, §4.5), run after codegen and before solidification.
//!
//! - [`rebind`] constant-folds pure scalar sub-expressions into a single
//!   `PushBoundReference`, so a loop body that computes `1 + 2` doesn't
//!   re-add two integers on every iteration.
//! - [`compress`] inlines child blocks that introduce no new bindings,
//!   since their only reason to exist is as a scope boundary.

use crate::air::AirNode;
use crate::compiler_options::CompilerOptions;
use crate::opcode::Xop;
use crate::reference::Reference;
use crate::value::Value;

pub fn optimize(nodes: Vec<AirNode>, opts: &CompilerOptions) -> Vec<AirNode> {
    let nodes = if opts.should_rebind() { rebind(nodes) } else { nodes };
    if opts.should_compress() { compress(nodes) } else { nodes }
}

/// Inlines `ExecuteBlock` bodies that declare no names of their own.
pub fn compress(nodes: Vec<AirNode>) -> Vec<AirNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let node = compress_node(node);
        match node {
            AirNode::ExecuteBlock(body) if !contains_declaration(&body) => out.extend(body),
            other => out.push(other),
        }
    }
    out
}

fn contains_declaration(nodes: &[AirNode]) -> bool {
    nodes.iter().any(|n| {
        matches!(
            n,
            AirNode::DeclareVariable { .. }
                | AirNode::DefineNullVariable { .. }
                | AirNode::DeclareReference { .. }
                | AirNode::UnpackStructArray { .. }
                | AirNode::UnpackStructObject { .. }
        )
    })
}

fn compress_node(node: AirNode) -> AirNode {
    match node {
        AirNode::ExecuteBlock(body) => AirNode::ExecuteBlock(compress(body)),
        AirNode::IfStmt { negative, cond, true_branch, false_branch } => AirNode::IfStmt {
            negative,
            cond: compress(cond),
            true_branch: compress(true_branch),
            false_branch: compress(false_branch),
        },
        AirNode::SwitchStmt { ctrl, clauses } => AirNode::SwitchStmt {
            ctrl: compress(ctrl),
            clauses: clauses
                .into_iter()
                .map(|c| crate::air::SwitchClause { label: c.label.map(compress), body: compress(c.body) })
                .collect(),
        },
        AirNode::DoWhileStmt { body, negative, cond } => {
            AirNode::DoWhileStmt { body: compress(body), negative, cond: compress(cond) }
        }
        AirNode::WhileStmt { negative, cond, body } => {
            AirNode::WhileStmt { negative, cond: compress(cond), body: compress(body) }
        }
        AirNode::ForEachStmt { key_name, mapped_name, range, body } => {
            AirNode::ForEachStmt { key_name, mapped_name, range: compress(range), body: compress(body) }
        }
        AirNode::ForStmt { init, cond, step, body } => {
            AirNode::ForStmt { init: compress(init), cond: compress(cond), step: compress(step), body: compress(body) }
        }
        AirNode::TryStmt { try_body, sloc_catch, except_name, catch_body } => AirNode::TryStmt {
            try_body: compress(try_body),
            sloc_catch,
            except_name,
            catch_body: compress(catch_body),
        },
        AirNode::DefineFunction { sloc, name, params, variadic, body } => {
            AirNode::DefineFunction { sloc, name, params, variadic, body: std::rc::Rc::from(compress(body.to_vec())) }
        }
        AirNode::BranchExpression { assign, true_branch, false_branch } => {
            AirNode::BranchExpression { assign, true_branch: compress(true_branch), false_branch: compress(false_branch) }
        }
        AirNode::Coalescence { assign, null_branch } => AirNode::Coalescence { assign, null_branch: compress(null_branch) },
        AirNode::CatchExpression { sloc, body } => AirNode::CatchExpression { sloc, body: compress(body) },
        AirNode::Throw { sloc, expr } => AirNode::Throw { sloc, expr: compress(expr) },
        AirNode::ReturnStmt { sloc, mode, expr } => AirNode::ReturnStmt { sloc, mode, expr: compress(expr) },
        AirNode::Assert { sloc, expr, message } => AirNode::Assert { sloc, expr: compress(expr), message },
        AirNode::DeferExpression { sloc, expr } => AirNode::DeferExpression { sloc, expr: compress(expr) },
        other => other,
    }
}

/// Best-effort constant folding: a run of `PushTemporary`s immediately
/// consumed by a side-effect-free `ApplyOperator` collapses into one
/// `PushBoundReference`. Falls through to leaving nodes untouched if the
/// operator isn't one this pass knows how to evaluate at compile time, or
/// if folding it would raise an error (that error must be raised at
/// runtime, at the original source location, not swallowed here).
pub fn rebind(nodes: Vec<AirNode>) -> Vec<AirNode> {
    let nodes: Vec<AirNode> = nodes.into_iter().map(rebind_nested).collect();
    let mut out: Vec<AirNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let AirNode::ApplyOperator { xop, assign: false, .. } = &node {
            let arity = xop.arity();
            if out.len() >= arity && out[out.len() - arity..].iter().all(|n| matches!(n, AirNode::PushTemporary(_))) {
                let operands: Vec<Value> = out
                    .split_off(out.len() - arity)
                    .into_iter()
                    .map(|n| match n {
                        AirNode::PushTemporary(v) => v,
                        _ => unreachable!(),
                    })
                    .collect();
                if let Some(folded) = const_eval(*xop, &operands) {
                    out.push(AirNode::PushBoundReference(Reference::from_constant(folded)));
                    continue;
                }
                out.extend(operands.into_iter().map(AirNode::PushTemporary));
            }
        }
        out.push(node);
    }
    out
}

fn rebind_nested(node: AirNode) -> AirNode {
    match node {
        AirNode::ExecuteBlock(body) => AirNode::ExecuteBlock(rebind(body)),
        AirNode::IfStmt { negative, cond, true_branch, false_branch } => {
            AirNode::IfStmt { negative, cond: rebind(cond), true_branch: rebind(true_branch), false_branch: rebind(false_branch) }
        }
        AirNode::SwitchStmt { ctrl, clauses } => AirNode::SwitchStmt {
            ctrl: rebind(ctrl),
            clauses: clauses
                .into_iter()
                .map(|c| crate::air::SwitchClause { label: c.label.map(rebind), body: rebind(c.body) })
                .collect(),
        },
        AirNode::DoWhileStmt { body, negative, cond } => AirNode::DoWhileStmt { body: rebind(body), negative, cond: rebind(cond) },
        AirNode::WhileStmt { negative, cond, body } => AirNode::WhileStmt { negative, cond: rebind(cond), body: rebind(body) },
        AirNode::ForEachStmt { key_name, mapped_name, range, body } => {
            AirNode::ForEachStmt { key_name, mapped_name, range: rebind(range), body: rebind(body) }
        }
        AirNode::ForStmt { init, cond, step, body } => {
            AirNode::ForStmt { init: rebind(init), cond: rebind(cond), step: rebind(step), body: rebind(body) }
        }
        AirNode::TryStmt { try_body, sloc_catch, except_name, catch_body } => {
            AirNode::TryStmt { try_body: rebind(try_body), sloc_catch, except_name, catch_body: rebind(catch_body) }
        }
        AirNode::DefineFunction { sloc, name, params, variadic, body } => {
            AirNode::DefineFunction { sloc, name, params, variadic, body: std::rc::Rc::from(rebind(body.to_vec())) }
        }
        AirNode::BranchExpression { assign, true_branch, false_branch } => {
            AirNode::BranchExpression { assign, true_branch: rebind(true_branch), false_branch: rebind(false_branch) }
        }
        AirNode::Coalescence { assign, null_branch } => AirNode::Coalescence { assign, null_branch: rebind(null_branch) },
        AirNode::CatchExpression { sloc, body } => AirNode::CatchExpression { sloc, body: rebind(body) },
        AirNode::Throw { sloc, expr } => AirNode::Throw { sloc, expr: rebind(expr) },
        AirNode::ReturnStmt { sloc, mode, expr } => AirNode::ReturnStmt { sloc, mode, expr: rebind(expr) },
        AirNode::Assert { sloc, expr, message } => AirNode::Assert { sloc, expr: rebind(expr), message },
        AirNode::DeferExpression { sloc, expr } => AirNode::DeferExpression { sloc, expr: rebind(expr) },
        other => other,
    }
}

fn const_eval(xop: Xop, operands: &[Value]) -> Option<Value> {
    use Value::*;
    match (xop, operands) {
        (Xop::Add, [Integer(a), Integer(b)]) => a.checked_add(*b).map(Integer),
        (Xop::Sub, [Integer(a), Integer(b)]) => a.checked_sub(*b).map(Integer),
        (Xop::Mul, [Integer(a), Integer(b)]) => a.checked_mul(*b).map(Integer),
        (Xop::Add, [Real(a), Real(b)]) => Some(Real(a + b)),
        (Xop::Sub, [Real(a), Real(b)]) => Some(Real(a - b)),
        (Xop::Mul, [Real(a), Real(b)]) => Some(Real(a * b)),
        (Xop::Neg, [Integer(a)]) => a.checked_neg().map(Integer),
        (Xop::Neg, [Real(a)]) => Some(Real(-a)),
        (Xop::Pos, [Integer(a)]) => Some(Integer(*a)),
        (Xop::Pos, [Real(a)]) => Some(Real(*a)),
        (Xop::NotL, [v]) => Some(Boolean(!v.is_truthy())),
        _ => None,
    }
}
