//! Lowering from the parsed `Statement`/`ExpressionUnit` tree into AIR
//! (§4.3). Every expression already evaluates to a reference left on the
//! operand stack; nodes that need a plain value (`InitializeVariable`,
//! arithmetic operators) dereference it themselves at execution time, so
//! codegen never has to distinguish "value context" from "reference
//! context" the way a statically typed lowering pass would.

use std::sync::Arc;

use crate::air::analytic_context::AnalyticContext;
use crate::air::{AirNode, ReturnMode, SwitchClause};
use crate::ast::{Declarator, Expression, ExpressionUnitKind, LiteralValue, Statement, StatementKind};
use crate::value::Value;

pub fn codegen_program(stmts: &[Statement]) -> Vec<AirNode> {
    let mut global = AnalyticContext::new_global();
    codegen_statements(stmts, &mut global)
}

pub fn codegen_statements(stmts: &[Statement], ctx: &mut AnalyticContext<'_>) -> Vec<AirNode> {
    stmts.iter().flat_map(|s| codegen_statement(s, ctx)).collect()
}

fn codegen_scoped(stmts: &[Statement], parent: &AnalyticContext<'_>, is_function_boundary: bool) -> Vec<AirNode> {
    let mut child = AnalyticContext::new_child(parent, is_function_boundary);
    codegen_statements(stmts, &mut child)
}

fn codegen_statement(stmt: &Statement, ctx: &mut AnalyticContext<'_>) -> Vec<AirNode> {
    let sloc = stmt.sloc;
    match &stmt.kind {
        StatementKind::Expression(expr) => {
            let mut out = codegen_expression(expr, ctx);
            out.push(AirNode::ClearStack);
            out
        }
        StatementKind::Block(body) => vec![AirNode::ExecuteBlock(codegen_scoped(body, ctx, false))],
        StatementKind::VariableGroup { immutable, decls } => {
            let mut out = Vec::new();
            for decl in decls {
                codegen_variable_decl(decl, *immutable, ctx, &mut out);
            }
            out
        }
        StatementKind::FunctionDecl { name, params, variadic, body } => {
            ctx.declare(Arc::clone(name));
            let mut child = AnalyticContext::new_child(ctx, true);
            for p in params {
                child.declare(Arc::clone(p));
            }
            let body_air = codegen_statements(body, &mut child);
            vec![
                AirNode::DeclareVariable { sloc, name: Arc::clone(name), immutable: true },
                AirNode::DefineFunction {
                    sloc,
                    name: Arc::clone(name),
                    params: params.clone(),
                    variadic: *variadic,
                    body: std::rc::Rc::from(body_air),
                },
                AirNode::InitializeVariable { sloc, immutable: true },
            ]
        }
        StatementKind::If { cond, true_body, false_body } => vec![AirNode::IfStmt {
            negative: false,
            cond: codegen_expression(cond, ctx),
            true_branch: codegen_scoped(true_body, ctx, false),
            false_branch: codegen_scoped(false_body, ctx, false),
        }],
        StatementKind::Switch { ctrl, labels, bodies } => {
            let clauses = labels
                .iter()
                .zip(bodies.iter())
                .map(|(label, body)| SwitchClause {
                    label: label.as_ref().map(|e| codegen_expression(e, ctx)),
                    body: codegen_scoped(body, ctx, false),
                })
                .collect();
            vec![AirNode::SwitchStmt { ctrl: codegen_expression(ctrl, ctx), clauses }]
        }
        StatementKind::DoWhile { body, negative, cond } => vec![AirNode::DoWhileStmt {
            body: codegen_scoped(body, ctx, false),
            negative: *negative,
            cond: codegen_expression(cond, ctx),
        }],
        StatementKind::While { negative, cond, body } => vec![AirNode::WhileStmt {
            negative: *negative,
            cond: codegen_expression(cond, ctx),
            body: codegen_scoped(body, ctx, false),
        }],
        StatementKind::ForEach { key_name, mapped_name, range, body } => {
            let range_air = codegen_expression(range, ctx);
            let mut child = AnalyticContext::new_child(ctx, false);
            child.declare(Arc::clone(key_name));
            child.declare(Arc::clone(mapped_name));
            vec![AirNode::ForEachStmt {
                key_name: Arc::clone(key_name),
                mapped_name: Arc::clone(mapped_name),
                range: range_air,
                body: codegen_statements(body, &mut child),
            }]
        }
        StatementKind::For { init, cond, step, body } => {
            let mut child = AnalyticContext::new_child(ctx, false);
            let init_air = codegen_statements(init, &mut child);
            let cond_air = cond.as_ref().map(|e| codegen_expression(e, &child)).unwrap_or_default();
            let step_air = step.as_ref().map(|e| codegen_expression(e, &child)).unwrap_or_default();
            let body_air = codegen_statements(body, &mut child);
            vec![AirNode::ForStmt { init: init_air, cond: cond_air, step: step_air, body: body_air }]
        }
        StatementKind::TryCatch { try_body, sloc_catch, except_name, catch_body } => {
            let try_air = codegen_scoped(try_body, ctx, false);
            let mut catch_ctx = AnalyticContext::new_child(ctx, false);
            catch_ctx.declare(Arc::clone(except_name));
            let catch_air = codegen_statements(catch_body, &mut catch_ctx);
            vec![AirNode::TryStmt {
                try_body: try_air,
                sloc_catch: *sloc_catch,
                except_name: Arc::clone(except_name),
                catch_body: catch_air,
            }]
        }
        StatementKind::Break(kind) => vec![AirNode::SimpleStatus(crate::opcode::AirStatus::break_for(*kind))],
        StatementKind::Continue(kind) => vec![AirNode::SimpleStatus(crate::opcode::AirStatus::continue_for(*kind))],
        StatementKind::Throw(expr) => vec![AirNode::Throw { sloc, expr: codegen_expression(expr, ctx) }],
        StatementKind::Return { by_ref, expr } => {
            let mode = match (expr, by_ref) {
                (None, _) => ReturnMode::Void,
                (Some(_), true) => ReturnMode::ByRef,
                (Some(_), false) => ReturnMode::ByValue,
            };
            let expr_air = expr.as_ref().map(|e| codegen_expression(e, ctx)).unwrap_or_default();
            vec![AirNode::ReturnStmt { sloc, mode, expr: expr_air }]
        }
        StatementKind::Assert { expr, message } => {
            vec![AirNode::Assert { sloc, expr: codegen_expression(expr, ctx), message: message.clone() }]
        }
        StatementKind::Defer(expr) => vec![AirNode::DeferExpression { sloc, expr: codegen_expression(expr, ctx) }],
        StatementKind::ReferenceGroup { name, init } => {
            ctx.declare(Arc::clone(name));
            let mut out = vec![AirNode::DeclareReference { sloc, name: Arc::clone(name) }];
            out.extend(codegen_expression(init, ctx));
            out.push(AirNode::InitializeReference { sloc });
            out
        }
    }
}

fn codegen_variable_decl(
    decl: &crate::ast::VariableDecl,
    immutable: bool,
    ctx: &mut AnalyticContext<'_>,
    out: &mut Vec<AirNode>,
) {
    let sloc = decl.sloc;
    match &decl.declarator {
        Declarator::Single(name) => {
            ctx.declare(Arc::clone(name));
            match &decl.init {
                Some(init) => {
                    out.push(AirNode::DeclareVariable { sloc, name: Arc::clone(name), immutable });
                    out.extend(codegen_expression(init, ctx));
                    out.push(AirNode::InitializeVariable { sloc, immutable });
                }
                None => out.push(AirNode::DefineNullVariable { sloc, name: Arc::clone(name), immutable }),
            }
        }
        Declarator::Array(names) => {
            for n in names {
                ctx.declare(Arc::clone(n));
            }
            if let Some(init) = &decl.init {
                out.extend(codegen_expression(init, ctx));
            }
            out.push(AirNode::UnpackStructArray { sloc, names: names.clone(), immutable });
        }
        Declarator::Object(names) => {
            for n in names {
                ctx.declare(Arc::clone(n));
            }
            if let Some(init) = &decl.init {
                out.extend(codegen_expression(init, ctx));
            }
            out.push(AirNode::UnpackStructObject { sloc, names: names.clone(), immutable });
        }
    }
}

pub fn codegen_expression(expr: &Expression, ctx: &AnalyticContext<'_>) -> Vec<AirNode> {
    expr.iter().map(|unit| codegen_unit(unit, ctx)).collect()
}

fn literal_value(lit: &LiteralValue) -> Value {
    match lit {
        LiteralValue::Null => Value::Null,
        LiteralValue::Boolean(b) => Value::Boolean(*b),
        LiteralValue::Integer(i) => Value::Integer(*i),
        LiteralValue::Real(r) => Value::Real(*r),
        LiteralValue::String(s) => Value::String(std::rc::Rc::from(s.as_bytes())),
    }
}

fn codegen_unit(unit: &crate::ast::ExpressionUnit, ctx: &AnalyticContext<'_>) -> AirNode {
    let sloc = unit.sloc;
    match &unit.kind {
        ExpressionUnitKind::Literal(lit) => AirNode::PushTemporary(literal_value(lit)),
        ExpressionUnitKind::LocalReference(name) => AirNode::PushLocalReference { sloc, name: Arc::clone(name) },
        ExpressionUnitKind::GlobalReference(name) => AirNode::PushGlobalReference { sloc, name: Arc::clone(name) },
        ExpressionUnitKind::Closure { params, variadic, body, name } => {
            let mut child = AnalyticContext::new_child(ctx, true);
            for p in params {
                child.declare(Arc::clone(p));
            }
            AirNode::DefineFunction {
                sloc,
                name: Arc::clone(name),
                params: params.clone(),
                variadic: *variadic,
                body: std::rc::Rc::from(codegen_statements(body, &mut child)),
            }
        }
        ExpressionUnitKind::Branch { assign, true_branch, false_branch } => AirNode::BranchExpression {
            assign: *assign,
            true_branch: codegen_expression(true_branch, ctx),
            false_branch: codegen_expression(false_branch, ctx),
        },
        ExpressionUnitKind::FunctionCall { nargs } => AirNode::FunctionCall { sloc, nargs: *nargs },
        ExpressionUnitKind::MemberAccess { name } => AirNode::MemberAccess { sloc, name: Arc::clone(name) },
        ExpressionUnitKind::Operator { xop, assign } => AirNode::ApplyOperator { sloc, xop: *xop, assign: *assign },
        ExpressionUnitKind::UnnamedArray { nelems } => AirNode::PushUnnamedArray { sloc, nelems: *nelems },
        ExpressionUnitKind::UnnamedObject { keys } => AirNode::PushUnnamedObject { sloc, keys: keys.clone() },
        ExpressionUnitKind::Coalescence { assign, null_branch } => {
            AirNode::Coalescence { assign: *assign, null_branch: codegen_expression(null_branch, ctx) }
        }
        ExpressionUnitKind::VariadicCall => AirNode::VariadicCall { sloc },
        ExpressionUnitKind::ArgumentFinish { by_ref } => AirNode::FinishArgument { sloc, by_ref: *by_ref },
        ExpressionUnitKind::ImportCall { nargs } => AirNode::ImportCall { sloc, nargs: *nargs },
        ExpressionUnitKind::Catch { body } => {
            AirNode::CatchExpression { sloc, body: codegen_expression(body, ctx) }
        }
    }
}
