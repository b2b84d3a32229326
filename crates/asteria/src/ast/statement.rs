//! Statements (§3.4).

use std::sync::Arc;

use crate::ast::Expression;
use crate::opcode::LoopKind;
use crate::sloc::SourceLocation;

/// The left-hand side of a `var`/`const`/`ref` declaration: a single name,
/// or a bracketed/braced structured-binding list (§3.4, §4.3 "Structured
/// bindings").
#[derive(Debug, Clone, PartialEq)]
pub enum Declarator {
    Single(Arc<str>),
    Array(Vec<Arc<str>>),
    Object(Vec<Arc<str>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub sloc: SourceLocation,
    pub declarator: Declarator,
    pub init: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sloc: SourceLocation,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Expression(Expression),
    Block(Vec<Statement>),
    VariableGroup {
        immutable: bool,
        decls: Vec<VariableDecl>,
    },
    FunctionDecl {
        name: Arc<str>,
        params: Vec<Arc<str>>,
        variadic: bool,
        body: Vec<Statement>,
    },
    If {
        cond: Expression,
        true_body: Vec<Statement>,
        false_body: Vec<Statement>,
    },
    Switch {
        ctrl: Expression,
        /// One entry per clause; `None` marks the `default:` clause.
        labels: Vec<Option<Expression>>,
        bodies: Vec<Vec<Statement>>,
    },
    DoWhile {
        body: Vec<Statement>,
        negative: bool,
        cond: Expression,
    },
    While {
        negative: bool,
        cond: Expression,
        body: Vec<Statement>,
    },
    ForEach {
        key_name: Arc<str>,
        mapped_name: Arc<str>,
        range: Expression,
        body: Vec<Statement>,
    },
    For {
        init: Vec<Statement>,
        cond: Option<Expression>,
        step: Option<Expression>,
        body: Vec<Statement>,
    },
    TryCatch {
        try_body: Vec<Statement>,
        sloc_catch: SourceLocation,
        except_name: Arc<str>,
        catch_body: Vec<Statement>,
    },
    Break(LoopKind),
    Continue(LoopKind),
    Throw(Expression),
    Return {
        by_ref: bool,
        expr: Option<Expression>,
    },
    Assert {
        expr: Expression,
        message: Option<Arc<str>>,
    },
    Defer(Expression),
    ReferenceGroup {
        name: Arc<str>,
        init: Expression,
    },
}

impl Statement {
    pub fn new(sloc: SourceLocation, kind: StatementKind) -> Self {
        Self { sloc, kind }
    }
}
