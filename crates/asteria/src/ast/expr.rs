//! Expression units (§3.3): the RPN atoms that make up a parsed expression.

use std::sync::Arc;

use crate::ast::{Expression, Statement};
use crate::opcode::Xop;
use crate::sloc::SourceLocation;

/// A literal scalar value as written in source; arrays/objects are built at
/// runtime by `UnnamedArray`/`UnnamedObject` instead of being literals here.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(Arc<str>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionUnit {
    pub sloc: SourceLocation,
    pub kind: ExpressionUnitKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionUnitKind {
    Literal(LiteralValue),
    LocalReference(Arc<str>),
    GlobalReference(Arc<str>),
    Closure {
        params: Vec<Arc<str>>,
        variadic: bool,
        body: Vec<Statement>,
        /// Synthetic name such as `<closure at file:line>` used in backtraces.
        name: Arc<str>,
    },
    /// Ternary (`?:`) or conditional-assign (`?=`) branch.
    Branch {
        assign: bool,
        true_branch: Expression,
        false_branch: Expression,
    },
    FunctionCall {
        nargs: u32,
    },
    MemberAccess {
        name: Arc<str>,
    },
    /// An operator in RPN form, consuming its operands off the evaluation
    /// stack left-to-right.
    Operator {
        xop: Xop,
        assign: bool,
    },
    UnnamedArray {
        nelems: u32,
    },
    UnnamedObject {
        keys: Vec<Arc<str>>,
    },
    /// `??` / `??=`: evaluates `null_branch` only if the preceding value is
    /// `null`.
    Coalescence {
        assign: bool,
        null_branch: Expression,
    },
    VariadicCall,
    /// Marks that the preceding sub-expression has produced one complete
    /// call argument; `by_ref` records whether it was passed by reference.
    ArgumentFinish {
        by_ref: bool,
    },
    ImportCall {
        nargs: u32,
    },
    /// `catch (expr)`: evaluates `body`, materializing any thrown exception
    /// value as the result instead of propagating it.
    Catch {
        body: Expression,
    },
}

impl ExpressionUnit {
    pub fn new(sloc: SourceLocation, kind: ExpressionUnitKind) -> Self {
        Self { sloc, kind }
    }
}
