//! Statement/ExpressionUnit tree produced by the parser (§3.3, §3.4, §2
//! phase 2).

mod expr;
mod statement;

pub use expr::{ExpressionUnit, ExpressionUnitKind, LiteralValue};
pub use statement::{Declarator, Statement, StatementKind, VariableDecl};

use crate::sloc::SourceLocation;

/// A parsed expression: an RPN sequence of expression units (§3.3).
pub type Expression = Vec<ExpressionUnit>;

/// Generic helper bundling a node with its defining location; used where an
/// AST node's own `sloc` would otherwise need to be duplicated into a
/// wrapper just to satisfy a `Vec<(SourceLocation, T)>` shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    pub sloc: SourceLocation,
    pub node: T,
}
