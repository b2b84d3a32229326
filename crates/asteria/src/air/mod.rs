//! AIR: the Abstract Interpretive Representation (§3.5), a lowered tree
//! produced from the AST by [`codegen`] and simplified in place by
//! [`optimizer`] before being handed to [`crate::avmc`] for solidification.
//!
//! Every node still carries nested `Vec<AirNode>` bodies rather than flat
//! jump offsets — the same shape the AVMC queue keeps — because Rust's enum
//! dispatch through `match` already compiles to a dense jump table; unlike
//! the original implementation this representation has no need to flatten
//! into a byte-addressed instruction stream to get cache-friendly dispatch.

pub mod analytic_context;
pub mod codegen;
pub mod optimizer;

use std::sync::Arc;

use crate::opcode::{AirStatus, Xop};
use crate::reference::Reference;
use crate::sloc::SourceLocation;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchClause {
    /// `None` marks the `default:` clause.
    pub label: Option<Vec<AirNode>>,
    pub body: Vec<AirNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnMode {
    Void,
    ByValue,
    ByRef,
}

/// One lowered operation (§3.5). Variants map closely onto
/// `StatementKind`/`ExpressionUnitKind`, but statement sequences are
/// collapsed into bodies here rather than remaining a separate AST layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AirNode {
    /// Discards every reference pushed since the start of the statement
    /// (§4.3: each top-level statement clears the stack before the next).
    ClearStack,
    /// Runs `body` in a fresh child scope.
    ExecuteBlock(Vec<AirNode>),
    DeclareVariable { sloc: SourceLocation, name: Arc<str>, immutable: bool },
    /// Pops the top reference, reads it, and initializes the most recently
    /// declared variable with the resulting value.
    InitializeVariable { sloc: SourceLocation, immutable: bool },
    /// Declares and initializes a variable to `null` in one step (used for
    /// declarators with no initializer expression).
    DefineNullVariable { sloc: SourceLocation, name: Arc<str>, immutable: bool },
    /// `ref` group declarator: binds `name` to the variable underlying the
    /// next reference on the stack, without copying its value.
    DeclareReference { sloc: SourceLocation, name: Arc<str> },
    /// Pops a reference and binds it to the most recently declared `ref`.
    InitializeReference { sloc: SourceLocation },
    UnpackStructArray { sloc: SourceLocation, names: Vec<Arc<str>>, immutable: bool },
    UnpackStructObject { sloc: SourceLocation, names: Vec<Arc<str>>, immutable: bool },
    IfStmt { negative: bool, cond: Vec<AirNode>, true_branch: Vec<AirNode>, false_branch: Vec<AirNode> },
    SwitchStmt { ctrl: Vec<AirNode>, clauses: Vec<SwitchClause> },
    DoWhileStmt { body: Vec<AirNode>, negative: bool, cond: Vec<AirNode> },
    WhileStmt { negative: bool, cond: Vec<AirNode>, body: Vec<AirNode> },
    ForEachStmt { key_name: Arc<str>, mapped_name: Arc<str>, range: Vec<AirNode>, body: Vec<AirNode> },
    ForStmt { init: Vec<AirNode>, cond: Vec<AirNode>, step: Vec<AirNode>, body: Vec<AirNode> },
    TryStmt { try_body: Vec<AirNode>, sloc_catch: SourceLocation, except_name: Arc<str>, catch_body: Vec<AirNode> },
    Throw { sloc: SourceLocation, expr: Vec<AirNode> },
    /// A pre-resolved non-local control transfer (`break`/`continue`).
    SimpleStatus(AirStatus),
    ReturnStmt { sloc: SourceLocation, mode: ReturnMode, expr: Vec<AirNode> },
    Assert { sloc: SourceLocation, expr: Vec<AirNode>, message: Option<Arc<str>> },
    /// Fails unless the top reference is non-void; used at the head of a
    /// parameter's first use to reject an omitted variadic/PTC argument.
    CheckArgument { sloc: SourceLocation },
    DeferExpression { sloc: SourceLocation, expr: Vec<AirNode> },
    SingleStepTrap(SourceLocation),

    PushGlobalReference { sloc: SourceLocation, name: Arc<str> },
    PushLocalReference { sloc: SourceLocation, name: Arc<str> },
    /// A precomputed reference substituted in by the optimizer's rebind
    /// pass (§4.4) for a provably constant sub-expression.
    PushBoundReference(Reference),
    /// Pushes a plain constant value (emitted directly by codegen for
    /// literals, and also by the optimizer when it folds a pure
    /// sub-expression down to one value).
    PushTemporary(Value),
    /// `body` is `Rc`-shared rather than inline so that re-evaluating a
    /// `func` expression inside a loop (producing a fresh closure value
    /// each time) only bumps a refcount instead of cloning the whole
    /// lowered body.
    DefineFunction { sloc: SourceLocation, name: Arc<str>, params: Vec<Arc<str>>, variadic: bool, body: std::rc::Rc<[AirNode]> },
    BranchExpression { assign: bool, true_branch: Vec<AirNode>, false_branch: Vec<AirNode> },
    Coalescence { assign: bool, null_branch: Vec<AirNode> },
    /// Pops the top reference off the main operand stack and moves it onto
    /// the interpreter's argument-marshalling stack, copying it to a
    /// detached value first unless `by_ref`.
    FinishArgument { sloc: SourceLocation, by_ref: bool },
    FunctionCall { sloc: SourceLocation, nargs: u32 },
    VariadicCall { sloc: SourceLocation },
    ImportCall { sloc: SourceLocation, nargs: u32 },
    MemberAccess { sloc: SourceLocation, name: Arc<str> },
    PushUnnamedArray { sloc: SourceLocation, nelems: u32 },
    PushUnnamedObject { sloc: SourceLocation, keys: Vec<Arc<str>> },
    ApplyOperator { sloc: SourceLocation, xop: Xop, assign: bool },
    CatchExpression { sloc: SourceLocation, body: Vec<AirNode> },
}
