//! Recursive-descent parser: tokens → `Statement`/`ExpressionUnit` tree
//! (§4.2). Produces one `Statement` per statement and RPN `ExpressionUnit`
//! sequences per expression, with the operator following its operands.
//!
//! Expression precedence is handled by a standard precedence-climbing loop
//! rather than an explicit operator stack: each call parses one operand,
//! then loops consuming infix operators whose precedence clears the
//! caller's floor, recursing for the right-hand side. Because every step
//! appends directly to the shared output vector, the "collapse the stack by
//! precedence" behavior falls out of the recursion for free; the resulting
//! `Vec<ExpressionUnit>` is indistinguishable from one built by explicitly
//! popping an operator stack.

use std::sync::Arc;

use crate::ast::{
    Declarator, Expression, ExpressionUnit, ExpressionUnitKind, LiteralValue, Statement,
    StatementKind, VariableDecl,
};
use crate::compiler_options::CompilerOptions;
use crate::lexer::TokenStream;
use crate::opcode::{LoopKind, Xop};
use crate::parser_error::{ParserError, ParserResult, ParserStatus};
use crate::resource::{RecursionSentry, DEFAULT_MAX_PARSER_DEPTH};
use crate::sloc::SourceLocation;
use crate::token::{Keyword, Punctuator, Token, TokenKind};

/// Parses a full token stream into a sequence of top-level statements.
///
/// `opts` governs lexing (already applied by the caller's `TokenStream`) and
/// later AIR generation; pure syntax parsing doesn't consult any of its
/// fields, so it is accepted here only to keep the phase's entry point
/// symmetric with the rest of the pipeline.
pub fn parse_document(stream: TokenStream, _opts: &CompilerOptions) -> ParserResult<Vec<Statement>> {
    Parser::new(stream).parse_document()
}

struct Parser {
    stream: TokenStream,
    sentry: RecursionSentry,
    /// Location of the most recently consumed token, used when an error
    /// needs a location but the stream is already at EOF.
    last_sloc: SourceLocation,
}

/// Binding power of an infix operator: how tightly it binds on the left and
/// the floor its right-hand operand must clear (equal for left-assoc,
/// one less than the left power for right-assoc).
#[derive(Clone, Copy)]
struct InfixOp {
    left_bp: u8,
    right_bp: u8,
    kind: InfixKind,
}

#[derive(Clone, Copy)]
enum InfixKind {
    Plain(Xop),
    PlainAssign(Xop),
    Assign,
    LogicalAnd { assign: bool },
    LogicalOr { assign: bool },
    Coalesce { assign: bool },
}

impl Parser {
    fn new(stream: TokenStream) -> Self {
        Self {
            stream,
            sentry: RecursionSentry::new(DEFAULT_MAX_PARSER_DEPTH),
            last_sloc: SourceLocation::synthetic("[start of input]"),
        }
    }

    fn parse_document(&mut self) -> ParserResult<Vec<Statement>> {
        let mut stmts = Vec::new();
        while self.peek().is_some() {
            if let Some(stmt) = self.parse_statement()? {
                stmts.push(stmt);
            }
        }
        Ok(stmts)
    }

    // ---- token-stream plumbing -------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.stream.peek()
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.stream.pop();
        if let Some(tok) = &tok {
            self.last_sloc = tok.sloc.clone();
        }
        tok
    }

    fn here(&self) -> SourceLocation {
        self.peek().map(|t| t.sloc.clone()).unwrap_or_else(|| self.last_sloc.clone())
    }

    fn is_punct(&self, p: Punctuator) -> bool {
        self.peek().is_some_and(|t| t.is_punctuator(p))
    }

    fn is_keyword(&self, k: Keyword) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(k))
    }

    fn eat_punct(&mut self, p: Punctuator) -> bool {
        if self.is_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, k: Keyword) -> bool {
        if self.is_keyword(k) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: Punctuator, status: ParserStatus) -> ParserResult<SourceLocation> {
        let sloc = self.here();
        if self.eat_punct(p) {
            Ok(sloc)
        } else {
            Err(ParserError::new(status, sloc))
        }
    }

    fn expect_punct_matching(
        &mut self,
        p: Punctuator,
        status: ParserStatus,
        opening: SourceLocation,
    ) -> ParserResult<SourceLocation> {
        let sloc = self.here();
        if self.eat_punct(p) {
            Ok(sloc)
        } else {
            Err(ParserError::new(status, sloc).with_opening(opening))
        }
    }

    fn expect_keyword(&mut self, k: Keyword, status: ParserStatus) -> ParserResult<SourceLocation> {
        let sloc = self.here();
        if self.eat_keyword(k) {
            Ok(sloc)
        } else {
            Err(ParserError::new(status, sloc))
        }
    }

    fn expect_identifier(&mut self) -> ParserResult<(Arc<str>, SourceLocation)> {
        let sloc = self.here();
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Identifier(_)) => {
                let tok = self.bump().unwrap();
                let TokenKind::Identifier(name) = tok.kind else {
                    unreachable!()
                };
                Ok((Arc::from(name), sloc))
            }
            _ => Err(ParserError::new(ParserStatus::IdentifierExpected, sloc)),
        }
    }

    fn expect_string_literal(&mut self) -> ParserResult<(Arc<str>, SourceLocation)> {
        let sloc = self.here();
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::String(_)) => {
                let tok = self.bump().unwrap();
                let TokenKind::String(s) = tok.kind else { unreachable!() };
                Ok((Arc::from(s), sloc))
            }
            _ => Err(ParserError::new(ParserStatus::StringLiteralExpected, sloc)),
        }
    }

    /// Enters one level of recursive descent, guarding against pathological
    /// nesting depth (§4.2 "stack-overflow sentry").
    fn enter(&mut self) -> ParserResult<crate::resource::RecursionGuard<'_>> {
        let sloc = self.here();
        self.sentry.enter().map_err(|_| ParserError::new(ParserStatus::TooManyElements, sloc))
    }

    // ---- statements --------------------------------------------------------

    /// Parses one statement, or `None` for a bare `;` which contributes
    /// nothing to the tree (§6.2 `null` statement).
    fn parse_statement(&mut self) -> ParserResult<Option<Statement>> {
        let _guard = self.enter()?;
        let sloc = self.here();

        if self.eat_punct(Punctuator::Semicolon) {
            return Ok(None);
        }
        if self.is_punct(Punctuator::BraceOpen) {
            return Ok(Some(Statement::new(sloc, StatementKind::Block(self.parse_block()?))));
        }
        if self.is_keyword(Keyword::Var) || self.is_keyword(Keyword::Const) {
            return Ok(Some(self.parse_variable_group()?));
        }
        if self.is_keyword(Keyword::Func) {
            return Ok(Some(self.parse_function_decl()?));
        }
        if self.eat_keyword(Keyword::If) {
            return Ok(Some(self.parse_if(sloc)?));
        }
        if self.eat_keyword(Keyword::Switch) {
            return Ok(Some(self.parse_switch(sloc)?));
        }
        if self.eat_keyword(Keyword::Do) {
            return Ok(Some(self.parse_do_while(sloc)?));
        }
        if self.eat_keyword(Keyword::While) {
            return Ok(Some(self.parse_while(sloc)?));
        }
        if self.eat_keyword(Keyword::For) {
            return Ok(Some(self.parse_for(sloc)?));
        }
        if self.eat_keyword(Keyword::Try) {
            return Ok(Some(self.parse_try(sloc)?));
        }
        if self.eat_keyword(Keyword::Break) {
            let kind = self.parse_loop_kind_suffix();
            self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
            return Ok(Some(Statement::new(sloc, StatementKind::Break(kind))));
        }
        if self.eat_keyword(Keyword::Continue) {
            let kind = self.parse_loop_kind_suffix();
            self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
            return Ok(Some(Statement::new(sloc, StatementKind::Continue(kind))));
        }
        if self.eat_keyword(Keyword::Throw) {
            let expr = self.parse_expression()?;
            self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
            return Ok(Some(Statement::new(sloc, StatementKind::Throw(expr))));
        }
        if self.eat_keyword(Keyword::Return) {
            return Ok(Some(self.parse_return(sloc)?));
        }
        if self.eat_keyword(Keyword::Assert) {
            return Ok(Some(self.parse_assert(sloc)?));
        }
        if self.eat_keyword(Keyword::Defer) {
            let expr = self.parse_expression()?;
            self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
            return Ok(Some(Statement::new(sloc, StatementKind::Defer(expr))));
        }
        if self.eat_keyword(Keyword::Ref) {
            let (name, _) = self.expect_identifier()?;
            self.expect_punct(Punctuator::Assign, ParserStatus::EqualsSignExpected)?;
            let init = self.parse_expression()?;
            self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
            return Ok(Some(Statement::new(sloc, StatementKind::ReferenceGroup { name, init })));
        }

        let expr = self.parse_expression()?;
        self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
        Ok(Some(Statement::new(sloc, StatementKind::Expression(expr))))
    }

    fn parse_loop_kind_suffix(&mut self) -> LoopKind {
        if self.eat_keyword(Keyword::Switch) {
            LoopKind::Switch
        } else if self.eat_keyword(Keyword::While) {
            LoopKind::While
        } else if self.eat_keyword(Keyword::For) {
            LoopKind::For
        } else {
            LoopKind::Unspec
        }
    }

    fn parse_block(&mut self) -> ParserResult<Vec<Statement>> {
        let open = self.expect_punct(Punctuator::BraceOpen, ParserStatus::OpenBraceExpected)?;
        let mut stmts = Vec::new();
        while !self.is_punct(Punctuator::BraceClose) {
            if self.peek().is_none() {
                return Err(ParserError::new(ParserStatus::ClosedBraceExpected, self.here()).with_opening(open));
            }
            if let Some(stmt) = self.parse_statement()? {
                stmts.push(stmt);
            }
        }
        self.bump();
        Ok(stmts)
    }

    fn parse_declarator(&mut self) -> ParserResult<Declarator> {
        if self.is_punct(Punctuator::BracketOpen) {
            self.bump();
            let names = self.parse_identifier_list(Punctuator::BracketClose, ParserStatus::ClosedBracketExpected)?;
            Ok(Declarator::Array(names))
        } else if self.is_punct(Punctuator::BraceOpen) {
            self.bump();
            let names = self.parse_identifier_list(Punctuator::BraceClose, ParserStatus::ClosedBraceExpected)?;
            Ok(Declarator::Object(names))
        } else {
            let (name, _) = self.expect_identifier()?;
            Ok(Declarator::Single(name))
        }
    }

    fn parse_identifier_list(&mut self, close: Punctuator, close_status: ParserStatus) -> ParserResult<Vec<Arc<str>>> {
        let mut names = Vec::new();
        if !self.peek().is_some_and(|t| t.is_punctuator(close)) {
            loop {
                let (name, _) = self.expect_identifier()?;
                names.push(name);
                if !self.eat_punct(Punctuator::Comma) {
                    break;
                }
            }
        }
        self.expect_punct(close, close_status)?;
        Ok(names)
    }

    fn parse_variable_group(&mut self) -> ParserResult<Statement> {
        let sloc = self.here();
        let immutable = self.eat_keyword(Keyword::Const);
        if !immutable {
            self.bump(); // `var`
        }
        let mut decls = Vec::new();
        loop {
            let decl_sloc = self.here();
            let declarator = self.parse_declarator()?;
            let init = if self.eat_punct(Punctuator::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            decls.push(VariableDecl { sloc: decl_sloc, declarator, init });
            if !self.eat_punct(Punctuator::Comma) {
                break;
            }
        }
        self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
        Ok(Statement::new(sloc, StatementKind::VariableGroup { immutable, decls }))
    }

    fn parse_function_decl(&mut self) -> ParserResult<Statement> {
        let sloc = self.here();
        self.bump(); // `func`
        let (name, _) = self.expect_identifier()?;
        let (params, variadic) = self.parse_parenthesized_params()?;
        let body = self.parse_block()?;
        Ok(Statement::new(sloc, StatementKind::FunctionDecl { name, params, variadic, body }))
    }

    fn parse_parenthesized_params(&mut self) -> ParserResult<(Vec<Arc<str>>, bool)> {
        let open = self.expect_punct(Punctuator::ParenOpen, ParserStatus::OpenParenthesisExpected)?;
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.is_punct(Punctuator::ParenClose) {
            loop {
                if self.eat_punct(Punctuator::Ellipsis) {
                    variadic = true;
                    break;
                }
                let (name, _) = self.expect_identifier()?;
                params.push(name);
                if !self.eat_punct(Punctuator::Comma) {
                    break;
                }
            }
        }
        self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
        Ok((params, variadic))
    }

    fn parse_if(&mut self, sloc: SourceLocation) -> ParserResult<Statement> {
        let open = self.expect_punct(Punctuator::ParenOpen, ParserStatus::OpenParenthesisExpected)?;
        let cond = self.parse_expression()?;
        self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
        let true_body = self.parse_statement_as_block()?;
        let false_body = if self.eat_keyword(Keyword::Else) {
            self.parse_statement_as_block()?
        } else {
            Vec::new()
        };
        Ok(Statement::new(sloc, StatementKind::If { cond, true_body, false_body }))
    }

    /// A single statement used where a block is conceptually expected (`if`,
    /// `while`, ...) is wrapped in a one-element block so `If`/`While`/etc.
    /// always carry a `Vec<Statement>` body.
    fn parse_statement_as_block(&mut self) -> ParserResult<Vec<Statement>> {
        if self.is_punct(Punctuator::BraceOpen) {
            self.parse_block()
        } else {
            match self.parse_statement()? {
                Some(stmt) => Ok(vec![stmt]),
                None => Ok(Vec::new()),
            }
        }
    }

    fn parse_switch(&mut self, sloc: SourceLocation) -> ParserResult<Statement> {
        let open = self.expect_punct(Punctuator::ParenOpen, ParserStatus::OpenParenthesisExpected)?;
        let ctrl = self.parse_expression()?;
        self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
        let brace = self.expect_punct(Punctuator::BraceOpen, ParserStatus::OpenBraceExpected)?;
        let mut labels = Vec::new();
        let mut bodies = Vec::new();
        loop {
            if self.eat_keyword(Keyword::Case) {
                let label = self.parse_expression()?;
                self.expect_punct(Punctuator::Colon, ParserStatus::ColonExpected)?;
                labels.push(Some(label));
            } else if self.eat_keyword(Keyword::Default) {
                self.expect_punct(Punctuator::Colon, ParserStatus::ColonExpected)?;
                labels.push(None);
            } else {
                break;
            }
            let mut body = Vec::new();
            while !(self.is_keyword(Keyword::Case)
                || self.is_keyword(Keyword::Default)
                || self.is_punct(Punctuator::BraceClose))
            {
                if self.peek().is_none() {
                    return Err(ParserError::new(ParserStatus::ClosedBraceOrSwitchClauseExpected, self.here())
                        .with_opening(brace));
                }
                if let Some(stmt) = self.parse_statement()? {
                    body.push(stmt);
                }
            }
            bodies.push(body);
        }
        self.expect_punct_matching(Punctuator::BraceClose, ParserStatus::ClosedBraceOrSwitchClauseExpected, brace)?;
        Ok(Statement::new(sloc, StatementKind::Switch { ctrl, labels, bodies }))
    }

    fn parse_do_while(&mut self, sloc: SourceLocation) -> ParserResult<Statement> {
        let body = self.parse_statement_as_block()?;
        self.expect_keyword(Keyword::While, ParserStatus::StatementExpected)?;
        let open = self.expect_punct(Punctuator::ParenOpen, ParserStatus::OpenParenthesisExpected)?;
        let cond = self.parse_expression()?;
        self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
        self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
        Ok(Statement::new(sloc, StatementKind::DoWhile { body, negative: false, cond }))
    }

    fn parse_while(&mut self, sloc: SourceLocation) -> ParserResult<Statement> {
        let open = self.expect_punct(Punctuator::ParenOpen, ParserStatus::OpenParenthesisExpected)?;
        let cond = self.parse_expression()?;
        self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
        let body = self.parse_statement_as_block()?;
        Ok(Statement::new(sloc, StatementKind::While { negative: false, cond, body }))
    }

    fn parse_for(&mut self, sloc: SourceLocation) -> ParserResult<Statement> {
        let open = self.expect_punct(Punctuator::ParenOpen, ParserStatus::OpenParenthesisExpected)?;
        if self.eat_keyword(Keyword::Each) {
            let (key_name, _) = self.expect_identifier()?;
            self.expect_punct(Punctuator::Comma, ParserStatus::CommaExpected)?;
            let (mapped_name, _) = self.expect_identifier()?;
            self.expect_punct(Punctuator::Colon, ParserStatus::ColonExpected)?;
            let range = self.parse_expression()?;
            self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
            let body = self.parse_statement_as_block()?;
            return Ok(Statement::new(sloc, StatementKind::ForEach { key_name, mapped_name, range, body }));
        }

        let init = if self.eat_punct(Punctuator::Semicolon) {
            Vec::new()
        } else if self.is_keyword(Keyword::Var) || self.is_keyword(Keyword::Const) {
            vec![self.parse_variable_group()?]
        } else if !self.is_punct(Punctuator::Semicolon) {
            let expr_sloc = self.here();
            let expr = self.parse_expression()?;
            self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
            vec![Statement::new(expr_sloc, StatementKind::Expression(expr))]
        } else {
            return Err(ParserError::new(ParserStatus::ForStatementInitializerExpected, self.here()));
        };

        let cond = if self.is_punct(Punctuator::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;

        let step = if self.is_punct(Punctuator::ParenClose) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
        let body = self.parse_statement_as_block()?;
        Ok(Statement::new(sloc, StatementKind::For { init, cond, step, body }))
    }

    fn parse_try(&mut self, sloc: SourceLocation) -> ParserResult<Statement> {
        let try_body = self.parse_block()?;
        let sloc_catch = self.expect_keyword(Keyword::Catch, ParserStatus::KeywordCatchExpected)?;
        let open = self.expect_punct(Punctuator::ParenOpen, ParserStatus::OpenParenthesisExpected)?;
        let (except_name, _) = self.expect_identifier()?;
        self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
        let catch_body = self.parse_block()?;
        Ok(Statement::new(
            sloc,
            StatementKind::TryCatch { try_body, sloc_catch, except_name, catch_body },
        ))
    }

    fn parse_return(&mut self, sloc: SourceLocation) -> ParserResult<Statement> {
        let by_ref = self.eat_keyword(Keyword::Ref);
        if self.eat_punct(Punctuator::Semicolon) {
            return Ok(Statement::new(sloc, StatementKind::Return { by_ref, expr: None }));
        }
        let expr = self.parse_expression()?;
        self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
        Ok(Statement::new(sloc, StatementKind::Return { by_ref, expr: Some(expr) }))
    }

    fn parse_assert(&mut self, sloc: SourceLocation) -> ParserResult<Statement> {
        let expr = self.parse_expression()?;
        let message = if self.eat_punct(Punctuator::Colon) {
            let (s, _) = self.expect_string_literal()?;
            Some(s)
        } else {
            None
        };
        self.expect_punct(Punctuator::Semicolon, ParserStatus::SemicolonExpected)?;
        Ok(Statement::new(sloc, StatementKind::Assert { expr, message }))
    }

    // ---- expressions --------------------------------------------------------

    fn parse_expression(&mut self) -> ParserResult<Expression> {
        let mut out = Vec::new();
        self.parse_expr_bp(&mut out, 0)?;
        Ok(out)
    }

    fn infix_info(&self, tok: &Token) -> Option<InfixOp> {
        let p = match &tok.kind {
            TokenKind::Punctuator(p) => *p,
            TokenKind::Keyword(Keyword::And) => Punctuator::AndL,
            TokenKind::Keyword(Keyword::Or) => Punctuator::OrL,
            _ => return None,
        };
        // Precedence tiers, loosest (lowest bp) to tightest (highest bp);
        // assignment-family and ternary/coalescence/logical ops are
        // right-associative (right_bp == left_bp), everything else is
        // left-associative (right_bp == left_bp + 1).
        let op = match p {
            Punctuator::Assign => InfixOp { left_bp: 10, right_bp: 10, kind: InfixKind::Assign },
            Punctuator::AddAssign => self.compound(10, Xop::Add),
            Punctuator::SubAssign => self.compound(10, Xop::Sub),
            Punctuator::MulAssign => self.compound(10, Xop::Mul),
            Punctuator::DivAssign => self.compound(10, Xop::Div),
            Punctuator::ModAssign => self.compound(10, Xop::Mod),
            Punctuator::SllAssign => self.compound(10, Xop::Sll),
            Punctuator::SrlAssign => self.compound(10, Xop::Srl),
            Punctuator::SlaAssign => self.compound(10, Xop::Sla),
            Punctuator::SraAssign => self.compound(10, Xop::Sra),
            Punctuator::AndBAssign => self.compound(10, Xop::AndB),
            Punctuator::OrBAssign => self.compound(10, Xop::OrB),
            Punctuator::XorBAssign => self.compound(10, Xop::XorB),
            Punctuator::AndLAssign => InfixOp { left_bp: 10, right_bp: 10, kind: InfixKind::LogicalAnd { assign: true } },
            Punctuator::OrLAssign => InfixOp { left_bp: 10, right_bp: 10, kind: InfixKind::LogicalOr { assign: true } },
            Punctuator::CoalesceAssign => InfixOp { left_bp: 10, right_bp: 10, kind: InfixKind::Coalesce { assign: true } },
            // `?=` is treated identically to `&&=`: assign the right-hand
            // side iff the left-hand side is truthy, else leave it alone.
            Punctuator::TernaryAssign => InfixOp { left_bp: 10, right_bp: 10, kind: InfixKind::LogicalAnd { assign: true } },
            Punctuator::Coalesce => InfixOp { left_bp: 30, right_bp: 30, kind: InfixKind::Coalesce { assign: false } },
            Punctuator::OrL => InfixOp { left_bp: 40, right_bp: 40, kind: InfixKind::LogicalOr { assign: false } },
            Punctuator::AndL => InfixOp { left_bp: 50, right_bp: 50, kind: InfixKind::LogicalAnd { assign: false } },
            Punctuator::CmpEq => self.plain(60, Xop::CmpEq),
            Punctuator::CmpNe => self.plain(60, Xop::CmpNe),
            Punctuator::CmpLt => self.plain(70, Xop::CmpLt),
            Punctuator::CmpGt => self.plain(70, Xop::CmpGt),
            Punctuator::CmpLte => self.plain(70, Xop::CmpLte),
            Punctuator::CmpGte => self.plain(70, Xop::CmpGte),
            Punctuator::Cmp3way => self.plain(70, Xop::Cmp3way),
            Punctuator::AndB => self.plain(80, Xop::AndB),
            Punctuator::OrB => self.plain(80, Xop::OrB),
            Punctuator::XorB => self.plain(80, Xop::XorB),
            Punctuator::Sll => self.plain(90, Xop::Sll),
            Punctuator::Srl => self.plain(90, Xop::Srl),
            Punctuator::Sla => self.plain(90, Xop::Sla),
            Punctuator::Sra => self.plain(90, Xop::Sra),
            Punctuator::Add => self.plain(100, Xop::Add),
            Punctuator::Sub => self.plain(100, Xop::Sub),
            Punctuator::Mul => self.plain(110, Xop::Mul),
            Punctuator::Div => self.plain(110, Xop::Div),
            Punctuator::Mod => self.plain(110, Xop::Mod),
            _ => return None,
        };
        Some(op)
    }

    fn plain(&self, bp: u8, xop: Xop) -> InfixOp {
        InfixOp { left_bp: bp, right_bp: bp + 1, kind: InfixKind::Plain(xop) }
    }

    fn compound(&self, bp: u8, xop: Xop) -> InfixOp {
        InfixOp { left_bp: bp, right_bp: bp, kind: InfixKind::PlainAssign(xop) }
    }

    /// Precedence-climbing loop: parses one prefix/postfix-wrapped operand,
    /// then repeatedly consumes infix operators at or above `min_bp`.
    fn parse_expr_bp(&mut self, out: &mut Expression, min_bp: u8) -> ParserResult<()> {
        let _guard = self.enter()?;
        self.parse_prefix_and_postfix(out)?;

        loop {
            // Ternary `?:` is special-cased: it isn't a binary operator with
            // a single rhs, it has two branches and its own precedence tier
            // between coalescence and the assignment family.
            if self.is_punct(Punctuator::Question) && 20 >= min_bp {
                let sloc = self.here();
                self.bump();
                // Both branches are parsed as full expressions (floor 0), so
                // `a ? b : c = d` reads as `a ? b : (c = d)` and chained
                // ternaries `a ? b : c ? d : e` fall out of the false
                // branch's own recursive call rather than needing special
                // right-associative handling here.
                let mut true_branch = Vec::new();
                self.parse_expr_bp(&mut true_branch, 0)?;
                self.expect_punct(Punctuator::Colon, ParserStatus::ColonExpected)?;
                let mut false_branch = Vec::new();
                self.parse_expr_bp(&mut false_branch, 0)?;
                out.push(ExpressionUnit::new(
                    sloc,
                    ExpressionUnitKind::Branch { assign: false, true_branch, false_branch },
                ));
                continue;
            }

            let Some(tok) = self.peek() else { break };
            let Some(info) = self.infix_info(tok) else { break };
            if info.left_bp < min_bp {
                break;
            }
            let sloc = tok.sloc.clone();
            self.bump();

            match info.kind {
                InfixKind::Plain(xop) => {
                    self.parse_expr_bp(out, info.right_bp)?;
                    out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Operator { xop, assign: false }));
                }
                InfixKind::PlainAssign(xop) => {
                    self.parse_expr_bp(out, info.right_bp)?;
                    out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Operator { xop, assign: true }));
                }
                InfixKind::Assign => {
                    self.parse_expr_bp(out, info.right_bp)?;
                    out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Operator { xop: Xop::Assign, assign: false }));
                }
                InfixKind::LogicalAnd { assign } => {
                    let mut true_branch = Vec::new();
                    self.parse_expr_bp(&mut true_branch, info.right_bp)?;
                    out.push(ExpressionUnit::new(
                        sloc,
                        ExpressionUnitKind::Branch { assign, true_branch, false_branch: Vec::new() },
                    ));
                }
                InfixKind::LogicalOr { assign } => {
                    let mut false_branch = Vec::new();
                    self.parse_expr_bp(&mut false_branch, info.right_bp)?;
                    out.push(ExpressionUnit::new(
                        sloc,
                        ExpressionUnitKind::Branch { assign, true_branch: Vec::new(), false_branch },
                    ));
                }
                InfixKind::Coalesce { assign } => {
                    let mut null_branch = Vec::new();
                    self.parse_expr_bp(&mut null_branch, info.right_bp)?;
                    out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Coalescence { assign, null_branch }));
                }
            }
        }
        Ok(())
    }

    /// Parses prefix operators, a primary expression, and any postfix chain
    /// (call, subscript, member access, `++`/`--`, `[^] [$] [?]`).
    fn parse_prefix_and_postfix(&mut self, out: &mut Expression) -> ParserResult<()> {
        let sloc = self.here();

        if let Some(xop) = self.peek_prefix_operator() {
            self.bump();
            self.parse_prefix_and_postfix(out)?;
            out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Operator { xop, assign: false }));
            return Ok(());
        }

        self.parse_primary(out)?;
        self.parse_postfix_chain(out)
    }

    fn peek_prefix_operator(&self) -> Option<Xop> {
        let tok = self.peek()?;
        match &tok.kind {
            TokenKind::Punctuator(Punctuator::Add) => Some(Xop::Pos),
            TokenKind::Punctuator(Punctuator::Sub) => Some(Xop::Neg),
            TokenKind::Punctuator(Punctuator::NotB) => Some(Xop::NotB),
            TokenKind::Punctuator(Punctuator::NotL) => Some(Xop::NotL),
            TokenKind::Punctuator(Punctuator::Inc) => Some(Xop::IncPre),
            TokenKind::Punctuator(Punctuator::Dec) => Some(Xop::DecPre),
            TokenKind::Keyword(Keyword::Not) => Some(Xop::NotL),
            TokenKind::Keyword(Keyword::Unset) => Some(Xop::Unset),
            TokenKind::Keyword(Keyword::Countof) => Some(Xop::Countof),
            TokenKind::Keyword(Keyword::Typeof) => Some(Xop::Typeof),
            _ => None,
        }
    }

    fn parse_postfix_chain(&mut self, out: &mut Expression) -> ParserResult<()> {
        loop {
            let sloc = self.here();
            if self.eat_punct(Punctuator::Inc) {
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Operator { xop: Xop::IncPost, assign: false }));
            } else if self.eat_punct(Punctuator::Dec) {
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Operator { xop: Xop::DecPost, assign: false }));
            } else if self.eat_punct(Punctuator::Head) {
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Operator { xop: Xop::Head, assign: false }));
            } else if self.eat_punct(Punctuator::Tail) {
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Operator { xop: Xop::Tail, assign: false }));
            } else if self.eat_punct(Punctuator::Random) {
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Operator { xop: Xop::Random, assign: false }));
            } else if self.eat_punct(Punctuator::Dot) {
                let (name, _) = self.expect_identifier()?;
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::MemberAccess { name }));
            } else if self.is_punct(Punctuator::BracketOpen) {
                let open = self.bump().unwrap().sloc;
                self.parse_expr_bp(out, 0)?;
                self.expect_punct_matching(Punctuator::BracketClose, ParserStatus::ClosedBracketExpected, open)?;
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Operator { xop: Xop::Subscr, assign: false }));
            } else if self.is_punct(Punctuator::ParenOpen) {
                self.parse_call_arguments(out, sloc)?;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// `callee(args...)` / `callee(...gen)`: emits argument units followed
    /// by `ArgumentFinish` per argument, then `FunctionCall{nargs}`; or, for
    /// the spread-call sugar, the generator units followed by `VariadicCall`.
    fn parse_call_arguments(&mut self, out: &mut Expression, sloc: SourceLocation) -> ParserResult<()> {
        let open = self.expect_punct(Punctuator::ParenOpen, ParserStatus::OpenParenthesisExpected)?;

        if self.is_punct(Punctuator::Ellipsis) {
            self.bump();
            self.parse_expr_bp(out, 0)?;
            self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
            out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::VariadicCall));
            return Ok(());
        }

        let mut nargs: u32 = 0;
        if !self.is_punct(Punctuator::ParenClose) {
            loop {
                let arg_sloc = self.here();
                let by_ref = self.eat_keyword(Keyword::Ref);
                self.parse_expr_bp(out, 0)?;
                out.push(ExpressionUnit::new(arg_sloc, ExpressionUnitKind::ArgumentFinish { by_ref }));
                nargs += 1;
                if !self.eat_punct(Punctuator::Comma) {
                    break;
                }
            }
        }
        self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
        out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::FunctionCall { nargs }));
        Ok(())
    }

    fn parse_primary(&mut self, out: &mut Expression) -> ParserResult<()> {
        let sloc = self.here();
        let Some(tok) = self.peek() else {
            return Err(ParserError::new(ParserStatus::ExpressionExpected, sloc));
        };

        match &tok.kind {
            TokenKind::Integer(_) | TokenKind::Real(_) | TokenKind::String(_) => {
                let tok = self.bump().unwrap();
                let lit = match tok.kind {
                    TokenKind::Integer(i) => LiteralValue::Integer(i),
                    TokenKind::Real(r) => LiteralValue::Real(r),
                    TokenKind::String(s) => LiteralValue::String(Arc::from(s)),
                    _ => unreachable!(),
                };
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Literal(lit)));
                Ok(())
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.bump();
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Literal(LiteralValue::Null)));
                Ok(())
            }
            TokenKind::Keyword(Keyword::True) => {
                self.bump();
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Literal(LiteralValue::Boolean(true))));
                Ok(())
            }
            TokenKind::Keyword(Keyword::False) => {
                self.bump();
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Literal(LiteralValue::Boolean(false))));
                Ok(())
            }
            TokenKind::Keyword(Keyword::Func) => self.parse_closure(out),
            TokenKind::Keyword(Keyword::Catch) => {
                self.bump();
                let open = self.expect_punct(Punctuator::ParenOpen, ParserStatus::OpenParenthesisExpected)?;
                let body = self.parse_expression()?;
                self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Catch { body }));
                Ok(())
            }
            TokenKind::Keyword(Keyword::Import) => {
                self.bump();
                let open = self.expect_punct(Punctuator::ParenOpen, ParserStatus::OpenParenthesisExpected)?;
                let mut path_units = Vec::new();
                self.parse_expr_bp(&mut path_units, 0)?;
                let mut nargs: u32 = 0;
                let mut all = path_units;
                while self.eat_punct(Punctuator::Comma) {
                    let arg_sloc = self.here();
                    self.parse_expr_bp(&mut all, 0)?;
                    all.push(ExpressionUnit::new(arg_sloc, ExpressionUnitKind::ArgumentFinish { by_ref: false }));
                    nargs += 1;
                }
                self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
                out.extend(all);
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::ImportCall { nargs }));
                Ok(())
            }
            TokenKind::Identifier(_) => {
                let tok = self.bump().unwrap();
                let TokenKind::Identifier(name) = tok.kind else { unreachable!() };
                out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::LocalReference(Arc::from(name))));
                Ok(())
            }
            TokenKind::Punctuator(Punctuator::ParenOpen) => {
                let open = self.bump().unwrap().sloc;
                self.parse_expr_bp(out, 0)?;
                self.expect_punct_matching(Punctuator::ParenClose, ParserStatus::ClosedParenthesisExpected, open)?;
                Ok(())
            }
            TokenKind::Punctuator(Punctuator::BracketOpen) => self.parse_array_literal(out, sloc),
            TokenKind::Punctuator(Punctuator::BraceOpen) => self.parse_object_literal(out, sloc),
            _ => Err(ParserError::new(ParserStatus::ExpressionExpected, sloc)),
        }
    }

    fn parse_closure(&mut self, out: &mut Expression) -> ParserResult<()> {
        let sloc = self.here();
        self.bump(); // `func`
        let (params, variadic) = self.parse_parenthesized_params()?;
        let body = self.parse_block()?;
        let name: Arc<str> = Arc::from(format!("<closure at {sloc}>"));
        out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::Closure { params, variadic, body, name }));
        Ok(())
    }

    fn parse_array_literal(&mut self, out: &mut Expression, sloc: SourceLocation) -> ParserResult<()> {
        let open = self.bump().unwrap().sloc;
        let mut nelems: u32 = 0;
        if !self.is_punct(Punctuator::BracketClose) {
            loop {
                self.parse_expr_bp(out, 0)?;
                nelems += 1;
                if !self.eat_punct(Punctuator::Comma) {
                    break;
                }
                if self.is_punct(Punctuator::BracketClose) {
                    break;
                }
            }
        }
        self.expect_punct_matching(Punctuator::BracketClose, ParserStatus::ClosedBracketExpected, open)?;
        out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::UnnamedArray { nelems }));
        Ok(())
    }

    fn parse_object_literal(&mut self, out: &mut Expression, sloc: SourceLocation) -> ParserResult<()> {
        let open = self.bump().unwrap().sloc;
        let mut keys = Vec::new();
        if !self.is_punct(Punctuator::BraceClose) {
            loop {
                let key = self.parse_object_key()?;
                if !(self.eat_punct(Punctuator::Colon) || self.eat_punct(Punctuator::Assign)) {
                    return Err(ParserError::new(ParserStatus::EqualsSignOrColonExpected, self.here()));
                }
                self.parse_expr_bp(out, 0)?;
                keys.push(key);
                if !self.eat_punct(Punctuator::Comma) {
                    break;
                }
                if self.is_punct(Punctuator::BraceClose) {
                    break;
                }
            }
        }
        self.expect_punct_matching(Punctuator::BraceClose, ParserStatus::ClosedBraceOrJson5KeyExpected, open)?;
        out.push(ExpressionUnit::new(sloc, ExpressionUnitKind::UnnamedObject { keys }));
        Ok(())
    }

    /// Object keys are either an identifier (JSON5-style bareword) or a
    /// string literal.
    fn parse_object_key(&mut self) -> ParserResult<Arc<str>> {
        let sloc = self.here();
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Identifier(_)) => Ok(self.expect_identifier()?.0),
            Some(TokenKind::String(_)) => Ok(self.expect_string_literal()?.0),
            _ => Err(ParserError::new(ParserStatus::ClosedBraceOrJson5KeyExpected, sloc)),
        }
    }
}
