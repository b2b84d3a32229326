//! Token kinds produced by the lexer (§3.2).

use std::fmt;

use crate::sloc::SourceLocation;

/// Reserved words recognized unless `keywords_as_identifiers` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Var,
    Const,
    Func,
    If,
    Else,
    Switch,
    Case,
    Default,
    Do,
    While,
    For,
    Each,
    Try,
    Catch,
    Break,
    Continue,
    Throw,
    Return,
    Assert,
    Defer,
    Ref,
    Import,
    Null,
    True,
    False,
    And,
    Or,
    Not,
    Unset,
    Countof,
    Typeof,
}

impl Keyword {
    /// The fixed keyword table, matched against identifier text.
    const TABLE: &'static [(&'static str, Keyword)] = &[
        ("var", Keyword::Var),
        ("const", Keyword::Const),
        ("func", Keyword::Func),
        ("if", Keyword::If),
        ("else", Keyword::Else),
        ("switch", Keyword::Switch),
        ("case", Keyword::Case),
        ("default", Keyword::Default),
        ("do", Keyword::Do),
        ("while", Keyword::While),
        ("for", Keyword::For),
        ("each", Keyword::Each),
        ("try", Keyword::Try),
        ("catch", Keyword::Catch),
        ("break", Keyword::Break),
        ("continue", Keyword::Continue),
        ("throw", Keyword::Throw),
        ("return", Keyword::Return),
        ("assert", Keyword::Assert),
        ("defer", Keyword::Defer),
        ("ref", Keyword::Ref),
        ("import", Keyword::Import),
        ("null", Keyword::Null),
        ("true", Keyword::True),
        ("false", Keyword::False),
        ("and", Keyword::And),
        ("or", Keyword::Or),
        ("not", Keyword::Not),
        ("unset", Keyword::Unset),
        ("countof", Keyword::Countof),
        ("typeof", Keyword::Typeof),
    ];

    pub fn lookup(ident: &str) -> Option<Self> {
        Self::TABLE.iter().find(|(text, _)| *text == ident).map(|(_, kw)| *kw)
    }

    pub fn as_str(self) -> &'static str {
        Self::TABLE.iter().find(|(_, kw)| *kw == self).map(|(text, _)| *text).unwrap()
    }
}

/// Fixed punctuator table, longest match first (§4.1).
///
/// The list is kept sorted by descending byte length so that a linear scan
/// from the front always finds the longest matching prefix first; see
/// `Punctuator::match_prefix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punctuator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    IncPost, // handled contextually at parser level, lexed as `++`
    Inc,
    Dec,
    NotB,
    NotL,
    AndB,
    OrB,
    XorB,
    Sll,
    Srl,
    Sla,
    Sra,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpGt,
    CmpLte,
    CmpGte,
    Cmp3way,
    AndL,
    OrL,
    Coalesce,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    SllAssign,
    SrlAssign,
    SlaAssign,
    SraAssign,
    AndBAssign,
    OrBAssign,
    XorBAssign,
    AndLAssign,
    OrLAssign,
    CoalesceAssign,
    TernaryAssign,
    Question,
    Colon,
    Comma,
    Semicolon,
    Dot,
    Ellipsis,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    BraceOpen,
    BraceClose,
    Head,   // [^]
    Tail,   // [$]
    Random, // [?]
}

impl Punctuator {
    const TABLE: &'static [(&'static str, Punctuator)] = &[
        ("<<<=", Punctuator::SllAssign),
        (">>>=", Punctuator::SrlAssign),
        ("<=>", Punctuator::Cmp3way),
        ("&&=", Punctuator::AndLAssign),
        ("||=", Punctuator::OrLAssign),
        ("??=", Punctuator::CoalesceAssign),
        ("<<=", Punctuator::SlaAssign),
        (">>=", Punctuator::SraAssign),
        ("<<<", Punctuator::Sll),
        (">>>", Punctuator::Srl),
        ("...", Punctuator::Ellipsis),
        ("[^]", Punctuator::Head),
        ("[$]", Punctuator::Tail),
        ("[?]", Punctuator::Random),
        ("?=", Punctuator::TernaryAssign),
        ("==", Punctuator::CmpEq),
        ("!=", Punctuator::CmpNe),
        ("<=", Punctuator::CmpLte),
        (">=", Punctuator::CmpGte),
        ("&&", Punctuator::AndL),
        ("||", Punctuator::OrL),
        ("??", Punctuator::Coalesce),
        ("++", Punctuator::Inc),
        ("--", Punctuator::Dec),
        ("<<", Punctuator::Sla),
        (">>", Punctuator::Sra),
        ("+=", Punctuator::AddAssign),
        ("-=", Punctuator::SubAssign),
        ("*=", Punctuator::MulAssign),
        ("/=", Punctuator::DivAssign),
        ("%=", Punctuator::ModAssign),
        ("&=", Punctuator::AndBAssign),
        ("|=", Punctuator::OrBAssign),
        ("^=", Punctuator::XorBAssign),
        ("+", Punctuator::Add),
        ("-", Punctuator::Sub),
        ("*", Punctuator::Mul),
        ("/", Punctuator::Div),
        ("%", Punctuator::Mod),
        ("~", Punctuator::NotB),
        ("!", Punctuator::NotL),
        ("&", Punctuator::AndB),
        ("|", Punctuator::OrB),
        ("^", Punctuator::XorB),
        ("<", Punctuator::CmpLt),
        (">", Punctuator::CmpGt),
        ("=", Punctuator::Assign),
        ("?", Punctuator::Question),
        (":", Punctuator::Colon),
        (",", Punctuator::Comma),
        (";", Punctuator::Semicolon),
        (".", Punctuator::Dot),
        ("(", Punctuator::ParenOpen),
        (")", Punctuator::ParenClose),
        ("[", Punctuator::BracketOpen),
        ("]", Punctuator::BracketClose),
        ("{", Punctuator::BraceOpen),
        ("}", Punctuator::BraceClose),
    ];

    /// Finds the longest punctuator that is a prefix of `text`, returning the
    /// punctuator and its byte length.
    pub fn match_prefix(text: &str) -> Option<(Self, usize)> {
        Self::TABLE
            .iter()
            .find(|(lit, _)| text.starts_with(lit))
            .map(|(lit, p)| (*p, lit.len()))
    }

    pub fn as_str(self) -> &'static str {
        Self::TABLE.iter().find(|(_, p)| *p == self).map(|(lit, _)| *lit).unwrap()
    }
}

impl fmt::Display for Punctuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lexical token, annotated with its source location and length in
/// bytes (§3.2).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub sloc: SourceLocation,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Punctuator(Punctuator),
    Identifier(String),
    Integer(i64),
    Real(f64),
    String(String),
}

impl Token {
    pub fn is_punctuator(&self, p: Punctuator) -> bool {
        matches!(&self.kind, TokenKind::Punctuator(q) if *q == p)
    }

    pub fn is_keyword(&self, k: Keyword) -> bool {
        matches!(&self.kind, TokenKind::Keyword(q) if *q == k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_punctuator_wins() {
        assert_eq!(Punctuator::match_prefix("<<<=x"), Some((Punctuator::SllAssign, 4)));
        assert_eq!(Punctuator::match_prefix("<<<x"), Some((Punctuator::Sll, 3)));
        assert_eq!(Punctuator::match_prefix("<<x"), Some((Punctuator::Sla, 2)));
        assert_eq!(Punctuator::match_prefix("<x"), Some((Punctuator::CmpLt, 1)));
    }

    #[test]
    fn keyword_lookup_roundtrips() {
        let kw = Keyword::lookup("switch").unwrap();
        assert_eq!(kw, Keyword::Switch);
        assert_eq!(kw.as_str(), "switch");
    }
}
