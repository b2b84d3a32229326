//! Token Stream: converts source text into a reversed sequence of tokens
//! (§2 phase 1, §4.1).
//!
//! Tokens are produced in source order but stored back-to-front internally,
//! so that `pop_front` (the next token) is a cheap `Vec::pop`. This mirrors
//! the teacher's preference for index/stack-friendly storage over `VecDeque`
//! churn (see `namespace.rs`'s flat `Vec`-backed `Namespace`).

use std::sync::Arc;

use crate::compiler_options::CompilerOptions;
use crate::parser_error::{ParserError, ParserResult, ParserStatus};
use crate::sloc::SourceLocation;
use crate::token::{Keyword, Punctuator, Token, TokenKind};

/// A reversed queue of tokens ready for the parser to consume.
#[derive(Debug)]
pub struct TokenStream {
    // Stored back-to-front: `tokens.last()` is the next token.
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Tokenizes `text` from `file`, starting at `starting_line` (1-based
    /// unless the caller wants a synthetic stream).
    pub fn tokenize(
        file: impl Into<Arc<str>>,
        starting_line: u32,
        text: &str,
        opts: &CompilerOptions,
    ) -> ParserResult<Self> {
        let file = file.into();
        let mut scanner = Scanner::new(&file, starting_line, text);
        let mut forward = Vec::new();

        if starting_line <= 1 && text.starts_with("#!") {
            scanner.skip_line();
        }

        loop {
            scanner.skip_trivia()?;
            if scanner.is_eof() {
                break;
            }
            forward.push(scanner.lex_one(opts)?);
        }

        forward.reverse();
        Ok(Self { tokens: forward })
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.last()
    }

    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        let len = self.tokens.len();
        n.checked_add(1).and_then(|i| len.checked_sub(i)).map(|idx| &self.tokens[idx])
    }

    pub fn pop(&mut self) -> Option<Token> {
        self.tokens.pop()
    }
}

struct Scanner<'a> {
    file: &'a Arc<str>,
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Scanner<'a> {
    fn new(file: &'a Arc<str>, starting_line: u32, text: &'a str) -> Self {
        Self {
            file,
            text,
            bytes: text.as_bytes(),
            pos: 0,
            line: starting_line.max(1),
            column: 1,
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn sloc(&self) -> SourceLocation {
        SourceLocation::new(Arc::clone(self.file), self.line, self.column)
    }

    fn advance_byte(&mut self) {
        let b = self.bytes[self.pos];
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if b.is_ascii() || (b & 0xC0) != 0x80 {
            // Count only the first byte of each UTF-8 sequence as a column.
            self.column += 1;
        }
    }

    fn skip_line(&mut self) {
        while let Some(b) = self.peek_byte() {
            if b == b'\n' {
                break;
            }
            self.advance_byte();
        }
    }

    fn skip_trivia(&mut self) -> ParserResult<()> {
        loop {
            match self.peek_byte() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.advance_byte(),
                Some(b'/') if self.peek_at(1) == Some(b'/') => self.skip_line(),
                Some(b'/') if self.peek_at(1) == Some(b'*') => self.skip_block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> ParserResult<()> {
        let start = self.sloc();
        self.advance_byte();
        self.advance_byte();
        loop {
            match self.peek_byte() {
                None => return Err(ParserError::new(ParserStatus::BlockCommentUnclosed, start)),
                Some(b'*') if self.peek_at(1) == Some(b'/') => {
                    self.advance_byte();
                    self.advance_byte();
                    return Ok(());
                }
                Some(_) => self.advance_byte(),
            }
        }
    }

    fn lex_one(&mut self, opts: &CompilerOptions) -> ParserResult<Token> {
        let sloc = self.sloc();
        let start = self.pos;
        let first = self.peek_byte().expect("lex_one called at eof");

        let kind = if first == b'"' || (first == b'\'' ) {
            self.lex_string(first, opts)?
        } else if first.is_ascii_digit() {
            self.lex_number(opts)?
        } else if first == b'_' || first.is_ascii_alphabetic() || first >= 0x80 {
            self.lex_identifier(opts)
        } else if let Some((p, len)) = Punctuator::match_prefix(self.rest()) {
            for _ in 0..len {
                self.advance_byte();
            }
            TokenKind::Punctuator(p)
        } else {
            return Err(ParserError::new(ParserStatus::TokenCharacterUnrecognized, sloc));
        };

        let length = (self.pos - start) as u32;
        Ok(Token { kind, sloc, length })
    }

    fn lex_identifier(&mut self, opts: &CompilerOptions) -> TokenKind {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b == b'_' || b.is_ascii_alphanumeric() || b >= 0x80 {
                self.advance_byte();
            } else {
                break;
            }
        }
        let text = &self.text[start..self.pos];
        if !opts.keywords_as_identifiers {
            if let Some(kw) = Keyword::lookup(text) {
                return TokenKind::Keyword(kw);
            }
        }
        TokenKind::Identifier(text.to_owned())
    }

    fn lex_number(&mut self, opts: &CompilerOptions) -> ParserResult<TokenKind> {
        let sloc = self.sloc();
        let start = self.pos;

        let radix = if self.peek_byte() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            self.advance_byte();
            self.advance_byte();
            16
        } else if self.peek_byte() == Some(b'0') && matches!(self.peek_at(1), Some(b'b' | b'B')) {
            self.advance_byte();
            self.advance_byte();
            2
        } else {
            10
        };

        let mantissa_start = self.pos;
        self.skip_digit_run(radix);
        let mut has_point = false;
        if self.peek_byte() == Some(b'.') && self.peek_at(1).is_some_and(|b| is_radix_digit(b, radix)) {
            has_point = true;
            self.advance_byte();
            self.skip_digit_run(radix);
        }

        let exp_marker: &[u8] = if radix == 16 { b"pP" } else { b"eE" };
        let mut has_exp = false;
        if let Some(b) = self.peek_byte() {
            if exp_marker.contains(&b) {
                has_exp = true;
                self.advance_byte();
                if matches!(self.peek_byte(), Some(b'+' | b'-')) {
                    self.advance_byte();
                }
                self.skip_digit_run(10);
            }
        }

        if self.pos == mantissa_start && !has_point {
            return Err(ParserError::new(ParserStatus::NumericLiteralInvalid, sloc));
        }

        if self.peek_byte().is_some_and(|b| b == b'_' || b.is_ascii_alphabetic()) {
            return Err(ParserError::new(ParserStatus::NumericLiteralSuffixInvalid, sloc));
        }

        let raw: String = self.text[start..self.pos].chars().filter(|c| *c != '`').collect();

        if !has_point && !has_exp && !opts.integers_as_reals {
            let digits = &raw[if radix != 10 { 2 } else { 0 }..];
            let value = i64::from_str_radix(digits, radix)
                .map_err(|_| ParserError::new(ParserStatus::IntegerLiteralOverflow, sloc.clone()))?;
            Ok(TokenKind::Integer(value))
        } else {
            let value = parse_real_literal(&raw, radix)
                .ok_or_else(|| ParserError::new(ParserStatus::RealLiteralOverflow, sloc.clone()))?;
            if value.is_infinite() {
                return Err(ParserError::new(ParserStatus::RealLiteralOverflow, sloc));
            }
            Ok(TokenKind::Real(value))
        }
    }

    fn skip_digit_run(&mut self, radix: u32) {
        let mut last_was_digit = false;
        loop {
            match self.peek_byte() {
                Some(b) if is_radix_digit(b, radix) => {
                    self.advance_byte();
                    last_was_digit = true;
                }
                Some(b'`') if last_was_digit && self.peek_at(1).is_some_and(|n| is_radix_digit(n, radix)) => {
                    self.advance_byte();
                    last_was_digit = false;
                }
                _ => break,
            }
        }
    }

    fn lex_string(&mut self, quote: u8, opts: &CompilerOptions) -> ParserResult<TokenKind> {
        let mut out = String::new();
        loop {
            out.push_str(&self.lex_string_segment(quote, opts)?);
            // Adjacent string literals concatenate.
            let save = self.pos;
            let save_line = self.line;
            let save_col = self.column;
            self.skip_trivia().ok();
            if matches!(self.peek_byte(), Some(b'"' | b'\'')) {
                continue;
            }
            self.pos = save;
            self.line = save_line;
            self.column = save_col;
            break;
        }
        Ok(TokenKind::String(out))
    }

    fn lex_string_segment(&mut self, quote: u8, opts: &CompilerOptions) -> ParserResult<String> {
        let start_sloc = self.sloc();
        self.advance_byte();
        let escapes_enabled = quote == b'"' || opts.escapable_single_quotes;
        let mut out = String::new();
        loop {
            match self.peek_byte() {
                None => return Err(ParserError::new(ParserStatus::StringLiteralUnclosed, start_sloc)),
                Some(b) if b == quote => {
                    self.advance_byte();
                    return Ok(out);
                }
                Some(b'\\') if escapes_enabled => {
                    self.advance_byte();
                    out.push(self.lex_escape()?);
                }
                Some(_) => {
                    let ch_start = self.pos;
                    let ch = self.rest().chars().next().ok_or_else(|| {
                        ParserError::new(ParserStatus::Utf8SequenceInvalid, self.sloc())
                    })?;
                    if ch == '\0' {
                        return Err(ParserError::new(ParserStatus::NullCharacterDisallowed, self.sloc()));
                    }
                    for _ in 0..ch.len_utf8() {
                        self.advance_byte();
                    }
                    out.push_str(&self.text[ch_start..self.pos]);
                }
            }
        }
    }

    fn lex_escape(&mut self) -> ParserResult<char> {
        let sloc = self.sloc();
        let b = self.peek_byte().ok_or_else(|| ParserError::new(ParserStatus::EscapeSequenceIncomplete, sloc.clone()))?;
        match b {
            b'a' => {
                self.advance_byte();
                Ok('\u{07}')
            }
            b'b' => {
                self.advance_byte();
                Ok('\u{08}')
            }
            b'f' => {
                self.advance_byte();
                Ok('\u{0C}')
            }
            b'n' => {
                self.advance_byte();
                Ok('\n')
            }
            b'r' => {
                self.advance_byte();
                Ok('\r')
            }
            b't' => {
                self.advance_byte();
                Ok('\t')
            }
            b'v' => {
                self.advance_byte();
                Ok('\u{0B}')
            }
            b'0' => {
                self.advance_byte();
                Ok('\0')
            }
            b'Z' => {
                self.advance_byte();
                Ok('\u{1A}')
            }
            b'e' => {
                self.advance_byte();
                Ok('\u{1B}')
            }
            b'\\' => {
                self.advance_byte();
                Ok('\\')
            }
            b'\'' => {
                self.advance_byte();
                Ok('\'')
            }
            b'"' => {
                self.advance_byte();
                Ok('"')
            }
            b'?' => {
                self.advance_byte();
                Ok('?')
            }
            b'/' => {
                self.advance_byte();
                Ok('/')
            }
            b'x' => {
                self.advance_byte();
                let v = self.lex_hex_digits(2, sloc.clone())?;
                Ok(v as u8 as char)
            }
            b'u' => {
                self.advance_byte();
                let v = self.lex_hex_digits(4, sloc)?;
                char::from_u32(v).ok_or_else(|| ParserError::new(ParserStatus::EscapeUtfCodePointInvalid, self.sloc()))
            }
            b'U' => {
                self.advance_byte();
                let v = self.lex_hex_digits(6, sloc)?;
                char::from_u32(v).ok_or_else(|| ParserError::new(ParserStatus::EscapeUtfCodePointInvalid, self.sloc()))
            }
            _ => Err(ParserError::new(ParserStatus::EscapeSequenceUnknown, sloc)),
        }
    }

    fn lex_hex_digits(&mut self, count: usize, sloc: SourceLocation) -> ParserResult<u32> {
        let start = self.pos;
        for _ in 0..count {
            match self.peek_byte() {
                Some(b) if b.is_ascii_hexdigit() => self.advance_byte(),
                _ => return Err(ParserError::new(ParserStatus::EscapeSequenceIncomplete, sloc)),
            }
        }
        u32::from_str_radix(&self.text[start..self.pos], 16)
            .map_err(|_| ParserError::new(ParserStatus::EscapeSequenceInvalidHex, sloc))
    }
}

fn is_radix_digit(b: u8, radix: u32) -> bool {
    match radix {
        2 => matches!(b, b'0' | b'1'),
        16 => b.is_ascii_hexdigit(),
        _ => b.is_ascii_digit(),
    }
}

/// Parses a (possibly hex) floating-point literal with an explicit radix.
///
/// Decimal literals are handed to `f64::from_str`. Hexadecimal literals
/// (`0x1.8p3`-style) are assembled manually since Rust's standard parser
/// does not accept the `0x`/`p` hex-float syntax.
fn parse_real_literal(raw: &str, radix: u32) -> Option<f64> {
    if radix == 10 {
        return raw.parse::<f64>().ok();
    }
    debug_assert_eq!(radix, 16);
    let body = &raw[2..]; // strip "0x"/"0X"
    let (mantissa, exp) = match body.find(['p', 'P']) {
        Some(idx) => (&body[..idx], body[idx + 1..].parse::<i32>().ok()?),
        None => (body, 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(idx) => (&mantissa[..idx], &mantissa[idx + 1..]),
        None => (mantissa, ""),
    };
    let mut value = 0.0f64;
    for c in int_part.chars() {
        value = value * 16.0 + c.to_digit(16)? as f64;
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        value += c.to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }
    Some(value * 2f64.powi(exp))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(src: &str) -> Vec<TokenKind> {
        let opts = CompilerOptions::default();
        let mut stream = TokenStream::tokenize("test", 1, src, &opts).unwrap();
        let mut out = Vec::new();
        while let Some(tok) = stream.pop() {
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn skips_comments_and_shebang() {
        let toks = tokenize("#!/usr/bin/asteria\n// hi\n/* block \n comment */ 1");
        assert_eq!(toks, vec![TokenKind::Integer(1)]);
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let toks = tokenize("var x = func");
        assert_eq!(
            toks,
            vec![
                TokenKind::Keyword(Keyword::Var),
                TokenKind::Identifier("x".into()),
                TokenKind::Punctuator(Punctuator::Assign),
                TokenKind::Keyword(Keyword::Func),
            ]
        );
    }

    #[test]
    fn lexes_integer_and_real_literals() {
        assert_eq!(tokenize("42"), vec![TokenKind::Integer(42)]);
        assert_eq!(tokenize("0x2a"), vec![TokenKind::Integer(42)]);
        assert_eq!(tokenize("1`000`000"), vec![TokenKind::Integer(1_000_000)]);
        assert_eq!(tokenize("3.5"), vec![TokenKind::Real(3.5)]);
        assert_eq!(tokenize("1e3"), vec![TokenKind::Real(1000.0)]);
    }

    #[test]
    fn hex_float_matches_expected_value() {
        assert_eq!(tokenize("0x1.8p1"), vec![TokenKind::Real(3.0)]);
    }

    #[test]
    fn string_escapes_and_concatenation() {
        assert_eq!(
            tokenize(r#""a\n" "b""#),
            vec![TokenKind::String("a\nb".to_owned())]
        );
        assert_eq!(tokenize(r#""é""#), vec![TokenKind::String("é".to_owned())]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let opts = CompilerOptions::default();
        let err = TokenStream::tokenize("t", 1, "\"abc", &opts).unwrap_err();
        assert_eq!(err.status(), ParserStatus::StringLiteralUnclosed);
    }

    #[test]
    fn longest_punctuator_match_in_context() {
        let toks = tokenize("a <<<= b");
        assert!(toks.contains(&TokenKind::Punctuator(Punctuator::SllAssign)));
    }
}
