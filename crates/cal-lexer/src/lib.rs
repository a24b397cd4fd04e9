//! C/AL lexer -- tokenizer for Dynamics NAV C/AL source text.
//!
//! The lexer is a single forward pass over the source. Every byte of the
//! input ends up inside exactly one token (whitespace, newlines, and
//! comments are tokens too), so concatenating the token spans reproduces
//! the input byte-for-byte. Malformed input never aborts the pass: it
//! becomes an `Unknown` token and lexing resumes after it.
//!
//! # Braces
//!
//! C/AL uses `{` `}` both as object/section/row delimiters and as block
//! comments inside statement blocks. The lexer resolves the ambiguity with
//! a statement-block depth counter: `BEGIN` and `CASE` push, `END` pops.
//! At depth zero braces are punctuation; at positive depth `{` opens a
//! nested block comment. A bare `}` met at positive depth closes the
//! surrounding section, so it resets the counter (the count can only be
//! elevated there when a keyword-shaped word appeared in display text).

mod cursor;

use cal_common::token::{keyword_from_str, Token, TokenKind};
use cursor::Cursor;

/// The C/AL lexer. Converts source text into a stream of tokens.
///
/// Wraps a [`Cursor`] for byte-level iteration and implements
/// `Iterator<Item = Token>` so callers can consume tokens lazily or
/// collect them into a `Vec`.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    /// `BEGIN`/`CASE` .. `END` nesting depth; decides brace meaning.
    block_depth: u32,
    /// Whether we have already emitted the `Eof` token.
    emitted_eof: bool,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            block_depth: 0,
            emitted_eof: false,
        }
    }

    /// Tokenize the entire source into a `Vec<Token>`, trivia included.
    ///
    /// The returned vector always ends with an `Eof` token.
    pub fn tokenize(source: &str) -> Vec<Token> {
        Lexer::new(source).collect()
    }

    /// Tokenize and drop whitespace, newline, and comment tokens.
    ///
    /// `Unknown` tokens are kept so consumers can still report them.
    pub fn tokenize_significant(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .filter(|t| {
                !matches!(
                    t.kind,
                    TokenKind::Whitespace | TokenKind::NewLine | TokenKind::Comment
                )
            })
            .collect()
    }

    // ── Token production ───────────────────────────────────────────────

    fn produce_token(&mut self) -> Token {
        let start = self.cursor.pos();
        let line = self.cursor.line();
        let column = self.cursor.column();

        let Some(c) = self.cursor.peek() else {
            return Token::new(TokenKind::Eof, "", line, column, start, start);
        };

        match c {
            // ── Newlines ───────────────────────────────────────────────
            '\n' => {
                self.cursor.advance();
                self.finish(TokenKind::NewLine, start, line, column)
            }
            '\r' => {
                self.cursor.advance();
                // \r\n = single NewLine token
                if self.cursor.peek() == Some('\n') {
                    self.cursor.advance();
                }
                self.finish(TokenKind::NewLine, start, line, column)
            }

            // ── Whitespace runs (newlines are separate tokens) ─────────
            c if is_inline_whitespace(c) => {
                self.cursor.eat_while(is_inline_whitespace);
                self.finish(TokenKind::Whitespace, start, line, column)
            }

            // ── Comments and division ──────────────────────────────────
            '/' => {
                self.cursor.advance();
                match self.cursor.peek() {
                    Some('/') => {
                        self.cursor.eat_while(|c| c != '\n' && c != '\r');
                        self.finish(TokenKind::Comment, start, line, column)
                    }
                    Some('=') => {
                        self.cursor.advance();
                        self.finish(TokenKind::SlashAssign, start, line, column)
                    }
                    _ => self.finish(TokenKind::Slash, start, line, column),
                }
            }

            // ── Braces: delimiter or block comment ─────────────────────
            '{' => {
                if self.block_depth > 0 {
                    self.lex_brace_comment(start, line, column)
                } else {
                    self.cursor.advance();
                    self.finish(TokenKind::LeftBrace, start, line, column)
                }
            }
            '}' => {
                self.cursor.advance();
                // A structural close brace means any elevated statement
                // depth was a miscount from keyword-shaped display text.
                self.block_depth = 0;
                self.finish(TokenKind::RightBrace, start, line, column)
            }

            // ── Quoted identifiers and string literals ─────────────────
            '"' => self.lex_quoted_identifier(start, line, column),
            '\'' => self.lex_string(start, line, column),

            // ── Numbers ────────────────────────────────────────────────
            '0'..='9' => self.lex_number(start, line, column),

            // ── Identifiers and keywords ───────────────────────────────
            c if is_ident_start(c) => self.lex_ident(start, line, column),

            // ── Multi-character operators ──────────────────────────────
            ':' => {
                self.cursor.advance();
                match self.cursor.peek() {
                    Some('=') => {
                        self.cursor.advance();
                        self.finish(TokenKind::Assign, start, line, column)
                    }
                    Some(':') => {
                        self.cursor.advance();
                        self.finish(TokenKind::ColonColon, start, line, column)
                    }
                    _ => self.finish(TokenKind::Colon, start, line, column),
                }
            }
            '+' => self.lex_op_maybe_assign(TokenKind::Plus, TokenKind::PlusAssign, start, line, column),
            '-' => self.lex_op_maybe_assign(TokenKind::Minus, TokenKind::MinusAssign, start, line, column),
            '*' => self.lex_op_maybe_assign(TokenKind::Star, TokenKind::StarAssign, start, line, column),
            '<' => {
                self.cursor.advance();
                match self.cursor.peek() {
                    Some('=') => {
                        self.cursor.advance();
                        self.finish(TokenKind::LessEqual, start, line, column)
                    }
                    Some('>') => {
                        self.cursor.advance();
                        self.finish(TokenKind::NotEqual, start, line, column)
                    }
                    _ => self.finish(TokenKind::Less, start, line, column),
                }
            }
            '>' => {
                self.cursor.advance();
                if self.cursor.peek() == Some('=') {
                    self.cursor.advance();
                    self.finish(TokenKind::GreaterEqual, start, line, column)
                } else {
                    self.finish(TokenKind::Greater, start, line, column)
                }
            }
            '.' => {
                self.cursor.advance();
                if self.cursor.peek() == Some('.') {
                    self.cursor.advance();
                    self.finish(TokenKind::DotDot, start, line, column)
                } else {
                    self.finish(TokenKind::Dot, start, line, column)
                }
            }

            // ── Single-character tokens ────────────────────────────────
            '=' => self.single(TokenKind::Equal, start, line, column),
            ',' => self.single(TokenKind::Comma, start, line, column),
            ';' => self.single(TokenKind::Semicolon, start, line, column),
            '(' => self.single(TokenKind::LeftParen, start, line, column),
            ')' => self.single(TokenKind::RightParen, start, line, column),
            '[' => self.single(TokenKind::LeftBracket, start, line, column),
            ']' => self.single(TokenKind::RightBracket, start, line, column),
            '@' => self.single(TokenKind::At, start, line, column),

            // ── Anything else (error recovery) ─────────────────────────
            _ => {
                self.cursor.advance();
                self.finish(TokenKind::Unknown, start, line, column)
            }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────────

    /// Build a token whose value is the consumed source slice.
    fn finish(&self, kind: TokenKind, start: u32, line: u32, column: u32) -> Token {
        let end = self.cursor.pos();
        Token::new(kind, self.cursor.slice(start, end), line, column, start, end)
    }

    /// Consume one character and return a token of the given kind.
    fn single(&mut self, kind: TokenKind, start: u32, line: u32, column: u32) -> Token {
        self.cursor.advance();
        self.finish(kind, start, line, column)
    }

    /// `X` or `X=` where `X=` is a compound assignment operator.
    fn lex_op_maybe_assign(
        &mut self,
        plain: TokenKind,
        assign: TokenKind,
        start: u32,
        line: u32,
        column: u32,
    ) -> Token {
        self.cursor.advance();
        if self.cursor.peek() == Some('=') {
            self.cursor.advance();
            self.finish(assign, start, line, column)
        } else {
            self.finish(plain, start, line, column)
        }
    }

    // ── Brace block comments ───────────────────────────────────────────

    /// Lex a nested `{ ... }` block comment. Called only at positive
    /// statement-block depth. An unterminated run becomes one `Unknown`
    /// token spanning to end of input.
    fn lex_brace_comment(&mut self, start: u32, line: u32, column: u32) -> Token {
        self.cursor.advance(); // consume '{'
        let mut depth: u32 = 1;

        loop {
            match self.cursor.peek() {
                None => {
                    return self.finish(TokenKind::Unknown, start, line, column);
                }
                Some('{') => {
                    self.cursor.advance();
                    depth += 1;
                }
                Some('}') => {
                    self.cursor.advance();
                    depth -= 1;
                    if depth == 0 {
                        return self.finish(TokenKind::Comment, start, line, column);
                    }
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    // ── Quoted identifiers ─────────────────────────────────────────────

    /// Lex a `"`-delimited identifier. Any character except `"` is legal
    /// inside. An unterminated identifier closes at the next newline or
    /// end of input as an `Unknown` token.
    fn lex_quoted_identifier(&mut self, start: u32, line: u32, column: u32) -> Token {
        self.cursor.advance(); // consume opening '"'

        loop {
            match self.cursor.peek() {
                None | Some('\n') | Some('\r') => {
                    return self.finish(TokenKind::Unknown, start, line, column);
                }
                Some('"') => {
                    self.cursor.advance();
                    let end = self.cursor.pos();
                    // Value excludes the quotes; the span includes them.
                    let value = self.cursor.slice(start + 1, end - 1);
                    return Token::new(
                        TokenKind::QuotedIdentifier,
                        value,
                        line,
                        column,
                        start,
                        end,
                    );
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    // ── String literals ────────────────────────────────────────────────

    /// Lex a `'`-delimited string. Two adjacent `'` inside mean a literal
    /// single quote. Unterminated strings close at the next newline or
    /// end of input as an `Unknown` token.
    fn lex_string(&mut self, start: u32, line: u32, column: u32) -> Token {
        self.cursor.advance(); // consume opening '\''

        loop {
            match self.cursor.peek() {
                None | Some('\n') | Some('\r') => {
                    return self.finish(TokenKind::Unknown, start, line, column);
                }
                Some('\'') => {
                    self.cursor.advance();
                    if self.cursor.peek() == Some('\'') {
                        // Escaped quote, keep scanning.
                        self.cursor.advance();
                    } else {
                        return self.finish(TokenKind::String, start, line, column);
                    }
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }

    // ── Numbers ────────────────────────────────────────────────────────

    /// Lex an integer or decimal literal. A `.` continues the number only
    /// when another digit follows, so `1..5` stays `1` `..` `5`.
    fn lex_number(&mut self, start: u32, line: u32, column: u32) -> Token {
        self.cursor.eat_while(|c| c.is_ascii_digit());

        if self.cursor.peek() == Some('.')
            && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            self.cursor.advance(); // consume '.'
            self.cursor.eat_while(|c| c.is_ascii_digit());
            return self.finish(TokenKind::Decimal, start, line, column);
        }

        self.finish(TokenKind::Integer, start, line, column)
    }

    // ── Identifiers, keywords, date/time literals ──────────────────────

    /// Lex an identifier-shaped token. Handles the three special suffixes:
    /// `D'...'`/`T'...'`/`DT'...'` date-time literals, the legacy `@NNN`
    /// serialization id (consumed, excluded from the value), and promotion
    /// to a keyword kind via the case-insensitive keyword table.
    fn lex_ident(&mut self, start: u32, line: u32, column: u32) -> Token {
        self.cursor.advance(); // consume first char
        self.cursor.eat_while(is_ident_continue);
        let text = self.cursor.slice(start, self.cursor.pos());

        // Date/time/datetime literal prefix directly followed by a quote.
        if self.cursor.peek() == Some('\'') {
            let kind = if text.eq_ignore_ascii_case("d") {
                Some(TokenKind::Date)
            } else if text.eq_ignore_ascii_case("t") {
                Some(TokenKind::Time)
            } else if text.eq_ignore_ascii_case("dt") {
                Some(TokenKind::DateTime)
            } else {
                None
            };
            if let Some(kind) = kind {
                return self.lex_quoted_tail(kind, start, line, column);
            }
        }

        // Legacy `@NNN` suffix: consume it, keep only the name as value.
        if self.cursor.peek() == Some('@')
            && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            let name_end = self.cursor.pos();
            self.cursor.advance(); // consume '@'
            // A negative id (`@-1`) appears on some generated symbols.
            if self.cursor.peek() == Some('-') {
                self.cursor.advance();
            }
            self.cursor.eat_while(|c| c.is_ascii_digit());
            let end = self.cursor.pos();
            let value = self.cursor.slice(start, name_end);
            return Token::new(TokenKind::Identifier, value, line, column, start, end);
        }

        let kind = keyword_from_str(text).unwrap_or(TokenKind::Identifier);
        match kind {
            TokenKind::Begin | TokenKind::Case => self.block_depth += 1,
            TokenKind::End => self.block_depth = self.block_depth.saturating_sub(1),
            _ => {}
        }
        self.finish(kind, start, line, column)
    }

    /// Lex the `'...'` tail of a date/time/datetime literal. Unterminated
    /// tails degrade to `Unknown`.
    fn lex_quoted_tail(&mut self, kind: TokenKind, start: u32, line: u32, column: u32) -> Token {
        self.cursor.advance(); // consume opening '\''
        loop {
            match self.cursor.peek() {
                None | Some('\n') | Some('\r') => {
                    return self.finish(TokenKind::Unknown, start, line, column);
                }
                Some('\'') => {
                    self.cursor.advance();
                    return self.finish(kind, start, line, column);
                }
                Some(_) => {
                    self.cursor.advance();
                }
            }
        }
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.emitted_eof {
            return None;
        }
        let token = self.produce_token();
        if token.kind == TokenKind::Eof {
            self.emitted_eof = true;
        }
        Some(token)
    }
}

/// Whitespace that stays inside a `Whitespace` token (newlines are their
/// own token kind).
fn is_inline_whitespace(c: char) -> bool {
    c != '\n' && c != '\r' && c.is_whitespace()
}

/// Whether a character can start an identifier.
fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Whether a character can continue an identifier.
fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
