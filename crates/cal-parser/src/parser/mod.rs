//! Recursive-descent parser for C/AL.
//!
//! The parser owns the token vector, a cursor index, and a diagnostic
//! vector. It never aborts: ill-formed input produces diagnostics plus
//! whatever partial nodes could be recovered, and parsing resumes at the
//! next synchronization point (`;`, `END`, `BEGIN`, a section keyword, a
//! procedure keyword, or the enclosing `}`).
//!
//! Lookahead transparently skips trivia (whitespace, newlines, comments,
//! and `Unknown` tokens -- the lexer's error recoveries, which are
//! reported once up front and then ignored structurally). The few
//! newline-sensitive spots in the grammar (object names, procedure
//! header terminators) read the raw token stream instead.

pub(crate) mod code;
pub(crate) mod controls;
pub(crate) mod expressions;
pub(crate) mod fields;
pub(crate) mod object;
pub(crate) mod properties;
pub(crate) mod statements;
pub(crate) mod types;

use cal_common::diagnostic::Diagnostic;
use cal_common::token::{Token, TokenKind};

use crate::ast::Document;

/// Recursion ceiling for nested statements/expressions inside the
/// parser itself (the AST walker applies its own, looser limit).
const MAX_PARSE_DEPTH: u32 = 200;

/// The result of parsing one source file.
#[derive(Debug, Clone)]
pub struct Parse {
    pub document: Document,
    /// The full token stream, trivia included.
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Parse {
    /// Whether any error-severity diagnostic was produced.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

/// Lex and parse a source string.
pub fn parse(source: &str) -> Parse {
    let tokens = cal_lexer::Lexer::tokenize(source);
    let (document, diagnostics) = parse_tokens(tokens.clone());
    Parse {
        document,
        tokens,
        diagnostics,
    }
}

/// Parse an already-lexed token stream.
pub fn parse_tokens(tokens: Vec<Token>) -> (Document, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens);
    let document = object::parse_document(&mut parser);
    (document, parser.diagnostics)
}

/// Parser state: token vector, cursor, diagnostics, recursion guard.
pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Index of the most recently consumed token (for node end tokens).
    prev: Option<usize>,
    /// Fallback token returned when lookahead runs off the end.
    eof: Token,
    pub(crate) diagnostics: Vec<Diagnostic>,
    nest: u32,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        let eof = match tokens.last() {
            Some(t) if t.kind == TokenKind::Eof => t.clone(),
            Some(t) => Token::new(
                TokenKind::Eof,
                "",
                t.line,
                t.column,
                t.span.end,
                t.span.end,
            ),
            None => Token::new(TokenKind::Eof, "", 1, 1, 0, 0),
        };

        let mut diagnostics = Vec::new();
        for token in &tokens {
            if token.kind == TokenKind::Unknown {
                diagnostics.push(Diagnostic::error(
                    "invalid or unterminated token",
                    token.clone(),
                ));
            }
        }

        Self {
            tokens,
            pos: 0,
            prev: None,
            eof,
            diagnostics,
            nest: 0,
        }
    }

    // ── Lookahead ──────────────────────────────────────────────────────

    fn significant_from(&self, mut i: usize) -> usize {
        while i < self.tokens.len() && self.tokens[i].is_trivia() {
            i += 1;
        }
        i
    }

    /// The current significant token (`Eof` when exhausted).
    pub(crate) fn peek(&self) -> &Token {
        let i = self.significant_from(self.pos);
        self.tokens.get(i).unwrap_or(&self.eof)
    }

    /// The Nth significant token ahead; `peek_nth(0)` == `peek()`.
    pub(crate) fn peek_nth(&self, n: usize) -> &Token {
        let mut i = self.significant_from(self.pos);
        for _ in 0..n {
            if i >= self.tokens.len() {
                break;
            }
            i = self.significant_from(i + 1);
        }
        self.tokens.get(i).unwrap_or(&self.eof)
    }

    /// The current raw token, trivia included.
    pub(crate) fn peek_raw(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    pub(crate) fn kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    /// Whether the current token is an identifier with the given text,
    /// compared case-insensitively.
    pub(crate) fn at_ident(&self, text: &str) -> bool {
        let t = self.peek();
        t.kind == TokenKind::Identifier && t.value.eq_ignore_ascii_case(text)
    }

    /// The most recently consumed token; used as node end token.
    pub(crate) fn prev_token(&self) -> Token {
        match self.prev {
            Some(i) => self.tokens[i].clone(),
            None => self.eof.clone(),
        }
    }

    // ── Consumption ────────────────────────────────────────────────────

    /// Consume and return the current significant token.
    pub(crate) fn bump(&mut self) -> Token {
        let i = self.significant_from(self.pos);
        match self.tokens.get(i) {
            Some(t) => {
                let t = t.clone();
                self.prev = Some(i);
                self.pos = i + 1;
                t
            }
            None => {
                self.pos = self.tokens.len();
                self.eof.clone()
            }
        }
    }

    /// Consume the current raw token, trivia included.
    pub(crate) fn bump_raw(&mut self) -> Token {
        match self.tokens.get(self.pos) {
            Some(t) => {
                let t = t.clone();
                if !t.is_trivia() {
                    self.prev = Some(self.pos);
                }
                self.pos += 1;
                t
            }
            None => self.eof.clone(),
        }
    }

    /// If the current token matches, consume it.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            None
        }
    }

    /// Consume a token of the given kind or report `expected {what}`.
    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            self.error(format!("expected {what}"));
            None
        }
    }

    // ── Diagnostics ────────────────────────────────────────────────────

    /// Record an error at the current token.
    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let token = self.peek().clone();
        self.diagnostics.push(Diagnostic::error(message, token));
    }

    /// Record an error at a specific token.
    pub(crate) fn error_at(&mut self, message: impl Into<String>, token: Token) {
        self.diagnostics.push(Diagnostic::error(message, token));
    }

    /// Record a warning at a specific token.
    pub(crate) fn warning_at(&mut self, message: impl Into<String>, token: Token) {
        self.diagnostics.push(Diagnostic::warning(message, token));
    }

    // ── Token capture ──────────────────────────────────────────────────

    /// Index of the next significant token; pass to [`Parser::tokens_since`]
    /// to capture everything consumed after this point.
    pub(crate) fn mark(&self) -> usize {
        self.significant_from(self.pos)
    }

    /// The significant tokens consumed since `mark`.
    pub(crate) fn tokens_since(&self, mark: usize) -> Vec<Token> {
        let end = self.pos.min(self.tokens.len());
        self.tokens[mark.min(end)..end]
            .iter()
            .filter(|t| !t.is_trivia())
            .cloned()
            .collect()
    }

    // ── Recovery ───────────────────────────────────────────────────────

    /// Skip tokens until one of the stop kinds (or `Eof`). The stop token
    /// itself is not consumed.
    pub(crate) fn skip_until(&mut self, stops: &[TokenKind]) {
        while !self.at_eof() && !stops.contains(&self.kind()) {
            self.bump();
        }
    }

    /// Skip a balanced `{ ... }` run, assuming the cursor is at the
    /// opening brace. Stops at `Eof` if the run never balances.
    pub(crate) fn skip_balanced_braces(&mut self) {
        if !self.at(TokenKind::LeftBrace) {
            return;
        }
        let mut depth = 0u32;
        while !self.at_eof() {
            match self.kind() {
                TokenKind::LeftBrace => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::RightBrace => {
                    self.bump();
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    // ── Recursion guard ────────────────────────────────────────────────

    /// Enter one nesting level; reports an error and refuses at the cap.
    pub(crate) fn enter(&mut self) -> bool {
        if self.nest >= MAX_PARSE_DEPTH {
            self.error("construct is nested too deeply");
            false
        } else {
            self.nest += 1;
            true
        }
    }

    pub(crate) fn leave(&mut self) {
        self.nest = self.nest.saturating_sub(1);
    }
}

// ── Token reassembly ───────────────────────────────────────────────────

/// Whether any source bytes separate two adjacent tokens. This one
/// helper backs both the `=}` empty-value rule and gap-aware name
/// reassembly.
pub(crate) fn has_gap(a: &Token, b: &Token) -> bool {
    b.span.start > a.span.end
}

/// Join token display values, inserting a single space wherever the
/// source had any gap at all.
pub(crate) fn reassemble_display(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(p) = prev {
            if has_gap(p, token) {
                out.push(' ');
            }
        }
        out.push_str(&token.display_value());
        prev = Some(token);
    }
    out
}

/// Join token display values preserving the exact width of inter-token
/// gaps; used for unquoted multi-token object and field names.
pub(crate) fn reassemble_exact(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for token in tokens {
        if let Some(p) = prev {
            let gap = token.span.start.saturating_sub(p.span.end);
            for _ in 0..gap {
                out.push(' ');
            }
        }
        out.push_str(&token.display_value());
        prev = Some(token);
    }
    out
}
