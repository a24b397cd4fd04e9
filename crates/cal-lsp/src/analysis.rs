//! Document analysis: lex, parse, build symbols, and produce LSP
//! diagnostics.
//!
//! This module bridges the C/AL front end (lexer + parser + symbol
//! table) with the LSP protocol. It converts byte-offset spans into LSP
//! line/character positions (0-based, UTF-16 code units per the LSP
//! spec) and translates core diagnostics into `lsp_types::Diagnostic`.

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use cal_analysis::SymbolTable;
use cal_common::diagnostic::Severity;
use cal_common::span::LineIndex;
use cal_parser::walk::{Visitor, Walker};

/// The result of analyzing a C/AL document.
pub struct AnalysisResult {
    /// LSP diagnostics (lexical, syntactic, structural).
    pub diagnostics: Vec<Diagnostic>,
    /// The parse result, kept for further queries.
    pub parse: cal_parser::Parse,
    /// The symbol table, kept for completion/definition/hover queries.
    pub symbols: SymbolTable,
}

/// A visitor that changes nothing; used to drive the depth check.
struct DepthProbe;

impl Visitor for DepthProbe {}

/// Analyze a C/AL document. Main entry point for didOpen/didChange.
pub fn analyze_document(_uri: &str, source: &str) -> AnalysisResult {
    let parse = cal_parser::parse(source);
    let symbols = SymbolTable::build(&parse.document);

    // The walker's depth ceiling guards every downstream traversal; run
    // it once here so pathological nesting surfaces as a diagnostic.
    let mut walker = Walker::new();
    walker.walk(&parse.document, &mut DepthProbe);

    let mut diagnostics = Vec::new();
    for diagnostic in parse.diagnostics.iter().chain(walker.diagnostics()) {
        let start = offset_to_position(source, diagnostic.token.span.start as usize);
        let end = offset_to_position(source, diagnostic.token.span.end as usize);
        diagnostics.push(Diagnostic {
            range: Range::new(start, end),
            severity: Some(match diagnostic.severity {
                Severity::Error => DiagnosticSeverity::ERROR,
                Severity::Warning => DiagnosticSeverity::WARNING,
            }),
            source: Some("cal".to_string()),
            message: diagnostic.message.clone(),
            ..Default::default()
        });
    }

    AnalysisResult {
        diagnostics,
        parse,
        symbols,
    }
}

/// Convert a byte offset to an LSP Position (0-based line, 0-based
/// UTF-16 character offset).
///
/// The line comes from a [`LineIndex`] over the source; the character
/// re-counts the line prefix in UTF-16 code units as the LSP spec
/// requires.
pub fn offset_to_position(source: &str, offset: usize) -> Position {
    let offset = offset.min(source.len());
    let index = LineIndex::new(source);
    let (line, _) = index.line_col(offset as u32);
    let line_start = index.line_start(line).unwrap_or(0) as usize;

    let character: u32 = source[line_start..offset]
        .chars()
        .map(|c| c.len_utf16() as u32)
        .sum();

    Position {
        line: line - 1,
        character,
    }
}

/// Convert an LSP Position back to a byte offset in the source.
///
/// Returns `None` when the line does not exist. A character offset past
/// the end of its line clamps to the line break (or end of input).
pub fn position_to_offset(source: &str, position: &Position) -> Option<usize> {
    let index = LineIndex::new(source);
    let line_start = index.line_start(position.line + 1)? as usize;

    let mut utf16_offset = 0u32;
    for (byte_idx, c) in source[line_start..].char_indices() {
        if utf16_offset >= position.character || c == '\n' {
            return Some(line_start + byte_idx);
        }
        utf16_offset += c.len_utf16() as u32;
    }
    Some(source.len())
}
