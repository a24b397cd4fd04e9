//! LSP textDocument/definition implementation.
//!
//! Finds the identifier token under the cursor, resolves it through the
//! scope-aware symbol table, and returns the definition token's span.

use cal_common::span::Span;
use cal_common::token::TokenKind;

use crate::analysis::AnalysisResult;

/// The byte span of the definition of the identifier at `offset`, or
/// `None` when the cursor is not on a resolvable identifier.
pub fn find_definition(analysis: &AnalysisResult, offset: usize) -> Option<Span> {
    let offset = offset as u32;
    let token = analysis.parse.tokens.iter().find(|t| {
        matches!(t.kind, TokenKind::Identifier | TokenKind::QuotedIdentifier)
            && t.span.contains(offset)
    })?;

    let symbol = analysis.symbols.get_symbol_at_offset(&token.value, offset)?;

    // Clicking the definition itself is not a navigation.
    if symbol.definition_token.span == token.span {
        return None;
    }
    Some(symbol.definition_token.span)
}
