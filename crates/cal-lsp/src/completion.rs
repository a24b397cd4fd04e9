//! LSP textDocument/completion implementation.
//!
//! Provides three tiers of completions:
//! 1. **Keywords** -- the C/AL keyword set, upper-cased as NAV writes them
//! 2. **Built-in types** -- common data type names
//! 3. **Scope-aware symbols** -- fields, variables, parameters, and
//!    procedures visible at the cursor offset
//!
//! Results are filtered by the identifier prefix left of the cursor.

use tower_lsp::lsp_types::{CompletionItem, CompletionItemKind, Position};

use cal_analysis::SymbolKind;

use crate::analysis::{position_to_offset, AnalysisResult};

/// The C/AL keywords, in the upper-case form NAV exports use.
const KEYWORDS: &[&str] = &[
    "AND", "ARRAY", "BEGIN", "CASE", "DIV", "DO", "DOWNTO", "ELSE", "END", "EVENT", "EXIT",
    "FALSE", "FOR", "IF", "IN", "INTERNAL", "LOCAL", "MOD", "NOT", "OBJECT", "OF", "OR",
    "PROCEDURE", "REPEAT", "TEMPORARY", "THEN", "TO", "TRIGGER", "TRUE", "UNTIL", "VAR",
    "WHILE", "WITH", "XOR",
];

/// Data type names commonly used in declarations.
const BUILTIN_TYPES: &[&str] = &[
    "Boolean", "Code", "Date", "DateFormula", "DateTime", "Decimal", "Dialog", "DotNet",
    "Duration", "GUID", "Integer", "Option", "Record", "RecordID", "RecordRef", "Text",
    "Time", "Variant",
];

/// Compute completion items at the given position.
pub fn compute_completions(
    source: &str,
    analysis: &AnalysisResult,
    position: &Position,
) -> Vec<CompletionItem> {
    let Some(offset) = position_to_offset(source, position) else {
        return Vec::new();
    };
    let prefix = extract_prefix(source, offset);

    let mut items = Vec::new();

    for keyword in KEYWORDS {
        if matches_prefix(keyword, &prefix) {
            items.push(CompletionItem {
                label: (*keyword).to_string(),
                kind: Some(CompletionItemKind::KEYWORD),
                ..Default::default()
            });
        }
    }

    for type_name in BUILTIN_TYPES {
        if matches_prefix(type_name, &prefix) {
            items.push(CompletionItem {
                label: (*type_name).to_string(),
                kind: Some(CompletionItemKind::CLASS),
                ..Default::default()
            });
        }
    }

    for symbol in analysis.symbols.symbols_in_scope_at(offset as u32) {
        if !matches_prefix(&symbol.name, &prefix) {
            continue;
        }
        items.push(CompletionItem {
            label: symbol.name.clone(),
            kind: Some(match symbol.kind {
                SymbolKind::Field => CompletionItemKind::FIELD,
                SymbolKind::Variable | SymbolKind::Parameter => CompletionItemKind::VARIABLE,
                SymbolKind::Procedure | SymbolKind::Function => CompletionItemKind::FUNCTION,
                SymbolKind::Trigger => CompletionItemKind::EVENT,
            }),
            detail: symbol.type_string.clone(),
            ..Default::default()
        });
    }

    items
}

/// The identifier characters immediately left of the cursor.
fn extract_prefix(source: &str, offset: usize) -> String {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let start = before
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map(|(i, _)| i)
        .unwrap_or(offset);
    before[start..].to_string()
}

fn matches_prefix(candidate: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || candidate
            .to_lowercase()
            .starts_with(&prefix.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_document;

    const SOURCE: &str = "OBJECT Codeunit 1 T { CODE {\nVAR\n  TotalAmount@1 : Decimal;\nPROCEDURE Post@1(ToInvoice@1 : Boolean);\nBEGIN\n  To\nEND;\nBEGIN END.\n} }";

    fn completions_at(needle: &str, delta: usize) -> Vec<CompletionItem> {
        let analysis = analyze_document("file:///t.txt", SOURCE);
        let offset = SOURCE.find(needle).expect("needle") + delta;
        let position = crate::analysis::offset_to_position(SOURCE, offset);
        compute_completions(SOURCE, &analysis, &position)
    }

    #[test]
    fn prefix_filters_all_tiers() {
        // Cursor right after the dangling `To` in the body.
        let items = completions_at("\n  To\n", "\n  To".len());
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert!(labels.contains(&"TO"), "keyword tier: {labels:?}");
        assert!(labels.contains(&"TotalAmount"), "symbol tier: {labels:?}");
        assert!(labels.contains(&"ToInvoice"), "parameter in scope: {labels:?}");
        assert!(!labels.contains(&"BEGIN"), "non-matching keyword filtered");
        assert!(!labels.contains(&"Post"), "non-matching symbol filtered");
    }

    #[test]
    fn empty_prefix_offers_everything_in_scope() {
        let items = completions_at("BEGIN\n", "BEGIN\n".len());
        let labels: Vec<_> = items.iter().map(|i| i.label.as_str()).collect();
        assert!(labels.contains(&"IF"));
        assert!(labels.contains(&"Integer"));
        assert!(labels.contains(&"TotalAmount"));
        assert!(labels.contains(&"Post"));
    }

    #[test]
    fn symbol_items_carry_type_detail() {
        let items = completions_at("\n  To\n", "\n  To".len());
        let total = items
            .iter()
            .find(|i| i.label == "TotalAmount")
            .expect("TotalAmount item");
        assert_eq!(total.detail.as_deref(), Some("Decimal"));
    }

    #[test]
    fn prefix_extraction_stops_at_non_identifier() {
        assert_eq!(extract_prefix("x := Tot", 8), "Tot");
        assert_eq!(extract_prefix("x := ", 5), "");
        assert_eq!(extract_prefix("", 0), "");
    }
}
