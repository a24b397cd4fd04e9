//! Re-parser for structured property values.
//!
//! `CalcFormula` and `TableRelation` values arrive as the token slice a
//! [`crate::ast::Property`] captured during the main parse. This module
//! runs a second, smaller recursive descent over that slice and builds
//! the structured sub-trees feature providers consume.
//!
//! Diagnostics are first-error-wins: the first problem is recorded, the
//! sub-parse returns `None`, and nothing after it is inspected. Names
//! are reassembled token-by-token with a single space wherever the
//! source had a gap, so `"Customer No."` and `No.` round-trip exactly.

use cal_common::diagnostic::Diagnostic;
use cal_common::token::{Token, TokenKind};

use crate::ast::{
    CalcFormulaNode, ConditionalRelation, FilterCondition, PredicateKind, SimpleRelation,
    TableRelationNode,
};

/// Parse a `CalcFormula` property value.
///
/// Returns the node and an empty vector, or `None` plus exactly one
/// diagnostic.
pub fn parse_calc_formula(tokens: &[Token]) -> (Option<CalcFormulaNode>, Vec<Diagnostic>) {
    let mut parser = PropertyValueParser::new(tokens);
    let node = parser.calc_formula();
    parser.finish(node, "CalcFormula")
}

/// Parse a `TableRelation` property value. Same contract as
/// [`parse_calc_formula`].
pub fn parse_table_relation(tokens: &[Token]) -> (Option<TableRelationNode>, Vec<Diagnostic>) {
    let mut parser = PropertyValueParser::new(tokens);
    let node = parser.table_relation();
    parser.finish(node, "TableRelation")
}

/// The aggregation functions of a CalcFormula.
const AGGREGATION_FUNCTIONS: &[&str] =
    &["sum", "count", "lookup", "exist", "min", "max", "average"];

struct PropertyValueParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    diagnostic: Option<Diagnostic>,
}

impl<'a> PropertyValueParser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostic: None,
        }
    }

    /// Apply the trailing-token rule and package the result.
    fn finish<T>(mut self, node: Option<T>, what: &str) -> (Option<T>, Vec<Diagnostic>) {
        let node = match node {
            Some(node) if self.pos < self.tokens.len() => {
                let token = self.tokens[self.pos].clone();
                self.fail::<()>(
                    format!("Unexpected token after {what} expression"),
                    token,
                );
                None
            }
            other => other,
        };
        (node, self.diagnostic.into_iter().collect())
    }

    // ── Cursor ─────────────────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    /// Word check by text, case-insensitive; matches both identifier
    /// tokens and keyword tokens (`IF`, `ELSE` arrive as keywords).
    fn at_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.value.eq_ignore_ascii_case(word))
    }

    /// `WHERE` introducing a clause: the word followed by `(`.
    fn at_where(&self) -> bool {
        self.at_word("where")
            && self
                .peek_at(1)
                .is_some_and(|t| t.kind == TokenKind::LeftParen)
    }

    /// Synthetic EOF token at the end of the last real token.
    fn eof_token(&self) -> Token {
        match self.tokens.last() {
            Some(t) => Token::new(
                TokenKind::Eof,
                "",
                t.line,
                t.column,
                t.span.end,
                t.span.end,
            ),
            None => Token::new(TokenKind::Eof, "", 1, 1, 0, 0),
        }
    }

    /// Record the first diagnostic and fail the sub-parse.
    fn fail<T>(&mut self, message: impl Into<String>, token: Token) -> Option<T> {
        if self.diagnostic.is_none() {
            self.diagnostic = Some(Diagnostic::error(message, token));
        }
        None
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        if self.at_kind(kind) {
            self.bump()
        } else {
            let token = self.peek().cloned().unwrap_or_else(|| self.eof_token());
            self.fail(format!("expected {what}"), token)
        }
    }

    // ── Name assembly ──────────────────────────────────────────────────

    /// Join token values with a single space wherever the source had any
    /// gap. Quoted identifiers contribute their unquoted text.
    fn join(parts: &[Token]) -> String {
        let mut out = String::new();
        let mut prev: Option<&Token> = None;
        for token in parts {
            if let Some(p) = prev {
                if token.span.start > p.span.end {
                    out.push(' ');
                }
            }
            out.push_str(&token.value);
            prev = Some(token);
        }
        out
    }

    /// Accumulate a composite name until a stop. `stop_at_dot` is true
    /// for table references (the `.` separates table from field) and
    /// false for field references and predicate values (`No.` keeps its
    /// dot).
    fn composite_name(&mut self, stop_at_dot: bool) -> String {
        let mut parts: Vec<Token> = Vec::new();
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::RightParen | TokenKind::Comma | TokenKind::Eof => break,
                TokenKind::LeftParen => break,
                TokenKind::Dot if stop_at_dot => break,
                _ => {
                    if self.at_where() || self.at_word("else") || self.at_word("if") {
                        break;
                    }
                    if let Some(token) = self.bump() {
                        parts.push(token);
                    }
                }
            }
        }
        Self::join(&parts)
    }

    // ── CalcFormula ────────────────────────────────────────────────────

    /// `agg-fn '(' table-ref ('.' field-ref)? where? ')'`.
    fn calc_formula(&mut self) -> Option<CalcFormulaNode> {
        let function_token = match self.peek().cloned() {
            Some(t) => t,
            None => {
                let eof = self.eof_token();
                return self.fail("expected an aggregation function", eof);
            }
        };
        let is_aggregation = AGGREGATION_FUNCTIONS
            .iter()
            .any(|f| function_token.value.eq_ignore_ascii_case(f));
        if !is_aggregation {
            return self.fail(
                format!(
                    "unknown aggregation function `{}`",
                    function_token.value
                ),
                function_token,
            );
        }
        self.bump();

        self.expect(TokenKind::LeftParen, "`(` after the aggregation function")?;

        let source_table = self.composite_name(true);
        if source_table.is_empty() {
            let token = self.peek().cloned().unwrap_or_else(|| self.eof_token());
            return self.fail("expected a source table", token);
        }

        let source_field = if self.at_kind(TokenKind::Dot) {
            self.bump();
            let field = self.composite_name(false);
            if field.is_empty() {
                let token = self.peek().cloned().unwrap_or_else(|| self.eof_token());
                return self.fail("expected a source field after `.`", token);
            }
            Some(field)
        } else {
            None
        };

        let where_clause = if self.at_where() {
            Some(self.where_clause()?)
        } else {
            None
        };

        self.expect(TokenKind::RightParen, "`)` to close the CalcFormula")?;

        Some(CalcFormulaNode {
            aggregation_function: function_token.value,
            source_table,
            source_field,
            where_clause,
        })
    }

    // ── TableRelation ──────────────────────────────────────────────────

    /// Either one simple relation or a flattened IF/ELSE-IF chain.
    fn table_relation(&mut self) -> Option<TableRelationNode> {
        if !self.at_word("if") {
            let relation = self.simple_relation()?;
            return Some(TableRelationNode {
                relation: Some(relation),
                conditional_relations: Vec::new(),
            });
        }

        let mut conditional_relations = Vec::new();
        loop {
            self.bump(); // IF
            self.expect(TokenKind::LeftParen, "`(` after IF")?;
            let condition = self.condition()?;
            self.expect(TokenKind::RightParen, "`)` after the IF condition")?;
            let relation = self.simple_relation()?;

            if self.at_word("else") {
                let else_is_if = self
                    .peek_at(1)
                    .is_some_and(|t| t.value.eq_ignore_ascii_case("if"));
                self.bump(); // ELSE
                if else_is_if {
                    conditional_relations.push(ConditionalRelation {
                        condition,
                        relation,
                        else_relation: None,
                    });
                    continue;
                }
                let else_relation = self.simple_relation()?;
                conditional_relations.push(ConditionalRelation {
                    condition,
                    relation,
                    else_relation: Some(else_relation),
                });
            } else {
                conditional_relations.push(ConditionalRelation {
                    condition,
                    relation,
                    else_relation: None,
                });
            }
            break;
        }

        Some(TableRelationNode {
            relation: None,
            conditional_relations,
        })
    }

    /// `table-ref ('.' field-ref)? where?`.
    fn simple_relation(&mut self) -> Option<SimpleRelation> {
        let table_name = self.composite_name(true);
        if table_name.is_empty() {
            let token = self.peek().cloned().unwrap_or_else(|| self.eof_token());
            return self.fail("expected a table reference", token);
        }

        let field_name = if self.at_kind(TokenKind::Dot) {
            self.bump();
            let field = self.composite_name(false);
            if field.is_empty() {
                let token = self.peek().cloned().unwrap_or_else(|| self.eof_token());
                return self.fail("expected a field reference after `.`", token);
            }
            Some(field)
        } else {
            None
        };

        let where_clause = if self.at_where() {
            Some(self.where_clause()?)
        } else {
            None
        };

        Some(SimpleRelation {
            table_name,
            field_name,
            where_clause,
        })
    }

    // ── WHERE clauses and conditions ───────────────────────────────────

    /// `WHERE '(' condition (',' condition)* ')'`.
    fn where_clause(&mut self) -> Option<Vec<FilterCondition>> {
        self.bump(); // WHERE
        self.expect(TokenKind::LeftParen, "`(` after WHERE")?;
        let mut conditions = vec![self.condition()?];
        while self.at_kind(TokenKind::Comma) {
            self.bump();
            conditions.push(self.condition()?);
        }
        self.expect(TokenKind::RightParen, "`)` to close the WHERE clause")?;
        Some(conditions)
    }

    /// `composite-name operator PREDICATE '(' composite-value? ')'`.
    ///
    /// A predicate word that is not followed by `(` is part of the field
    /// name, so the name scan stops only on comparison operators.
    fn condition(&mut self) -> Option<FilterCondition> {
        let mut field_parts: Vec<Token> = Vec::new();
        loop {
            let Some(token) = self.peek() else {
                let eof = self.eof_token();
                return self.fail("expected a filter condition", eof);
            };
            match token.kind {
                TokenKind::Equal
                | TokenKind::NotEqual
                | TokenKind::Less
                | TokenKind::LessEqual
                | TokenKind::Greater
                | TokenKind::GreaterEqual => break,
                TokenKind::RightParen | TokenKind::Comma => {
                    let token = token.clone();
                    return self.fail("expected a comparison operator", token);
                }
                _ => {
                    if let Some(token) = self.bump() {
                        field_parts.push(token);
                    }
                }
            }
        }
        let field = Self::join(&field_parts);
        if field.is_empty() {
            let token = self.peek().cloned().unwrap_or_else(|| self.eof_token());
            return self.fail("expected a field name in the condition", token);
        }

        let operator = match self.bump() {
            Some(t) => t.value,
            None => {
                let eof = self.eof_token();
                return self.fail("expected a comparison operator", eof);
            }
        };

        let predicate_token = match self.peek().cloned() {
            Some(t) => t,
            None => {
                let eof = self.eof_token();
                return self.fail("expected FIELD, CONST, or FILTER", eof);
            }
        };
        let followed_by_paren = self
            .peek_at(1)
            .is_some_and(|t| t.kind == TokenKind::LeftParen);
        let predicate_type = if predicate_token.value.eq_ignore_ascii_case("field")
            && followed_by_paren
        {
            PredicateKind::Field
        } else if predicate_token.value.eq_ignore_ascii_case("const") && followed_by_paren {
            PredicateKind::Const
        } else if predicate_token.value.eq_ignore_ascii_case("filter") && followed_by_paren {
            PredicateKind::Filter
        } else {
            return self.fail("expected FIELD, CONST, or FILTER", predicate_token);
        };
        self.bump(); // predicate word
        self.bump(); // (

        // The value runs to the matching `)`, parens balanced; FILTER
        // values may contain operators and ranges.
        let mut value_parts: Vec<Token> = Vec::new();
        let mut depth = 0u32;
        loop {
            let Some(token) = self.peek() else {
                let eof = self.eof_token();
                return self.fail("unterminated predicate value", eof);
            };
            match token.kind {
                TokenKind::RightParen if depth == 0 => break,
                TokenKind::RightParen => {
                    depth -= 1;
                    if let Some(token) = self.bump() {
                        value_parts.push(token);
                    }
                }
                TokenKind::LeftParen => {
                    depth += 1;
                    if let Some(token) = self.bump() {
                        value_parts.push(token);
                    }
                }
                _ => {
                    if let Some(token) = self.bump() {
                        value_parts.push(token);
                    }
                }
            }
        }
        self.bump(); // )

        Some(FilterCondition {
            field,
            operator,
            predicate_type,
            predicate_value: Self::join(&value_parts),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cal_lexer::Lexer;

    fn tokens_of(source: &str) -> Vec<Token> {
        Lexer::tokenize_significant(source)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .collect()
    }

    #[test]
    fn calc_formula_full_shape() {
        let tokens =
            tokens_of("Sum(\"Customer Ledger Entry\".Amount WHERE (\"Customer No.\"=FIELD(\"No.\")))");
        let (node, diags) = parse_calc_formula(&tokens);
        assert!(diags.is_empty(), "{diags:?}");
        let node = node.expect("calc formula");
        assert_eq!(node.aggregation_function, "Sum");
        assert_eq!(node.source_table, "Customer Ledger Entry");
        assert_eq!(node.source_field.as_deref(), Some("Amount"));
        let conditions = node.where_clause.expect("where clause");
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].field, "Customer No.");
        assert_eq!(conditions[0].operator, "=");
        assert_eq!(conditions[0].predicate_type, PredicateKind::Field);
        assert_eq!(conditions[0].predicate_value, "No.");
    }

    #[test]
    fn count_without_field_or_where() {
        let tokens = tokens_of("Count(\"Sales Line\")");
        let (node, diags) = parse_calc_formula(&tokens);
        assert!(diags.is_empty(), "{diags:?}");
        let node = node.expect("calc formula");
        assert_eq!(node.aggregation_function, "Count");
        assert_eq!(node.source_table, "Sales Line");
        assert!(node.source_field.is_none());
        assert!(node.where_clause.is_none());
    }

    #[test]
    fn unknown_aggregation_fails_once() {
        let tokens = tokens_of("Product(\"T\".F)");
        let (node, diags) = parse_calc_formula(&tokens);
        assert!(node.is_none());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("Product"));
    }

    #[test]
    fn filter_predicate_keeps_operators() {
        let tokens = tokens_of("Count(T WHERE (Amount=FILTER(<>0)))");
        let (node, diags) = parse_calc_formula(&tokens);
        assert!(diags.is_empty(), "{diags:?}");
        let conditions = node.expect("node").where_clause.expect("where");
        assert_eq!(conditions[0].predicate_type, PredicateKind::Filter);
        assert_eq!(conditions[0].predicate_value, "<>0");
    }

    #[test]
    fn predicate_word_in_field_name_is_an_identifier() {
        // `Filter` not followed by `(` belongs to the field name.
        let tokens = tokens_of("Count(T WHERE (Date Filter=FIELD(X)))");
        let (node, diags) = parse_calc_formula(&tokens);
        assert!(diags.is_empty(), "{diags:?}");
        let conditions = node.expect("node").where_clause.expect("where");
        assert_eq!(conditions[0].field, "Date Filter");
    }

    #[test]
    fn simple_table_relation() {
        let tokens = tokens_of("\"Salesperson/Purchaser\"");
        let (node, diags) = parse_table_relation(&tokens);
        assert!(diags.is_empty(), "{diags:?}");
        let node = node.expect("relation");
        let relation = node.relation.expect("simple relation");
        assert_eq!(relation.table_name, "Salesperson/Purchaser");
        assert!(node.conditional_relations.is_empty());
    }

    #[test]
    fn table_relation_with_field_and_where() {
        let tokens = tokens_of("Currency.Code WHERE (Blocked=CONST(No))");
        let (node, diags) = parse_table_relation(&tokens);
        assert!(diags.is_empty(), "{diags:?}");
        let relation = node.expect("node").relation.expect("simple");
        assert_eq!(relation.table_name, "Currency");
        assert_eq!(relation.field_name.as_deref(), Some("Code"));
        assert_eq!(relation.where_clause.expect("where").len(), 1);
    }

    #[test]
    fn else_if_chain_is_flat() {
        let tokens = tokens_of(
            "IF (A=CONST(1)) T1 ELSE IF (A=CONST(2)) T2 ELSE IF (A=CONST(3)) T3 ELSE T4",
        );
        let (node, diags) = parse_table_relation(&tokens);
        assert!(diags.is_empty(), "{diags:?}");
        let node = node.expect("node");
        assert!(node.relation.is_none());
        assert_eq!(node.conditional_relations.len(), 3);
        assert!(node.conditional_relations[0].else_relation.is_none());
        assert!(node.conditional_relations[1].else_relation.is_none());
        let last = &node.conditional_relations[2];
        assert_eq!(
            last.else_relation.as_ref().map(|r| r.table_name.as_str()),
            Some("T4")
        );
    }

    #[test]
    fn trailing_tokens_fail_with_message() {
        let tokens = tokens_of("Customer, extra");
        let (node, diags) = parse_table_relation(&tokens);
        assert!(node.is_none());
        assert_eq!(diags.len(), 1);
        assert!(diags[0]
            .message
            .contains("Unexpected token after TableRelation expression"));
    }

    #[test]
    fn empty_input_fails_with_synthetic_eof() {
        let (node, diags) = parse_calc_formula(&[]);
        assert!(node.is_none());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].token.kind, TokenKind::Eof);
    }

    #[test]
    fn multiple_where_conditions() {
        let tokens = tokens_of(
            "Sum(E.Amt WHERE (No=FIELD(No),Open=CONST(Yes),Type=FILTER(1..3)))",
        );
        let (node, diags) = parse_calc_formula(&tokens);
        assert!(diags.is_empty(), "{diags:?}");
        let conditions = node.expect("node").where_clause.expect("where");
        assert_eq!(conditions.len(), 3);
        assert_eq!(conditions[2].predicate_value, "1..3");
    }
}
