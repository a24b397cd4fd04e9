//! FIELDS, KEYS, and FIELDGROUPS section parsing.

use cal_common::token::{Token, TokenKind};

use crate::ast::{
    FieldDeclaration, FieldGroupDeclaration, FieldGroupSection, FieldSection, KeyDeclaration,
    KeySection,
};

use super::{properties, reassemble_exact, types, Parser};

/// `FIELDS { { no ; class ; name ; type [; properties] }* }`.
pub(crate) fn parse_field_section(p: &mut Parser, start_token: Token) -> FieldSection {
    p.expect(TokenKind::LeftBrace, "`{` to open the FIELDS section");
    let mut fields = Vec::new();
    loop {
        match p.kind() {
            TokenKind::RightBrace => {
                p.bump();
                break;
            }
            TokenKind::Eof => {
                p.error("missing `}` to close the FIELDS section");
                break;
            }
            TokenKind::LeftBrace => {
                if let Some(field) = parse_field_row(p) {
                    fields.push(field);
                }
            }
            _ => {
                let token = p.bump();
                p.error_at(
                    format!("expected a field row, found `{}`", token.value),
                    token,
                );
            }
        }
    }
    FieldSection {
        fields,
        start_token,
        end_token: p.prev_token(),
    }
}

/// One `{ no ; class ; name ; type [; properties] }` row.
fn parse_field_row(p: &mut Parser) -> Option<FieldDeclaration> {
    let start_token = p.bump(); // {

    let number = match p.expect(TokenKind::Integer, "a field number") {
        Some(t) => t.value.parse().unwrap_or(0),
        None => {
            p.skip_row();
            return None;
        }
    };
    p.expect(TokenKind::Semicolon, "`;` after the field number");

    // Reserved field-class slot, usually empty.
    let class_tokens = capture_slot(p);
    let field_class = reassemble_exact(&class_tokens);
    p.expect(TokenKind::Semicolon, "`;` after the field class");

    let (name, name_tokens) = parse_entity_name(p);
    if name.is_empty() {
        p.error("expected a field name");
    }
    p.expect(TokenKind::Semicolon, "`;` after the field name");

    let data_type = types::parse_data_type(p);

    let mut props = Vec::new();
    if p.eat(TokenKind::Semicolon).is_some() {
        props = properties::parse_property_list(p);
    }
    p.expect(TokenKind::RightBrace, "`}` to close the field row");

    Some(FieldDeclaration {
        number,
        field_class,
        name,
        name_tokens,
        data_type,
        properties: props,
        start_token,
        end_token: p.prev_token(),
    })
}

/// `KEYS { { [enabled] ; field,field ; properties }* }`.
pub(crate) fn parse_key_section(p: &mut Parser, start_token: Token) -> KeySection {
    p.expect(TokenKind::LeftBrace, "`{` to open the KEYS section");
    let mut keys = Vec::new();
    loop {
        match p.kind() {
            TokenKind::RightBrace => {
                p.bump();
                break;
            }
            TokenKind::Eof => {
                p.error("missing `}` to close the KEYS section");
                break;
            }
            TokenKind::LeftBrace => {
                if let Some(key) = parse_key_row(p) {
                    keys.push(key);
                }
            }
            _ => {
                let token = p.bump();
                p.error_at(format!("expected a key row, found `{}`", token.value), token);
            }
        }
    }
    KeySection {
        keys,
        start_token,
        end_token: p.prev_token(),
    }
}

/// One key row. The leading enabled-flag slot is tolerated and ignored.
fn parse_key_row(p: &mut Parser) -> Option<KeyDeclaration> {
    let start_token = p.bump(); // {

    // Empty or flag-bearing first slot.
    if p.at(TokenKind::Semicolon) {
        p.bump();
    } else if field_list_has_leading_slot(p) {
        capture_slot(p);
        p.eat(TokenKind::Semicolon);
    }

    let mut fields = Vec::new();
    loop {
        let (name, _) = parse_entity_name(p);
        if name.is_empty() {
            break;
        }
        fields.push(name);
        if p.eat(TokenKind::Comma).is_none() {
            break;
        }
    }
    if fields.is_empty() {
        p.error("expected at least one key field");
    }

    let mut props = Vec::new();
    if p.eat(TokenKind::Semicolon).is_some() {
        props = properties::parse_property_list(p);
    }
    p.expect(TokenKind::RightBrace, "`}` to close the key row");

    Some(KeyDeclaration {
        fields,
        properties: props,
        start_token,
        end_token: p.prev_token(),
    })
}

/// `FIELDGROUPS { { id ; name ; field,field }* }`.
pub(crate) fn parse_field_group_section(
    p: &mut Parser,
    start_token: Token,
) -> FieldGroupSection {
    p.expect(TokenKind::LeftBrace, "`{` to open the FIELDGROUPS section");
    let mut groups = Vec::new();
    loop {
        match p.kind() {
            TokenKind::RightBrace => {
                p.bump();
                break;
            }
            TokenKind::Eof => {
                p.error("missing `}` to close the FIELDGROUPS section");
                break;
            }
            TokenKind::LeftBrace => {
                if let Some(group) = parse_field_group_row(p) {
                    groups.push(group);
                }
            }
            _ => {
                let token = p.bump();
                p.error_at(
                    format!("expected a field group row, found `{}`", token.value),
                    token,
                );
            }
        }
    }
    FieldGroupSection {
        groups,
        start_token,
        end_token: p.prev_token(),
    }
}

fn parse_field_group_row(p: &mut Parser) -> Option<FieldGroupDeclaration> {
    let start_token = p.bump(); // {

    let id = p
        .eat(TokenKind::Integer)
        .map(|t| t.value.parse().unwrap_or(0));
    p.expect(TokenKind::Semicolon, "`;` after the field group id");

    let (name, _) = parse_entity_name(p);
    if name.is_empty() {
        p.error("expected a field group name");
    }
    p.expect(TokenKind::Semicolon, "`;` after the field group name");

    let mut fields = Vec::new();
    loop {
        let (field, _) = parse_entity_name(p);
        if field.is_empty() {
            break;
        }
        fields.push(field);
        if p.eat(TokenKind::Comma).is_none() {
            break;
        }
    }

    p.expect(TokenKind::RightBrace, "`}` to close the field group row");

    Some(FieldGroupDeclaration {
        id,
        name,
        fields,
        start_token,
        end_token: p.prev_token(),
    })
}

// ── Shared row helpers ─────────────────────────────────────────────────

/// A field/key/group name: one quoted identifier, or an unquoted run of
/// tokens (identifiers, keywords, digits, `.`/`-`/`/`/`%`) up to the next
/// slot boundary, rejoined with its original gaps.
pub(crate) fn parse_entity_name(p: &mut Parser) -> (String, Vec<Token>) {
    if p.at(TokenKind::QuotedIdentifier) {
        let token = p.bump();
        return (token.value.clone(), vec![token]);
    }

    let mut parts = Vec::new();
    loop {
        match p.kind() {
            TokenKind::Semicolon
            | TokenKind::Comma
            | TokenKind::RightBrace
            | TokenKind::LeftBrace
            | TokenKind::Eof => break,
            _ => parts.push(p.bump()),
        }
    }
    (reassemble_exact(&parts), parts)
}

/// Capture one `;`-delimited slot without interpreting it.
fn capture_slot(p: &mut Parser) -> Vec<Token> {
    let mut out = Vec::new();
    loop {
        match p.kind() {
            TokenKind::Semicolon | TokenKind::RightBrace | TokenKind::Eof => break,
            _ => out.push(p.bump()),
        }
    }
    out
}

/// Whether a key row starts with a non-field first slot (`Enabled ;`).
/// Detected by a `;` before any `,` at the same level.
fn field_list_has_leading_slot(p: &mut Parser) -> bool {
    let mut n = 0;
    loop {
        match p.peek_nth(n).kind {
            TokenKind::Semicolon => return true,
            TokenKind::Comma | TokenKind::RightBrace | TokenKind::Eof => return false,
            _ => {}
        }
        n += 1;
        if n > 32 {
            return false;
        }
    }
}

impl Parser {
    /// Abandon a malformed row: skip to its closing `}` (or give up at
    /// the section's end).
    fn skip_row(&mut self) {
        self.skip_until(&[TokenKind::RightBrace]);
        self.eat(TokenKind::RightBrace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cal_lexer::Lexer;
    use crate::ast::DataType;

    fn field_section(source: &str) -> (FieldSection, usize) {
        let mut p = Parser::new(Lexer::tokenize(source));
        let start = p.bump(); // the FIELDS identifier
        let section = parse_field_section(&mut p, start);
        (section, p.diagnostics.len())
    }

    #[test]
    fn parses_plain_field_rows() {
        let (section, diags) = field_section(
            "FIELDS { { 1 ; ;No. ;Code20 } { 2 ; ;Name ;Text50 } }",
        );
        assert_eq!(diags, 0);
        assert_eq!(section.fields.len(), 2);
        assert_eq!(section.fields[0].number, 1);
        assert_eq!(section.fields[0].name, "No.");
        assert_eq!(
            section.fields[1].data_type,
            DataType::Simple { name: "Text50".into() }
        );
    }

    #[test]
    fn quoted_field_name_keeps_token() {
        let (section, diags) =
            field_section("FIELDS { { 5 ; ;\"Currency Code\" ;Code10 } }");
        assert_eq!(diags, 0);
        let field = &section.fields[0];
        assert_eq!(field.name, "Currency Code");
        assert_eq!(field.name_tokens.len(), 1);
        assert_eq!(field.name_tokens[0].kind, TokenKind::QuotedIdentifier);
    }

    #[test]
    fn field_with_properties_and_trigger() {
        let (section, diags) = field_section(
            "FIELDS { { 3 ; ;Balance ;Decimal ;Editable=No;\n  OnValidate=BEGIN END; } }",
        );
        assert_eq!(diags, 0);
        let field = &section.fields[0];
        assert_eq!(field.properties.len(), 2);
        assert_eq!(field.triggers().count(), 1);
    }

    #[test]
    fn key_rows_collect_field_names() {
        let source = "KEYS { { ;No. ;Clustered=Yes } { ;Name,\"Currency Code\" } }";
        let mut p = Parser::new(Lexer::tokenize(source));
        let start = p.bump();
        let section = parse_key_section(&mut p, start);
        assert!(p.diagnostics.is_empty(), "{:?}", p.diagnostics);
        assert_eq!(section.keys.len(), 2);
        assert_eq!(section.keys[0].fields, vec!["No.".to_string()]);
        assert_eq!(section.keys[0].properties.len(), 1);
        assert_eq!(
            section.keys[1].fields,
            vec!["Name".to_string(), "Currency Code".to_string()]
        );
    }

    #[test]
    fn field_group_row() {
        let source = "FIELDGROUPS { { 1;DropDown;No.,Name } }";
        let mut p = Parser::new(Lexer::tokenize(source));
        let start = p.bump();
        let section = parse_field_group_section(&mut p, start);
        assert!(p.diagnostics.is_empty(), "{:?}", p.diagnostics);
        assert_eq!(section.groups.len(), 1);
        assert_eq!(section.groups[0].id, Some(1));
        assert_eq!(section.groups[0].name, "DropDown");
        assert_eq!(
            section.groups[0].fields,
            vec!["No.".to_string(), "Name".to_string()]
        );
    }

    #[test]
    fn malformed_row_recovers() {
        let (section, diags) =
            field_section("FIELDS { { oops } { 2 ; ;Name ;Text50 } }");
        assert!(diags > 0);
        assert_eq!(section.fields.len(), 1);
        assert_eq!(section.fields[0].number, 2);
    }
}
