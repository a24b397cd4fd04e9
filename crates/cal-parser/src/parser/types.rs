//! Data-type expressions: simple names, `Text[N]`/`Code[N]`, `Record`
//! forms, `Option` strings, `ARRAY [N] OF`, and DotNet references.

use cal_common::token::{normalize, TokenKind};

use crate::ast::DataType;

use super::{reassemble_display, Parser};

/// Parse one data-type expression. Never fails: a malformed type is
/// reported and collapses to `Simple` with whatever name was present.
pub(crate) fn parse_data_type(p: &mut Parser) -> DataType {
    // TEMPORARY only modifies Record.
    if p.at(TokenKind::Temporary) {
        p.bump();
        if p.at_ident("Record") {
            p.bump();
            return parse_record_tail(p, true);
        }
        p.error("TEMPORARY is only valid before Record");
        return parse_data_type(p);
    }

    if p.at(TokenKind::Array) {
        return parse_array(p);
    }

    let name_token = match p.kind() {
        TokenKind::Identifier | TokenKind::QuotedIdentifier => p.bump(),
        _ => {
            let token = p.peek().clone();
            p.error_at(format!("expected a data type, found `{}`", token.value), token);
            return DataType::Simple {
                name: String::new(),
            };
        }
    };
    let name = name_token.value.clone();

    match normalize(&name).as_str() {
        "text" => DataType::Text {
            length: parse_optional_length(p),
        },
        "code" => DataType::Code {
            length: parse_optional_length(p),
        },
        "record" => parse_record_tail(p, false),
        "option" => DataType::OptionString {
            options: parse_option_string(p),
        },
        "dotnet" => parse_dotnet_tail(p),
        _ => DataType::Simple { name },
    }
}

/// `[N]` after Text/Code, if present.
fn parse_optional_length(p: &mut Parser) -> Option<i64> {
    if p.eat(TokenKind::LeftBracket).is_none() {
        return None;
    }
    let length = match p.expect(TokenKind::Integer, "a length inside `[ ]`") {
        Some(t) => t.value.parse().ok(),
        None => None,
    };
    p.expect(TokenKind::RightBracket, "`]` after the length");
    length
}

/// The table reference after `Record`: a numeric id, a quoted name, or a
/// bare name. A bare `Record` with no reference is also accepted
/// (RecordRef-style variables written loosely).
fn parse_record_tail(p: &mut Parser, temporary: bool) -> DataType {
    match p.kind() {
        TokenKind::Integer => {
            let id = p.bump().value.parse().ok();
            DataType::Record {
                table_id: id,
                table_name: None,
                temporary,
            }
        }
        TokenKind::QuotedIdentifier | TokenKind::Identifier => {
            let name = p.bump().value;
            DataType::Record {
                table_id: None,
                table_name: Some(name),
                temporary,
            }
        }
        _ => DataType::Record {
            table_id: None,
            table_name: None,
            temporary,
        },
    }
}

/// The option string after `Option`, captured verbatim up to the end of
/// the declaration.
fn parse_option_string(p: &mut Parser) -> String {
    let mut captured = Vec::new();
    loop {
        match p.kind() {
            TokenKind::Semicolon
            | TokenKind::RightParen
            | TokenKind::RightBrace
            | TokenKind::RightBracket
            | TokenKind::Eof => break,
            _ => captured.push(p.bump()),
        }
    }
    reassemble_display(&captured)
}

/// `ARRAY [N] OF element-type`.
fn parse_array(p: &mut Parser) -> DataType {
    p.bump(); // ARRAY
    p.expect(TokenKind::LeftBracket, "`[` after ARRAY");
    let length = match p.expect(TokenKind::Integer, "an array length") {
        Some(t) => t.value.parse().unwrap_or(0),
        None => 0,
    };
    p.expect(TokenKind::RightBracket, "`]` after the array length");
    p.expect(TokenKind::Of, "`OF` after the array length");
    let element = parse_data_type(p);
    DataType::Array {
        length,
        element: Box::new(element),
    }
}

/// The assembly-qualified reference after `DotNet`, kept verbatim.
fn parse_dotnet_tail(p: &mut Parser) -> DataType {
    match p.kind() {
        TokenKind::QuotedIdentifier | TokenKind::String | TokenKind::Identifier => {
            let type_name = p.bump().display_value();
            DataType::DotNet { type_name }
        }
        _ => {
            p.error("expected a DotNet type reference");
            DataType::DotNet {
                type_name: String::new(),
            }
        }
    }
}
