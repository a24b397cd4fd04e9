//! Document and object-declaration parsing: the `OBJECT <kind> <id>
//! <name> { sections }` shell and the dispatch into section routines.

use cal_common::token::{normalize, TokenKind};

use crate::ast::{Document, ObjectDeclaration, ObjectKind};

use super::{code, controls, fields, properties, reassemble_exact, Parser};

/// Parse one source file into a [`Document`].
///
/// The document always exists; `object` is `None` when the file holds no
/// recognizable object declaration.
pub(crate) fn parse_document(p: &mut Parser) -> Document {
    let start_token = p.peek().clone();

    let object = if p.at_eof() {
        None
    } else if p.at(TokenKind::Object) {
        parse_object_declaration(p)
    } else {
        p.error("expected an OBJECT declaration");
        // The file may still contain one further in; scan for it.
        while !p.at_eof() && !p.at(TokenKind::Object) {
            p.bump();
        }
        if p.at(TokenKind::Object) {
            parse_object_declaration(p)
        } else {
            None
        }
    };

    if !p.at_eof() {
        let tok = p.peek().clone();
        p.warning_at("content after the object declaration is ignored", tok);
        while !p.at_eof() {
            p.bump();
        }
    }

    let end_token = p.prev_token();
    let end_token = if end_token.kind == TokenKind::Eof && object.is_none() {
        start_token.clone()
    } else {
        end_token
    };

    Document {
        object,
        start_token,
        end_token,
    }
}

/// `OBJECT <kind> <id> <name> { section* }`.
///
/// A missing closing brace is reported but the object is still produced.
fn parse_object_declaration(p: &mut Parser) -> Option<ObjectDeclaration> {
    let start_token = p.bump(); // OBJECT

    let kind = if p.at(TokenKind::Identifier) {
        let value = p.peek().value.clone();
        match ObjectKind::from_name(&value) {
            Some(kind) => {
                p.bump();
                kind
            }
            None => {
                p.error(format!("unknown object kind `{value}`"));
                p.bump();
                ObjectKind::Codeunit
            }
        }
    } else {
        p.error("expected an object kind (Table, Page, Report, Codeunit, Query, XMLport, MenuSuite)");
        ObjectKind::Codeunit
    };

    let id = match p.expect(TokenKind::Integer, "an object id") {
        Some(t) => t.value.parse().unwrap_or(0),
        None => 0,
    };

    let name = parse_object_name(p);

    let mut object = ObjectDeclaration {
        kind,
        id,
        name,
        object_properties: None,
        properties: None,
        fields: None,
        keys: None,
        field_groups: None,
        code: None,
        controls: None,
        actions: None,
        elements: None,
        dataset: None,
        start_token: start_token.clone(),
        end_token: start_token,
    };

    if p.expect(TokenKind::LeftBrace, "`{` to open the object body").is_none() {
        object.end_token = p.prev_token();
        return Some(object);
    }

    parse_sections(p, &mut object);

    object.end_token = p.prev_token();
    Some(object)
}

/// The object name: one quoted identifier, or a bare run of tokens up to
/// the next line break, `{`, or end of input, with the original gaps
/// preserved.
fn parse_object_name(p: &mut Parser) -> String {
    if p.at(TokenKind::QuotedIdentifier) {
        return p.bump().value;
    }

    let mut parts = Vec::new();
    loop {
        let token = p.peek_raw().clone();
        match token.kind {
            TokenKind::NewLine | TokenKind::LeftBrace | TokenKind::Eof => break,
            TokenKind::Whitespace | TokenKind::Comment | TokenKind::Unknown => {
                p.bump_raw();
            }
            _ => {
                p.bump_raw();
                parts.push(token);
            }
        }
    }

    if parts.is_empty() {
        p.error("expected an object name");
        return String::new();
    }
    reassemble_exact(&parts)
}

/// Dispatch the section loop until the object's closing brace.
fn parse_sections(p: &mut Parser, object: &mut ObjectDeclaration) {
    loop {
        if p.eat(TokenKind::RightBrace).is_some() {
            return;
        }
        if p.at_eof() {
            p.error("missing `}` to close the object");
            return;
        }

        // OBJECT-PROPERTIES is three tokens: `OBJECT` `-` `PROPERTIES`.
        if p.at(TokenKind::Object)
            && p.peek_nth(1).kind == TokenKind::Minus
            && p.peek_nth(2).value.eq_ignore_ascii_case("PROPERTIES")
        {
            let section_start = p.bump(); // OBJECT
            p.bump(); // -
            p.bump(); // PROPERTIES
            let section = properties::parse_property_section(p, section_start.clone());
            if object.object_properties.is_some() {
                p.warning_at("duplicate OBJECT-PROPERTIES section", section_start);
            }
            object.object_properties = Some(section);
            continue;
        }

        if p.at(TokenKind::Identifier) {
            let section_name = normalize(&p.peek().value);
            match section_name.as_str() {
                "properties" => {
                    let start = p.bump();
                    let section = properties::parse_property_section(p, start.clone());
                    if object.properties.is_some() {
                        p.warning_at("duplicate PROPERTIES section", start);
                    }
                    object.properties = Some(section);
                }
                "fields" => {
                    let start = p.bump();
                    object.fields = Some(fields::parse_field_section(p, start));
                }
                "keys" => {
                    let start = p.bump();
                    object.keys = Some(fields::parse_key_section(p, start));
                }
                "fieldgroups" => {
                    let start = p.bump();
                    object.field_groups = Some(fields::parse_field_group_section(p, start));
                }
                "code" => {
                    let start = p.bump();
                    object.code = Some(code::parse_code_section(p, start));
                }
                "controls" => {
                    let start = p.bump();
                    object.controls = Some(controls::parse_control_section(p, start));
                }
                "actions" => {
                    let start = p.bump();
                    object.actions = Some(controls::parse_action_section(p, start));
                }
                "elements" => {
                    let start = p.bump();
                    object.elements = Some(controls::parse_element_section(p, start));
                }
                "dataset" => {
                    let start = p.bump();
                    object.dataset = Some(controls::parse_element_section(p, start));
                }
                _ => {
                    // Unknown section: skip its balanced body if it has one.
                    let token = p.bump();
                    if p.at(TokenKind::LeftBrace) {
                        p.warning_at(
                            format!("unknown section `{}` skipped", token.value),
                            token,
                        );
                        p.skip_balanced_braces();
                    } else {
                        p.error_at(
                            format!("unexpected `{}` in object body", token.value),
                            token,
                        );
                    }
                }
            }
        } else {
            let token = p.bump();
            p.error_at(
                format!("unexpected `{}` in object body", token.value),
                token,
            );
        }
    }
}
