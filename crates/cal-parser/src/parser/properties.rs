//! Property parsing: `Name=Value;` rows, the whitespace-sensitive empty
//! value rule, trigger-valued properties, and ActionList capture.

use cal_common::token::{normalize, Token, TokenKind};

use crate::ast::{Property, PropertySection, TriggerDeclaration};

use super::{code, has_gap, reassemble_display, reassemble_exact, statements, Parser};

/// Property names whose value is a trigger body (`VAR ... BEGIN ... END`).
///
/// One merged list across object, field, control, action, report, and
/// XMLport contexts. A name missing here degrades to a plain string
/// value, which is observable but harmless.
const TRIGGER_PROPERTY_NAMES: &[&str] = &[
    "onrun",
    "oninsert",
    "onmodify",
    "ondelete",
    "onrename",
    "onvalidate",
    "onlookup",
    "onassistedit",
    "ondrilldown",
    "oninit",
    "onopenpage",
    "onclosepage",
    "onaftergetrecord",
    "onaftergetcurrrecord",
    "onnewrecord",
    "oninsertrecord",
    "onmodifyrecord",
    "ondeleterecord",
    "onqueryclosepage",
    "onfindrecord",
    "onnextrecord",
    "onaction",
    "onactivate",
    "ondeactivate",
    "oncontroladdin",
    "onpredataitem",
    "onpostdataitem",
    "onprereport",
    "onpostreport",
    "oninitreport",
    "onprexmlport",
    "onpostxmlport",
    "onprexmlitem",
    "onaftergetxmlitem",
];

/// Whether a property name takes a trigger body as its value.
pub(crate) fn is_trigger_property(name: &str) -> bool {
    TRIGGER_PROPERTY_NAMES.contains(&normalize(name).as_str())
}

/// `{ property* }` after a PROPERTIES/OBJECT-PROPERTIES keyword.
pub(crate) fn parse_property_section(p: &mut Parser, start_token: Token) -> PropertySection {
    p.expect(TokenKind::LeftBrace, "`{` to open the section");
    let properties = parse_property_list(p);
    p.expect(TokenKind::RightBrace, "`}` to close the section");
    PropertySection {
        properties,
        start_token,
        end_token: p.prev_token(),
    }
}

/// Parse `Name=Value;` rows until the enclosing `}` (not consumed).
/// Shared by property sections, field rows, control rows, action rows,
/// and element rows.
pub(crate) fn parse_property_list(p: &mut Parser) -> Vec<Property> {
    let mut out = Vec::new();
    loop {
        while p.eat(TokenKind::Semicolon).is_some() {}
        if p.at(TokenKind::RightBrace) || p.at_eof() {
            break;
        }
        match parse_property(p) {
            Some(property) => out.push(property),
            None => {
                p.skip_until(&[TokenKind::Semicolon, TokenKind::RightBrace]);
                p.eat(TokenKind::Semicolon);
            }
        }
    }
    out
}

/// One `Name=Value` row. The terminating `;` is consumed when present;
/// the enclosing `}` terminates the value without being consumed.
fn parse_property(p: &mut Parser) -> Option<Property> {
    let start_token = p.peek().clone();

    if !p.at(TokenKind::Identifier) {
        let token = p.bump();
        p.error_at(format!("expected a property name, found `{}`", token.value), token);
        return None;
    }
    // Property names may span several words (`Version List=...`).
    let mut name_parts = vec![p.bump()];
    while p.at(TokenKind::Identifier) {
        name_parts.push(p.bump());
    }
    let name = reassemble_exact(&name_parts);

    let equals = match p.expect(TokenKind::Equal, "`=` after the property name") {
        Some(t) => t,
        None => return None,
    };

    if is_trigger_property(&name) {
        return Some(parse_trigger_property(p, name, start_token));
    }

    if name.eq_ignore_ascii_case("ActionList") && p.at_ident("ACTIONS") {
        return Some(parse_action_list_property(p, name, start_token));
    }

    // Empty value: `= }` is valid, `=}` is malformed. The single gap
    // check is the whole rule.
    if p.at(TokenKind::RightBrace) {
        if !has_gap(&equals, p.peek()) {
            p.error_at(
                "malformed property value: `=}` (a space before `}` makes an empty value)",
                equals.clone(),
            );
        }
        return Some(Property {
            name,
            value: String::new(),
            value_tokens: Vec::new(),
            trigger: None,
            start_token,
            end_token: equals,
        });
    }

    // Capture the value: everything up to a `;` outside brackets, parens,
    // and braces. Commas inside brackets belong to the value (ML text).
    let mut captured: Vec<Token> = Vec::new();
    let mut paren_depth = 0u32;
    let mut bracket_depth = 0u32;
    let mut brace_depth = 0u32;
    loop {
        match p.kind() {
            TokenKind::Semicolon if paren_depth == 0 && bracket_depth == 0 && brace_depth == 0 => {
                p.bump();
                break;
            }
            TokenKind::RightBrace if brace_depth == 0 => break,
            TokenKind::Eof => {
                p.error("unterminated property value");
                break;
            }
            TokenKind::LeftParen => {
                paren_depth += 1;
                captured.push(p.bump());
            }
            TokenKind::RightParen => {
                paren_depth = paren_depth.saturating_sub(1);
                captured.push(p.bump());
            }
            TokenKind::LeftBracket => {
                bracket_depth += 1;
                captured.push(p.bump());
            }
            TokenKind::RightBracket => {
                bracket_depth = bracket_depth.saturating_sub(1);
                captured.push(p.bump());
            }
            TokenKind::LeftBrace => {
                brace_depth += 1;
                captured.push(p.bump());
            }
            TokenKind::RightBrace => {
                brace_depth = brace_depth.saturating_sub(1);
                captured.push(p.bump());
            }
            _ => captured.push(p.bump()),
        }
    }

    let value = reassemble_display(&captured);
    Some(Property {
        name,
        value,
        value_tokens: captured,
        trigger: None,
        start_token,
        end_token: p.prev_token(),
    })
}

/// A trigger-valued property: `[VAR locals] BEGIN statements END [;]`.
/// The display value is the sentinel `"BEGIN...END"`; the real body and
/// locals hang off the property's `trigger`.
fn parse_trigger_property(p: &mut Parser, name: String, start_token: Token) -> Property {
    let mark = p.mark();
    let trigger_start = p.peek().clone();

    let variables = if p.at(TokenKind::Var) {
        code::parse_var_block(p)
    } else {
        Vec::new()
    };

    let body = if p.at(TokenKind::Begin) {
        statements::parse_block_body(p)
    } else {
        p.error(format!("expected BEGIN in the `{name}` trigger value"));
        p.skip_until(&[TokenKind::Semicolon, TokenKind::RightBrace]);
        Vec::new()
    };

    let value_tokens = p.tokens_since(mark);
    p.eat(TokenKind::Semicolon);

    let trigger = TriggerDeclaration {
        name: name.clone(),
        variables,
        body,
        start_token: trigger_start,
        end_token: p.prev_token(),
    };

    Property {
        name,
        value: "BEGIN...END".to_string(),
        value_tokens,
        trigger: Some(trigger),
        start_token,
        end_token: p.prev_token(),
    }
}

/// `ActionList=ACTIONS { ... }`: the value is captured as text plus the
/// balanced brace run, not parsed into an action tree here.
fn parse_action_list_property(p: &mut Parser, name: String, start_token: Token) -> Property {
    let mark = p.mark();
    p.bump(); // ACTIONS
    if p.at(TokenKind::LeftBrace) {
        p.skip_balanced_braces();
    } else {
        p.error("expected `{` after ACTIONS");
    }
    let value_tokens = p.tokens_since(mark);
    p.eat(TokenKind::Semicolon);

    Property {
        name,
        value: reassemble_display(&value_tokens),
        value_tokens,
        trigger: None,
        start_token,
        end_token: p.prev_token(),
    }
}
