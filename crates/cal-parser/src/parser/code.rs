//! CODE section parsing: the global VAR block, attributes, procedure and
//! event declarations, TRIGGER declarations, and the final
//! `BEGIN ... END.` run block.

use cal_common::token::{Token, TokenKind};

use crate::ast::{
    Attribute, CodeSection, DataType, ParameterDeclaration, ProcedureDeclaration,
    TriggerDeclaration, VariableDeclaration,
};

use super::{statements, types, Parser};

/// Tokens that restart the CODE section loop after a recovery skip.
const CODE_SYNC: &[TokenKind] = &[
    TokenKind::Var,
    TokenKind::Local,
    TokenKind::Internal,
    TokenKind::Procedure,
    TokenKind::Event,
    TokenKind::Trigger,
    TokenKind::Begin,
    TokenKind::LeftBracket,
    TokenKind::RightBrace,
];

/// `CODE { [VAR globals] (attribute* declaration)* [BEGIN ... END.] }`.
pub(crate) fn parse_code_section(p: &mut Parser, start_token: Token) -> CodeSection {
    p.expect(TokenKind::LeftBrace, "`{` to open the CODE section");

    let mut section = CodeSection {
        variables: Vec::new(),
        procedures: Vec::new(),
        triggers: Vec::new(),
        document_trigger: None,
        start_token,
        end_token: Token::new(TokenKind::Eof, "", 1, 1, 0, 0),
    };

    let mut pending_attributes: Vec<Attribute> = Vec::new();

    loop {
        match p.kind() {
            TokenKind::RightBrace => {
                discard_attributes(p, &mut pending_attributes);
                p.bump();
                break;
            }
            TokenKind::Eof => {
                discard_attributes(p, &mut pending_attributes);
                p.error("missing `}` to close the CODE section");
                break;
            }
            TokenKind::Var => {
                discard_attributes(p, &mut pending_attributes);
                let globals = parse_var_block(p);
                section.variables.extend(globals);
            }
            TokenKind::LeftBracket => {
                if let Some(attribute) = parse_attribute(p) {
                    pending_attributes.push(attribute);
                }
            }
            TokenKind::Local | TokenKind::Internal | TokenKind::Procedure | TokenKind::Event => {
                let attributes = std::mem::take(&mut pending_attributes);
                if p.at(TokenKind::Event) && !attributes.is_empty() {
                    let token = attributes[0].start_token.clone();
                    p.warning_at("attributes are not supported on EVENT declarations", token);
                }
                match parse_procedure(p, attributes) {
                    Ok(procedure) => section.procedures.push(procedure),
                    Err(mut discarded) => discard_attributes(p, &mut discarded),
                }
            }
            TokenKind::Trigger => {
                if !pending_attributes.is_empty() {
                    let token = pending_attributes[0].start_token.clone();
                    p.warning_at(
                        "attributes are not supported on TRIGGER declarations",
                        token,
                    );
                    pending_attributes.clear();
                }
                if let Some(trigger) = parse_trigger_declaration(p) {
                    section.triggers.push(trigger);
                }
            }
            TokenKind::Begin => {
                discard_attributes(p, &mut pending_attributes);
                section.document_trigger = Some(parse_document_trigger(p));
            }
            _ => {
                let token = p.bump();
                p.error_at(
                    format!("unexpected `{}` in CODE section", token.value),
                    token,
                );
                p.skip_until(CODE_SYNC);
            }
        }
    }

    section.end_token = p.prev_token();
    section
}

/// Report and drop attributes that ended up attached to nothing. The
/// single warning carries the count.
fn discard_attributes(p: &mut Parser, attributes: &mut Vec<Attribute>) {
    if attributes.is_empty() {
        return;
    }
    let count = attributes.len();
    let token = attributes[0].start_token.clone();
    let noun = if count == 1 { "attribute" } else { "attributes" };
    p.warning_at(format!("{count} {noun} discarded"), token);
    attributes.clear();
}

// ── Variables ──────────────────────────────────────────────────────────

/// `VAR (name : [TEMPORARY] type ;)*` -- used for globals, locals, and
/// trigger-property locals.
pub(crate) fn parse_var_block(p: &mut Parser) -> Vec<VariableDeclaration> {
    p.bump(); // VAR
    let mut out = Vec::new();
    loop {
        match p.kind() {
            TokenKind::Identifier | TokenKind::QuotedIdentifier => {
                let start_token = p.peek().clone();
                let name = p.bump().value;
                if p.expect(TokenKind::Colon, "`:` after the variable name").is_none() {
                    p.skip_until(&[TokenKind::Semicolon, TokenKind::RightBrace, TokenKind::Begin]);
                    p.eat(TokenKind::Semicolon);
                    continue;
                }
                let data_type = types::parse_data_type(p);
                let is_temporary = matches!(data_type, DataType::Record { temporary: true, .. });
                p.eat(TokenKind::Semicolon);
                out.push(VariableDeclaration {
                    name,
                    data_type,
                    is_temporary,
                    start_token,
                    end_token: p.prev_token(),
                });
            }
            _ => break,
        }
    }
    out
}

// ── Attributes ─────────────────────────────────────────────────────────

/// `[Name]` or `[Name(args)]` with a token-balanced argument run.
fn parse_attribute(p: &mut Parser) -> Option<Attribute> {
    let start_token = p.bump(); // [

    let name = match p.kind() {
        TokenKind::Identifier => p.bump().value,
        _ => {
            p.error("expected an attribute name after `[`");
            p.skip_until(&[
                TokenKind::RightBracket,
                TokenKind::Procedure,
                TokenKind::Local,
                TokenKind::Internal,
                TokenKind::Event,
                TokenKind::RightBrace,
            ]);
            p.eat(TokenKind::RightBracket);
            return None;
        }
    };

    let mut arguments = Vec::new();
    if p.at(TokenKind::LeftParen) {
        p.bump(); // (
        let mut depth = 1u32;
        loop {
            match p.kind() {
                TokenKind::LeftParen => {
                    depth += 1;
                    arguments.push(p.bump());
                }
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        p.bump();
                        break;
                    }
                    arguments.push(p.bump());
                }
                TokenKind::Eof => {
                    p.error("unterminated attribute argument list");
                    break;
                }
                _ => arguments.push(p.bump()),
            }
        }
    }

    if p.expect(TokenKind::RightBracket, "`]` to close the attribute").is_none() {
        p.skip_until(&[
            TokenKind::RightBracket,
            TokenKind::Procedure,
            TokenKind::Local,
            TokenKind::Internal,
            TokenKind::Event,
            TokenKind::LeftBracket,
            TokenKind::RightBrace,
        ]);
        p.eat(TokenKind::RightBracket);
    }

    Some(Attribute {
        name,
        arguments,
        start_token,
        end_token: p.prev_token(),
    })
}

// ── Procedures and events ──────────────────────────────────────────────

/// `[LOCAL|INTERNAL] PROCEDURE|EVENT name '(' params ')' [: type] ...`.
///
/// On a malformed header the attributes are handed back so the caller
/// can discard them with a counted warning; whenever a name could be
/// read, a partial node is produced instead.
fn parse_procedure(
    p: &mut Parser,
    attributes: Vec<Attribute>,
) -> Result<ProcedureDeclaration, Vec<Attribute>> {
    let start_token = attributes
        .first()
        .map(|a| a.start_token.clone())
        .unwrap_or_else(|| p.peek().clone());

    let is_local = p.eat(TokenKind::Local).is_some();
    let is_internal = p.eat(TokenKind::Internal).is_some();

    let is_event = if p.at(TokenKind::Event) {
        p.bump();
        true
    } else if p.expect(TokenKind::Procedure, "`PROCEDURE`").is_some() {
        false
    } else {
        p.skip_until(CODE_SYNC);
        return Err(attributes);
    };

    let mut name = match p.kind() {
        TokenKind::Identifier | TokenKind::QuotedIdentifier => p.bump().value,
        _ => {
            p.error("malformed procedure declaration: expected a procedure name");
            p.skip_until(CODE_SYNC);
            return Err(attributes);
        }
    };

    // Event subscribers use `Source::EventName`.
    if is_event && p.at(TokenKind::ColonColon) {
        p.bump();
        match p.kind() {
            TokenKind::Identifier | TokenKind::QuotedIdentifier => {
                let event_name = p.bump().value;
                name = format!("{name}::{event_name}");
            }
            _ => p.error("expected an event name after `::`"),
        }
    }

    let mut parameters = Vec::new();
    if p.eat(TokenKind::LeftParen).is_some() {
        while !p.at(TokenKind::RightParen) && !p.at_eof() {
            match parse_parameter(p) {
                Some(parameter) => parameters.push(parameter),
                None => {
                    p.skip_until(&[
                        TokenKind::Semicolon,
                        TokenKind::RightParen,
                        TokenKind::Begin,
                        TokenKind::RightBrace,
                    ]);
                }
            }
            if p.eat(TokenKind::Semicolon).is_none() {
                break;
            }
        }
        p.expect(TokenKind::RightParen, "`)` to close the parameter list");
    } else {
        p.error("expected `(` after the procedure name");
    }

    // Optional named return value, then optional return type.
    if p.at(TokenKind::Identifier) && p.peek_nth(1).kind == TokenKind::Colon {
        p.bump();
    }
    let return_type = if p.eat(TokenKind::Colon).is_some() {
        Some(types::parse_data_type(p))
    } else {
        None
    };

    // The header ends with `;` or simply a line break.
    p.eat(TokenKind::Semicolon);

    let variables = if p.at(TokenKind::Var) {
        parse_var_block(p)
    } else {
        Vec::new()
    };

    let mut body = Vec::new();
    if p.at(TokenKind::Begin) {
        body = statements::parse_block_body(p);
        p.eat(TokenKind::Semicolon);
    } else if !is_event {
        p.error(format!("expected BEGIN to open the body of `{name}`"));
        p.skip_until(CODE_SYNC);
        if p.at(TokenKind::Begin) {
            body = statements::parse_block_body(p);
            p.eat(TokenKind::Semicolon);
        }
    } else {
        // Event declarations may be header-only.
        p.eat(TokenKind::Semicolon);
    }

    Ok(ProcedureDeclaration {
        name,
        is_local,
        is_internal,
        is_event,
        attributes,
        parameters,
        return_type,
        variables,
        body,
        start_token,
        end_token: p.prev_token(),
    })
}

/// `[VAR] name : [TEMPORARY] type` in a parameter list.
fn parse_parameter(p: &mut Parser) -> Option<ParameterDeclaration> {
    let start_token = p.peek().clone();
    let by_reference = p.eat(TokenKind::Var).is_some();

    let name = match p.kind() {
        TokenKind::Identifier | TokenKind::QuotedIdentifier => p.bump().value,
        _ => {
            p.error("expected a parameter name");
            return None;
        }
    };

    let mut data_type = None;
    let mut is_temporary = false;
    if p.expect(TokenKind::Colon, "`:` after the parameter name").is_some() {
        let parsed = types::parse_data_type(p);
        is_temporary = matches!(parsed, DataType::Record { temporary: true, .. });
        data_type = Some(parsed);
    }

    Some(ParameterDeclaration {
        name,
        data_type,
        by_reference,
        is_temporary,
        start_token,
        end_token: p.prev_token(),
    })
}

// ── Triggers ───────────────────────────────────────────────────────────

/// `TRIGGER name [()] [;] [VAR locals] BEGIN ... END [;]`.
fn parse_trigger_declaration(p: &mut Parser) -> Option<TriggerDeclaration> {
    let start_token = p.bump(); // TRIGGER

    let name = match p.kind() {
        TokenKind::Identifier | TokenKind::QuotedIdentifier => p.bump().value,
        _ => {
            p.error("expected a trigger name");
            p.skip_until(CODE_SYNC);
            return None;
        }
    };

    if p.eat(TokenKind::LeftParen).is_some() {
        p.expect(TokenKind::RightParen, "`)` in the trigger header");
    }
    p.eat(TokenKind::Semicolon);

    let variables = if p.at(TokenKind::Var) {
        parse_var_block(p)
    } else {
        Vec::new()
    };

    let mut body = Vec::new();
    if p.at(TokenKind::Begin) {
        body = statements::parse_block_body(p);
        p.eat(TokenKind::Semicolon);
    } else {
        p.error(format!("expected BEGIN to open the body of trigger `{name}`"));
        p.skip_until(CODE_SYNC);
    }

    Some(TriggerDeclaration {
        name,
        variables,
        body,
        start_token,
        end_token: p.prev_token(),
    })
}

/// The final `BEGIN ... END.` block of a CODE section: the object's run
/// trigger.
fn parse_document_trigger(p: &mut Parser) -> TriggerDeclaration {
    let start_token = p.peek().clone();
    let body = statements::parse_block_body(p);
    if p.eat(TokenKind::Dot).is_none() {
        p.error("expected `.` after the final END");
    }
    TriggerDeclaration {
        name: "OnRun".to_string(),
        variables: Vec::new(),
        body,
        start_token,
        end_token: p.prev_token(),
    }
}
