//! Expression parser using binding-power tables.
//!
//! Precedence, loosest to tightest: `AND`; comparisons (`=`, `<>`, `<`,
//! `>`, `<=`, `>=`, `IN`); ranges (`..`); additives (`+`, `-`, `OR`,
//! `XOR`); multiplicatives (`*`, `/`, `DIV`, `MOD`); unary (`+`, `-`,
//! `NOT`); postfix (member access, call, indexing).

use cal_common::token::{Token, TokenKind};

use crate::ast::{BinaryOp, Expression, ExpressionKind, Literal, UnaryOp};

use super::Parser;

/// What an infix token means.
enum Infix {
    Binary(BinaryOp),
    Range,
}

/// Returns (left_bp, right_bp, meaning) for infix operators.
///
/// Left < right means left-associative (every C/AL operator is).
fn infix_binding_power(op: TokenKind) -> Option<(u8, u8, Infix)> {
    use BinaryOp::*;
    let (l, r, infix) = match op {
        TokenKind::And => (1, 2, Infix::Binary(And)),

        TokenKind::Equal => (3, 4, Infix::Binary(Equal)),
        TokenKind::NotEqual => (3, 4, Infix::Binary(NotEqual)),
        TokenKind::Less => (3, 4, Infix::Binary(Less)),
        TokenKind::LessEqual => (3, 4, Infix::Binary(LessOrEqual)),
        TokenKind::Greater => (3, 4, Infix::Binary(Greater)),
        TokenKind::GreaterEqual => (3, 4, Infix::Binary(GreaterOrEqual)),
        TokenKind::In => (3, 4, Infix::Binary(In)),

        TokenKind::DotDot => (5, 6, Infix::Range),

        TokenKind::Plus => (7, 8, Infix::Binary(Add)),
        TokenKind::Minus => (7, 8, Infix::Binary(Subtract)),
        TokenKind::Or => (7, 8, Infix::Binary(Or)),
        TokenKind::Xor => (7, 8, Infix::Binary(Xor)),

        TokenKind::Star => (9, 10, Infix::Binary(Multiply)),
        TokenKind::Slash => (9, 10, Infix::Binary(Divide)),
        TokenKind::Div => (9, 10, Infix::Binary(IntDivide)),
        TokenKind::Mod => (9, 10, Infix::Binary(Modulo)),

        _ => return None,
    };
    Some((l, r, infix))
}

/// Right binding power of prefix `+`/`-`/`NOT`.
const UNARY_BP: u8 = 11;

/// Parse an expression at the loosest binding power.
pub(crate) fn parse_expression(p: &mut Parser) -> Option<Expression> {
    expr_bp(p, 0)
}

/// A bare identifier as an expression (FOR loop variables).
pub(crate) fn parse_name_expression(p: &mut Parser) -> Expression {
    let token = p.bump();
    let quoted = token.kind == TokenKind::QuotedIdentifier;
    Expression {
        kind: ExpressionKind::Identifier {
            name: token.value.clone(),
            quoted,
        },
        start_token: token.clone(),
        end_token: token,
    }
}

fn expr_bp(p: &mut Parser, min_bp: u8) -> Option<Expression> {
    if !p.enter() {
        return None;
    }
    let result = expr_bp_inner(p, min_bp);
    p.leave();
    result
}

fn expr_bp_inner(p: &mut Parser, min_bp: u8) -> Option<Expression> {
    let mut lhs = parse_prefix(p)?;

    loop {
        let current = p.kind();

        // ── Postfix: member access (`.`) and option access (`::`) ──
        if current == TokenKind::Dot || current == TokenKind::ColonColon {
            p.bump();
            let member = match p.kind() {
                TokenKind::Identifier | TokenKind::QuotedIdentifier => p.bump(),
                _ => {
                    p.error("expected a member name");
                    return Some(lhs);
                }
            };
            lhs = Expression {
                start_token: lhs.start_token.clone(),
                end_token: member.clone(),
                kind: ExpressionKind::Member {
                    base: Box::new(lhs),
                    member: member.value,
                },
            };
            continue;
        }

        // ── Postfix: call ──
        if current == TokenKind::LeftParen {
            p.bump();
            let mut arguments = Vec::new();
            if !p.at(TokenKind::RightParen) {
                loop {
                    match expr_bp(p, 0) {
                        Some(arg) => arguments.push(arg),
                        None => break,
                    }
                    if p.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }
            let close = match p.expect(TokenKind::RightParen, "`)` to close the argument list") {
                Some(t) => t,
                None => p.prev_token(),
            };
            lhs = Expression {
                start_token: lhs.start_token.clone(),
                end_token: close,
                kind: ExpressionKind::Call {
                    callee: Box::new(lhs),
                    arguments,
                },
            };
            continue;
        }

        // ── Postfix: array access ──
        if current == TokenKind::LeftBracket {
            p.bump();
            let mut indexes = Vec::new();
            loop {
                match expr_bp(p, 0) {
                    Some(index) => indexes.push(index),
                    None => break,
                }
                if p.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            let close = match p.expect(TokenKind::RightBracket, "`]` to close the index") {
                Some(t) => t,
                None => p.prev_token(),
            };
            lhs = Expression {
                start_token: lhs.start_token.clone(),
                end_token: close,
                kind: ExpressionKind::ArrayAccess {
                    base: Box::new(lhs),
                    indexes,
                },
            };
            continue;
        }

        // ── Infix operators ──
        let Some((left_bp, right_bp, infix)) = infix_binding_power(current) else {
            break;
        };
        if left_bp < min_bp {
            break;
        }
        p.bump();
        let rhs = expr_bp(p, right_bp)?;
        lhs = Expression {
            start_token: lhs.start_token.clone(),
            end_token: rhs.end_token.clone(),
            kind: match infix {
                Infix::Binary(op) => ExpressionKind::Binary {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                },
                Infix::Range => ExpressionKind::Range {
                    low: Box::new(lhs),
                    high: Box::new(rhs),
                },
            },
        };
    }

    Some(lhs)
}

fn parse_prefix(p: &mut Parser) -> Option<Expression> {
    let op = match p.kind() {
        TokenKind::Plus => Some(UnaryOp::Plus),
        TokenKind::Minus => Some(UnaryOp::Minus),
        TokenKind::Not => Some(UnaryOp::Not),
        _ => None,
    };
    if let Some(op) = op {
        let token = p.bump();
        let operand = expr_bp(p, UNARY_BP)?;
        return Some(Expression {
            start_token: token,
            end_token: operand.end_token.clone(),
            kind: ExpressionKind::Unary {
                op,
                operand: Box::new(operand),
            },
        });
    }
    parse_primary(p)
}

fn parse_primary(p: &mut Parser) -> Option<Expression> {
    let token = p.peek().clone();
    let kind = match token.kind {
        TokenKind::Identifier => {
            p.bump();
            ExpressionKind::Identifier {
                name: token.value.clone(),
                quoted: false,
            }
        }
        TokenKind::QuotedIdentifier => {
            p.bump();
            ExpressionKind::Identifier {
                name: token.value.clone(),
                quoted: true,
            }
        }
        TokenKind::Integer => {
            p.bump();
            ExpressionKind::Literal(Literal::Integer(token.value.parse().unwrap_or(0)))
        }
        TokenKind::Decimal => {
            p.bump();
            ExpressionKind::Literal(Literal::Decimal(token.value.clone()))
        }
        TokenKind::String => {
            p.bump();
            ExpressionKind::Literal(Literal::Str(string_literal_text(&token)))
        }
        TokenKind::Date => {
            p.bump();
            ExpressionKind::Literal(Literal::Date(token.value.clone()))
        }
        TokenKind::Time => {
            p.bump();
            ExpressionKind::Literal(Literal::Time(token.value.clone()))
        }
        TokenKind::DateTime => {
            p.bump();
            ExpressionKind::Literal(Literal::DateTime(token.value.clone()))
        }
        TokenKind::True => {
            p.bump();
            ExpressionKind::Literal(Literal::Boolean(true))
        }
        TokenKind::False => {
            p.bump();
            ExpressionKind::Literal(Literal::Boolean(false))
        }
        TokenKind::LeftParen => {
            p.bump();
            let inner = expr_bp(p, 0)?;
            let close = match p.expect(TokenKind::RightParen, "`)`") {
                Some(t) => t,
                None => p.prev_token(),
            };
            return Some(Expression {
                kind: inner.kind,
                start_token: token,
                end_token: close,
            });
        }
        TokenKind::LeftBracket => {
            p.bump();
            let mut elements = Vec::new();
            if !p.at(TokenKind::RightBracket) {
                loop {
                    match expr_bp(p, 0) {
                        Some(element) => elements.push(element),
                        None => break,
                    }
                    if p.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
            }
            let close = match p.expect(TokenKind::RightBracket, "`]` to close the set") {
                Some(t) => t,
                None => p.prev_token(),
            };
            return Some(Expression {
                kind: ExpressionKind::Set { elements },
                start_token: token,
                end_token: close,
            });
        }
        _ => {
            p.error(format!(
                "expected an expression, found `{}`",
                if token.value.is_empty() {
                    "end of input"
                } else {
                    token.value.as_str()
                }
            ));
            return None;
        }
    };

    Some(Expression {
        kind,
        start_token: token.clone(),
        end_token: token,
    })
}

/// The text of a string literal with the delimiters stripped and `''`
/// unescaped.
fn string_literal_text(token: &Token) -> String {
    let v = token.value.as_str();
    let inner = v
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(v);
    inner.replace("''", "'")
}
