//! Statement parsing, including the empty-body legality rules:
//! `THEN;` is a valid empty statement, `THEN END` is an error, and
//! `BEGIN END` is a valid empty block.

use cal_common::token::TokenKind;

use crate::ast::{AssignOp, CaseBranch, Statement, StatementKind};

use super::{expressions, Parser};

/// `BEGIN statements END` -- the cursor must be at `BEGIN`. Returns the
/// inner statements; the `END` is consumed when present.
pub(crate) fn parse_block_body(p: &mut Parser) -> Vec<Statement> {
    p.bump(); // BEGIN
    let statements = parse_statement_sequence(p, &[TokenKind::End]);
    p.expect(TokenKind::End, "`END` to close the block");
    statements
}

/// Parse statements separated by `;` until one of the terminator kinds.
/// `}`, end of input, and stray section boundaries always stop the
/// sequence so recovery can never loop.
pub(crate) fn parse_statement_sequence(
    p: &mut Parser,
    terminators: &[TokenKind],
) -> Vec<Statement> {
    let mut out = Vec::new();
    loop {
        while p.eat(TokenKind::Semicolon).is_some() {}
        let kind = p.kind();
        if terminators.contains(&kind)
            || kind == TokenKind::RightBrace
            || kind == TokenKind::Eof
        {
            break;
        }

        match parse_statement(p) {
            Some(statement) => {
                out.push(statement);
                let kind = p.kind();
                if kind != TokenKind::Semicolon
                    && !terminators.contains(&kind)
                    && kind != TokenKind::RightBrace
                    && kind != TokenKind::Eof
                {
                    p.error("expected `;` between statements");
                }
            }
            None => {
                let before = p.mark();
                p.skip_until(&[
                    TokenKind::Semicolon,
                    TokenKind::End,
                    TokenKind::Else,
                    TokenKind::Until,
                    TokenKind::Begin,
                    TokenKind::RightBrace,
                ]);
                match p.kind() {
                    TokenKind::Semicolon => {
                        p.bump();
                    }
                    kind if terminators.contains(&kind) => break,
                    TokenKind::RightBrace | TokenKind::Eof => break,
                    _ => {
                        // The failed statement may not have consumed
                        // anything; force progress before retrying.
                        if p.mark() == before {
                            p.bump();
                        }
                    }
                }
            }
        }
    }
    out
}

/// Parse one statement. Returns `None` after reporting when no statement
/// could be formed; the caller recovers.
pub(crate) fn parse_statement(p: &mut Parser) -> Option<Statement> {
    if !p.enter() {
        return None;
    }
    let result = parse_statement_inner(p);
    p.leave();
    result
}

fn parse_statement_inner(p: &mut Parser) -> Option<Statement> {
    let start_token = p.peek().clone();

    let kind = match p.kind() {
        TokenKind::If => parse_if(p)?,
        TokenKind::While => parse_while(p)?,
        TokenKind::Repeat => parse_repeat(p)?,
        TokenKind::For => parse_for(p)?,
        TokenKind::With => parse_with(p)?,
        TokenKind::Case => parse_case(p)?,
        TokenKind::Begin => StatementKind::Block {
            statements: parse_block_body(p),
        },
        TokenKind::Exit => parse_exit(p)?,
        _ => parse_expression_statement(p)?,
    };

    Some(Statement {
        kind,
        start_token,
        end_token: p.prev_token(),
    })
}

// ── Control flow ───────────────────────────────────────────────────────

fn parse_if(p: &mut Parser) -> Option<StatementKind> {
    p.bump(); // IF
    let condition = expressions::parse_expression(p)?;
    p.expect(TokenKind::Then, "`THEN`");
    let then_branch = parse_branch(p, "THEN", true);
    let else_branch = if p.eat(TokenKind::Else).is_some() {
        Some(Box::new(parse_branch(p, "ELSE", false)))
    } else {
        None
    };
    Some(StatementKind::If {
        condition,
        then_branch: Box::new(then_branch),
        else_branch,
    })
}

fn parse_while(p: &mut Parser) -> Option<StatementKind> {
    p.bump(); // WHILE
    let condition = expressions::parse_expression(p)?;
    p.expect(TokenKind::Do, "`DO`");
    let body = parse_branch(p, "DO", false);
    Some(StatementKind::While {
        condition,
        body: Box::new(body),
    })
}

fn parse_repeat(p: &mut Parser) -> Option<StatementKind> {
    p.bump(); // REPEAT
    let body = parse_statement_sequence(p, &[TokenKind::Until]);
    p.expect(TokenKind::Until, "`UNTIL` to close the REPEAT statement")?;
    let condition = expressions::parse_expression(p)?;
    Some(StatementKind::Repeat { body, condition })
}

fn parse_for(p: &mut Parser) -> Option<StatementKind> {
    p.bump(); // FOR
    let variable = match p.kind() {
        TokenKind::Identifier | TokenKind::QuotedIdentifier => {
            expressions::parse_name_expression(p)
        }
        _ => {
            p.error("expected a loop variable after FOR");
            return None;
        }
    };
    p.expect(TokenKind::Assign, "`:=` after the loop variable")?;
    let initial = expressions::parse_expression(p)?;
    let downto = match p.kind() {
        TokenKind::To => {
            p.bump();
            false
        }
        TokenKind::DownTo => {
            p.bump();
            true
        }
        _ => {
            p.error("expected `TO` or `DOWNTO`");
            false
        }
    };
    let limit = expressions::parse_expression(p)?;
    p.expect(TokenKind::Do, "`DO`");
    let body = parse_branch(p, "DO", false);
    Some(StatementKind::For {
        variable,
        initial,
        limit,
        downto,
        body: Box::new(body),
    })
}

fn parse_with(p: &mut Parser) -> Option<StatementKind> {
    p.bump(); // WITH
    let subject = expressions::parse_expression(p)?;
    p.expect(TokenKind::Do, "`DO`");
    let body = parse_branch(p, "DO", false);
    Some(StatementKind::With {
        subject,
        body: Box::new(body),
    })
}

fn parse_case(p: &mut Parser) -> Option<StatementKind> {
    p.bump(); // CASE
    let scrutinee = expressions::parse_expression(p)?;
    p.expect(TokenKind::Of, "`OF`");

    let mut branches = Vec::new();
    let mut else_branch = None;
    loop {
        match p.kind() {
            TokenKind::End | TokenKind::RightBrace | TokenKind::Eof => break,
            TokenKind::Else => {
                p.bump();
                else_branch = Some(parse_statement_sequence(p, &[TokenKind::End]));
                break;
            }
            TokenKind::Semicolon => {
                p.bump();
            }
            _ => match parse_case_branch(p) {
                Some(branch) => branches.push(branch),
                None => {
                    p.skip_until(&[TokenKind::Semicolon, TokenKind::Else, TokenKind::End]);
                    p.eat(TokenKind::Semicolon);
                }
            },
        }
    }
    p.expect(TokenKind::End, "`END` to close the CASE statement");

    Some(StatementKind::Case {
        scrutinee,
        branches,
        else_branch,
    })
}

fn parse_case_branch(p: &mut Parser) -> Option<CaseBranch> {
    let start_token = p.peek().clone();
    let mut labels = vec![expressions::parse_expression(p)?];
    while p.eat(TokenKind::Comma).is_some() {
        labels.push(expressions::parse_expression(p)?);
    }
    p.expect(TokenKind::Colon, "`:` after the case labels")?;
    let statements = parse_case_arm(p);
    Some(CaseBranch {
        labels,
        statements,
        start_token,
        end_token: p.prev_token(),
    })
}

/// The statements of one case arm: like a normal sequence, but also
/// terminated when the lookahead sees the next `labels :` run.
fn parse_case_arm(p: &mut Parser) -> Vec<Statement> {
    let mut out = Vec::new();
    loop {
        while p.eat(TokenKind::Semicolon).is_some() {}
        match p.kind() {
            TokenKind::End | TokenKind::Else | TokenKind::RightBrace | TokenKind::Eof => break,
            _ => {}
        }
        if at_case_label(p) {
            break;
        }
        match parse_statement(p) {
            Some(statement) => out.push(statement),
            None => {
                p.skip_until(&[TokenKind::Semicolon, TokenKind::Else, TokenKind::End]);
                if p.eat(TokenKind::Semicolon).is_none() {
                    break;
                }
            }
        }
    }
    out
}

/// Lookahead: does a `labels :` run start here? True when a top-level
/// `:` appears before any statement boundary. `::` is one token, so
/// scope operators never confuse the scan.
fn at_case_label(p: &mut Parser) -> bool {
    let mut n = 0;
    let mut depth = 0u32;
    loop {
        match p.peek_nth(n).kind {
            TokenKind::LeftParen | TokenKind::LeftBracket => depth += 1,
            TokenKind::RightParen | TokenKind::RightBracket => depth = depth.saturating_sub(1),
            TokenKind::Colon if depth == 0 => return true,
            // Label values are plain expressions; any statement keyword
            // or boundary means this is a statement, not a label.
            TokenKind::Assign
            | TokenKind::PlusAssign
            | TokenKind::MinusAssign
            | TokenKind::StarAssign
            | TokenKind::SlashAssign
            | TokenKind::Semicolon
            | TokenKind::End
            | TokenKind::Else
            | TokenKind::Begin
            | TokenKind::If
            | TokenKind::While
            | TokenKind::For
            | TokenKind::With
            | TokenKind::Case
            | TokenKind::Repeat
            | TokenKind::Until
            | TokenKind::Exit
            | TokenKind::Then
            | TokenKind::Do
            | TokenKind::Of
            | TokenKind::RightBrace
            | TokenKind::Eof => return false,
            _ => {}
        }
        n += 1;
        if n > 64 {
            return false;
        }
    }
}

// ── Simple statements ──────────────────────────────────────────────────

fn parse_exit(p: &mut Parser) -> Option<StatementKind> {
    p.bump(); // EXIT
    let value = if p.eat(TokenKind::LeftParen).is_some() {
        let value = expressions::parse_expression(p);
        p.expect(TokenKind::RightParen, "`)` after the EXIT value");
        value
    } else {
        None
    };
    Some(StatementKind::Exit { value })
}

fn parse_expression_statement(p: &mut Parser) -> Option<StatementKind> {
    let target = expressions::parse_expression(p)?;

    let operator = match p.kind() {
        TokenKind::Assign => Some(AssignOp::Assign),
        TokenKind::PlusAssign => Some(AssignOp::Add),
        TokenKind::MinusAssign => Some(AssignOp::Subtract),
        TokenKind::StarAssign => Some(AssignOp::Multiply),
        TokenKind::SlashAssign => Some(AssignOp::Divide),
        _ => None,
    };

    match operator {
        Some(operator) => {
            p.bump();
            let value = expressions::parse_expression(p)?;
            Some(StatementKind::Assignment {
                target,
                operator,
                value,
            })
        }
        None => Some(StatementKind::Call { expression: target }),
    }
}

// ── Branch bodies ──────────────────────────────────────────────────────

/// The statement after `THEN`/`ELSE`/`DO`.
///
/// `;` makes a valid empty statement (left for the enclosing construct
/// to consume, except before `ELSE` where it must be swallowed so the
/// `ELSE` stays visible). A body-closing keyword in statement position
/// is an error: `END` cannot be a statement.
fn parse_branch(p: &mut Parser, after: &str, allow_else: bool) -> Statement {
    let token = p.peek().clone();
    match p.kind() {
        TokenKind::Semicolon => {
            if allow_else && p.peek_nth(1).kind == TokenKind::Else {
                p.bump();
            }
            Statement {
                kind: StatementKind::Empty,
                start_token: token.clone(),
                end_token: token,
            }
        }
        TokenKind::End | TokenKind::Else | TokenKind::Until | TokenKind::Eof => {
            p.error_at(
                format!(
                    "expected a statement after {after}, found `{}` (use `;` for an empty body)",
                    token.value
                ),
                token.clone(),
            );
            Statement {
                kind: StatementKind::Empty,
                start_token: token.clone(),
                end_token: token,
            }
        }
        _ => parse_statement(p).unwrap_or(Statement {
            kind: StatementKind::Empty,
            start_token: token.clone(),
            end_token: token,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cal_lexer::Lexer;

    fn parse_stmts(source: &str) -> (Vec<Statement>, Vec<cal_common::diagnostic::Diagnostic>) {
        let mut p = Parser::new(Lexer::tokenize(source));
        let stmts = parse_statement_sequence(&mut p, &[TokenKind::End]);
        (stmts, p.diagnostics)
    }

    fn single(source: &str) -> (Statement, Vec<cal_common::diagnostic::Diagnostic>) {
        let (mut stmts, diags) = parse_stmts(source);
        assert_eq!(stmts.len(), 1, "expected one statement: {stmts:?}");
        (stmts.remove(0), diags)
    }

    #[test]
    fn if_then_semicolon_is_empty_statement() {
        let (stmt, diags) = single("IF TRUE THEN;");
        assert!(diags.is_empty(), "{diags:?}");
        match stmt.kind {
            StatementKind::If { then_branch, else_branch, .. } => {
                assert_eq!(then_branch.kind, StatementKind::Empty);
                assert!(else_branch.is_none());
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn if_then_end_is_an_error() {
        let (stmts, diags) = parse_stmts("IF TRUE THEN END");
        assert!(diags.iter().any(|d| d.message.contains("THEN")));
        // The IF node still exists with an empty body.
        assert!(matches!(stmts[0].kind, StatementKind::If { .. }));
    }

    #[test]
    fn if_then_semicolon_else_branch() {
        let (stmt, diags) = single("IF x THEN; ELSE y := 1;");
        assert!(diags.is_empty(), "{diags:?}");
        match stmt.kind {
            StatementKind::If { then_branch, else_branch, .. } => {
                assert_eq!(then_branch.kind, StatementKind::Empty);
                let else_branch = else_branch.expect("else branch");
                assert!(matches!(else_branch.kind, StatementKind::Assignment { .. }));
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn empty_else_end_is_an_error() {
        let (_, diags) = parse_stmts("IF x THEN y := 1 ELSE END");
        assert!(diags.iter().any(|d| d.message.contains("ELSE")));
    }

    #[test]
    fn begin_end_is_a_valid_empty_block() {
        let (stmt, diags) = single("BEGIN END");
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(stmt.kind, StatementKind::Block { statements: vec![] });
    }

    #[test]
    fn while_do_semicolon_valid_do_end_error() {
        let (_, diags) = parse_stmts("WHILE x DO;");
        assert!(diags.is_empty(), "{diags:?}");
        let (_, diags) = parse_stmts("WHILE x DO END");
        assert!(diags.iter().any(|d| d.message.contains("DO")));
    }

    #[test]
    fn repeat_until() {
        let (stmt, diags) = single("REPEAT x := x + 1 UNTIL x > 10");
        assert!(diags.is_empty(), "{diags:?}");
        match stmt.kind {
            StatementKind::Repeat { body, .. } => assert_eq!(body.len(), 1),
            other => panic!("expected Repeat, got {other:?}"),
        }
    }

    #[test]
    fn for_to_and_downto() {
        let (stmt, diags) = single("FOR i := 1 TO 10 DO x := x + i;");
        assert!(diags.is_empty(), "{diags:?}");
        assert!(matches!(stmt.kind, StatementKind::For { downto: false, .. }));

        let (stmt, _) = single("FOR i := 10 DOWNTO 1 DO;");
        assert!(matches!(stmt.kind, StatementKind::For { downto: true, .. }));
    }

    #[test]
    fn with_do() {
        let (stmt, diags) = single("WITH Customer DO Name := 'x';");
        assert!(diags.is_empty(), "{diags:?}");
        assert!(matches!(stmt.kind, StatementKind::With { .. }));
    }

    #[test]
    fn case_with_ranges_and_else() {
        let (stmt, diags) = single(
            "CASE x OF 1, 2 : y := 1; 3..5 : y := 2; ELSE y := 0; END",
        );
        assert!(diags.is_empty(), "{diags:?}");
        match stmt.kind {
            StatementKind::Case { branches, else_branch, .. } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[0].labels.len(), 2);
                assert_eq!(branches[1].labels.len(), 1);
                assert!(else_branch.is_some());
            }
            other => panic!("expected Case, got {other:?}"),
        }
    }

    #[test]
    fn exit_with_and_without_value() {
        let (stmt, diags) = single("EXIT(Total)");
        assert!(diags.is_empty(), "{diags:?}");
        assert!(matches!(stmt.kind, StatementKind::Exit { value: Some(_) }));

        let (stmt, _) = single("EXIT");
        assert!(matches!(stmt.kind, StatementKind::Exit { value: None }));
    }

    #[test]
    fn compound_assignment() {
        let (stmt, diags) = single("Total += Amount");
        assert!(diags.is_empty(), "{diags:?}");
        assert!(matches!(
            stmt.kind,
            StatementKind::Assignment { operator: AssignOp::Add, .. }
        ));
    }

    #[test]
    fn call_statement() {
        let (stmt, diags) = single("Customer.MODIFY(TRUE)");
        assert!(diags.is_empty(), "{diags:?}");
        assert!(matches!(stmt.kind, StatementKind::Call { .. }));
    }

    #[test]
    fn missing_semicolon_reported_but_both_statements_kept() {
        let (stmts, diags) = parse_stmts("x := 1 y := 2");
        assert_eq!(stmts.len(), 2);
        assert!(diags.iter().any(|d| d.message.contains("`;`")));
    }

    #[test]
    fn deeply_nested_input_is_bounded() {
        let mut source = String::new();
        for _ in 0..400 {
            source.push_str("BEGIN ");
        }
        let (_, diags) = parse_stmts(&source);
        assert!(diags.iter().any(|d| d.message.contains("nested too deeply")));
    }
}
