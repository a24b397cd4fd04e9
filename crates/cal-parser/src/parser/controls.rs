//! CONTROLS, ACTIONS, ELEMENTS, and DATASET section parsing.
//!
//! All four sections share the same row shape (`{ id ; indent ; kind
//! [; properties] }`) and the same indent-stack tree builder. The builder
//! handles non-monotonic indents correctly: for indents `0, 2, 1` the
//! entries at 2 and 1 both become children of the entry at 0.

use cal_common::token::{Token, TokenKind};

use crate::ast::{
    ActionDeclaration, ActionKind, ActionSection, ControlDeclaration, ControlKind,
    ControlSection, ElementDeclaration, ElementSection,
};

use super::{fields, properties, Parser};

// ── Indent-stack tree builder ──────────────────────────────────────────

/// Nodes assembled into trees by indent level.
trait IndentNode: Sized {
    fn indent(&self) -> i64;
    fn children_mut(&mut self) -> &mut Vec<Self>;
}

impl IndentNode for ControlDeclaration {
    fn indent(&self) -> i64 {
        self.indent_level
    }
    fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }
}

impl IndentNode for ActionDeclaration {
    fn indent(&self) -> i64 {
        self.indent_level
    }
    fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }
}

impl IndentNode for ElementDeclaration {
    fn indent(&self) -> i64 {
        self.indent_level
    }
    fn children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }
}

/// Assemble a flat row list into trees.
///
/// For each new entry: pop while the stack top's indent is >= the new
/// indent, attach the popped node to the new stack top (or the roots),
/// then push. Children therefore end up in source order.
fn assemble<T: IndentNode>(rows: Vec<T>) -> Vec<T> {
    let mut roots: Vec<T> = Vec::new();
    let mut stack: Vec<T> = Vec::new();

    for row in rows {
        while stack.last().is_some_and(|top| top.indent() >= row.indent()) {
            if let Some(done) = stack.pop() {
                attach(&mut stack, &mut roots, done);
            }
        }
        stack.push(row);
    }
    while let Some(done) = stack.pop() {
        attach(&mut stack, &mut roots, done);
    }
    roots
}

fn attach<T: IndentNode>(stack: &mut [T], roots: &mut Vec<T>, done: T) {
    match stack.last_mut() {
        Some(top) => top.children_mut().push(done),
        None => roots.push(done),
    }
}

// ── CONTROLS ───────────────────────────────────────────────────────────

/// `CONTROLS { rows }`.
pub(crate) fn parse_control_section(p: &mut Parser, start_token: Token) -> ControlSection {
    p.expect(TokenKind::LeftBrace, "`{` to open the CONTROLS section");
    let mut rows = Vec::new();
    parse_rows(p, "control", |p| {
        if let Some(row) = parse_control_row(p) {
            rows.push(row);
        }
    });
    ControlSection {
        controls: assemble(rows),
        start_token,
        end_token: p.prev_token(),
    }
}

fn parse_control_row(p: &mut Parser) -> Option<ControlDeclaration> {
    let start_token = p.bump(); // {

    let id = match p.expect(TokenKind::Integer, "a control id") {
        Some(t) => t.value.parse().unwrap_or(0),
        None => {
            p.skip_until(&[TokenKind::RightBrace]);
            p.eat(TokenKind::RightBrace);
            return None;
        }
    };
    p.expect(TokenKind::Semicolon, "`;` after the control id");

    let indent_level = parse_indent_slot(p);
    p.expect(TokenKind::Semicolon, "`;` after the indent level");

    let (kind, raw_control_type) = match p.kind() {
        TokenKind::Identifier => {
            let raw = p.bump().value;
            match ControlKind::from_name(&raw) {
                Some(kind) => (kind, None),
                None => (ControlKind::Field, Some(raw)),
            }
        }
        _ => {
            p.error("expected a control type");
            (ControlKind::Field, None)
        }
    };

    let mut props = Vec::new();
    if p.eat(TokenKind::Semicolon).is_some() {
        props = properties::parse_property_list(p);
    }
    p.expect(TokenKind::RightBrace, "`}` to close the control row");

    Some(ControlDeclaration {
        id,
        indent_level,
        kind,
        raw_control_type,
        properties: props,
        children: Vec::new(),
        start_token,
        end_token: p.prev_token(),
    })
}

// ── ACTIONS ────────────────────────────────────────────────────────────

/// `ACTIONS { rows }` plus the structural nesting checks.
pub(crate) fn parse_action_section(p: &mut Parser, start_token: Token) -> ActionSection {
    p.expect(TokenKind::LeftBrace, "`{` to open the ACTIONS section");
    let mut rows = Vec::new();
    parse_rows(p, "action", |p| {
        if let Some(row) = parse_action_row(p) {
            rows.push(row);
        }
    });
    let actions = assemble(rows);
    validate_action_nesting(p, &actions, true);
    ActionSection {
        actions,
        start_token,
        end_token: p.prev_token(),
    }
}

fn parse_action_row(p: &mut Parser) -> Option<ActionDeclaration> {
    let start_token = p.bump(); // {

    let id = match p.expect(TokenKind::Integer, "an action id") {
        Some(t) => t.value.parse().unwrap_or(0),
        None => {
            p.skip_until(&[TokenKind::RightBrace]);
            p.eat(TokenKind::RightBrace);
            return None;
        }
    };
    p.expect(TokenKind::Semicolon, "`;` after the action id");

    let indent_level = parse_indent_slot(p);
    p.expect(TokenKind::Semicolon, "`;` after the indent level");

    let (kind, raw_action_type) = match p.kind() {
        TokenKind::Identifier => {
            let raw = p.bump().value;
            match ActionKind::from_name(&raw) {
                Some(kind) => (kind, None),
                None => (ActionKind::Action, Some(raw)),
            }
        }
        _ => {
            p.error("expected an action type");
            (ActionKind::Action, None)
        }
    };

    let mut props = Vec::new();
    if p.eat(TokenKind::Semicolon).is_some() {
        props = properties::parse_property_list(p);
    }
    p.expect(TokenKind::RightBrace, "`}` to close the action row");

    Some(ActionDeclaration {
        id,
        indent_level,
        kind,
        raw_action_type,
        properties: props,
        children: Vec::new(),
        start_token,
        end_token: p.prev_token(),
    })
}

/// Structural rules for the action tree, reported as warnings:
/// roots must be containers, containers must not nest, and leaf kinds
/// must not own children.
fn validate_action_nesting(p: &mut Parser, actions: &[ActionDeclaration], at_root: bool) {
    for action in actions {
        if at_root && action.kind != ActionKind::ActionContainer {
            p.warning_at(
                "only an ActionContainer may appear at the root of ACTIONS",
                action.start_token.clone(),
            );
        }
        if !at_root && action.kind == ActionKind::ActionContainer {
            p.warning_at(
                "an ActionContainer must not be nested",
                action.start_token.clone(),
            );
        }
        if !action.kind.allows_children() && !action.children.is_empty() {
            p.warning_at(
                format!("a {:?} cannot have child actions", action.kind),
                action.start_token.clone(),
            );
        }
        validate_action_nesting(p, &action.children, false);
    }
}

// ── ELEMENTS / DATASET ─────────────────────────────────────────────────

/// `ELEMENTS { rows }` or `DATASET { rows }`. Rows keep their kind slot
/// as raw text; query columns, XMLport nodes, and report data items all
/// pass through here.
pub(crate) fn parse_element_section(p: &mut Parser, start_token: Token) -> ElementSection {
    p.expect(TokenKind::LeftBrace, "`{` to open the section");
    let mut rows = Vec::new();
    parse_rows(p, "element", |p| {
        if let Some(row) = parse_element_row(p) {
            rows.push(row);
        }
    });
    ElementSection {
        elements: assemble(rows),
        start_token,
        end_token: p.prev_token(),
    }
}

/// Element/dataset row kinds whose slot position identifies them.
const ELEMENT_KINDS: &[&str] = &[
    "element", "attribute", "dataitem", "column", "filter", "text", "table", "field",
];

fn parse_element_row(p: &mut Parser) -> Option<ElementDeclaration> {
    let start_token = p.bump(); // {

    // First slot: a numeric id, a bracketed GUID, or empty.
    let id = match p.kind() {
        TokenKind::Integer => p.bump().value.parse().ok(),
        TokenKind::Semicolon => None,
        _ => {
            skip_slot(p);
            None
        }
    };
    p.expect(TokenKind::Semicolon, "`;` after the element id");

    let indent_level = parse_indent_slot(p);
    p.expect(TokenKind::Semicolon, "`;` after the indent level");

    // Slots three and four: name and kind, in either order (reports put
    // the kind first, queries and XMLports the name).
    let (slot_a, _) = fields::parse_entity_name(p);
    let mut name = slot_a.clone();
    let mut element_kind = String::new();
    if is_element_kind(&slot_a) {
        element_kind = slot_a;
        name.clear();
    }
    if p.eat(TokenKind::Semicolon).is_some()
        && !p.at(TokenKind::RightBrace)
        && !p.at(TokenKind::Semicolon)
    {
        let (slot_b, _) = fields::parse_entity_name(p);
        if element_kind.is_empty() && is_element_kind(&slot_b) {
            element_kind = slot_b;
        } else if name.is_empty() {
            name = slot_b;
        } else {
            // Neither empty: slot b is the kind slot regardless.
            element_kind = slot_b;
        }
    }

    let mut props = Vec::new();
    if p.eat(TokenKind::Semicolon).is_some() {
        props = properties::parse_property_list(p);
    }
    p.expect(TokenKind::RightBrace, "`}` to close the element row");

    Some(ElementDeclaration {
        id,
        indent_level,
        name,
        element_kind,
        properties: props,
        children: Vec::new(),
        start_token,
        end_token: p.prev_token(),
    })
}

fn is_element_kind(slot: &str) -> bool {
    ELEMENT_KINDS
        .iter()
        .any(|k| slot.eq_ignore_ascii_case(k))
}

// ── Shared helpers ─────────────────────────────────────────────────────

/// Drive a `{ row }*` loop with junk recovery until the section's `}`.
fn parse_rows(p: &mut Parser, what: &str, mut parse_row: impl FnMut(&mut Parser)) {
    loop {
        match p.kind() {
            TokenKind::RightBrace => {
                p.bump();
                return;
            }
            TokenKind::Eof => {
                p.error(format!("missing `}}` to close the {what} section"));
                return;
            }
            TokenKind::LeftBrace => parse_row(p),
            _ => {
                let token = p.bump();
                p.error_at(
                    format!("expected a {what} row, found `{}`", token.value),
                    token,
                );
            }
        }
    }
}

/// The indent slot: an integer, or empty meaning zero.
fn parse_indent_slot(p: &mut Parser) -> i64 {
    match p.kind() {
        TokenKind::Integer => p.bump().value.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Skip one slot (up to `;` or the row's `}`), tolerating bracketed GUID
/// runs whose braces pair internally.
fn skip_slot(p: &mut Parser) {
    let mut brace_depth = 0u32;
    loop {
        match p.kind() {
            TokenKind::Semicolon if brace_depth == 0 => return,
            TokenKind::RightBrace if brace_depth == 0 => return,
            TokenKind::RightBrace => {
                brace_depth -= 1;
                p.bump();
            }
            TokenKind::LeftBrace => {
                brace_depth += 1;
                p.bump();
            }
            TokenKind::Eof => return,
            _ => {
                p.bump();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cal_lexer::Lexer;

    fn controls(source: &str) -> (ControlSection, Vec<cal_common::diagnostic::Diagnostic>) {
        let mut p = Parser::new(Lexer::tokenize(source));
        let start = p.bump(); // CONTROLS
        let section = parse_control_section(&mut p, start);
        (section, p.diagnostics)
    }

    fn actions(source: &str) -> (ActionSection, Vec<cal_common::diagnostic::Diagnostic>) {
        let mut p = Parser::new(Lexer::tokenize(source));
        let start = p.bump(); // ACTIONS
        let section = parse_action_section(&mut p, start);
        (section, p.diagnostics)
    }

    #[test]
    fn monotonic_indents_nest() {
        let (section, diags) = controls(
            "CONTROLS { { 1;0;Container } { 2;1;Group } { 3;2;Field } }",
        );
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(section.controls.len(), 1);
        let root = &section.controls[0];
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].children.len(), 1);
    }

    #[test]
    fn indent_gap_makes_siblings_not_nesting() {
        // 0 -> 2 -> 1: both entries are children of the root, in source
        // order, and the indent-2 entry gets no children.
        let (section, diags) = controls(
            "CONTROLS { { 1;0;Container } { 2;2;Field } { 3;1;Field } }",
        );
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(section.controls.len(), 1);
        let root = &section.controls[0];
        assert_eq!(root.id, 1);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].id, 2);
        assert_eq!(root.children[0].indent_level, 2);
        assert!(root.children[0].children.is_empty());
        assert_eq!(root.children[1].id, 3);
        assert_eq!(root.children[1].indent_level, 1);
    }

    #[test]
    fn unknown_control_kind_defaults_to_field() {
        let (section, _) = controls("CONTROLS { { 1;0;Widget } }");
        let control = &section.controls[0];
        assert_eq!(control.kind, ControlKind::Field);
        assert_eq!(control.raw_control_type.as_deref(), Some("Widget"));
    }

    #[test]
    fn control_properties_and_trigger() {
        let (section, diags) = controls(
            "CONTROLS { { 1;0;Container;ContainerType=ContentArea } { 2;1;Field;SourceExpr=\"No.\";OnValidate=BEGIN END; } }",
        );
        assert!(diags.is_empty(), "{diags:?}");
        let field = &section.controls[0].children[0];
        assert_eq!(field.properties.len(), 2);
        assert!(field.properties[1].is_trigger());
    }

    #[test]
    fn action_nesting_warnings() {
        let (section, diags) = actions(
            "ACTIONS { { 1;0;Action } { 2;1;ActionContainer } }",
        );
        assert_eq!(section.actions.len(), 1);
        assert!(diags.iter().any(|d| d.message.contains("root of ACTIONS")));
        assert!(diags.iter().any(|d| d.message.contains("must not be nested")));
        assert!(diags.iter().any(|d| d.message.contains("cannot have child actions")));
    }

    #[test]
    fn valid_action_tree_has_no_warnings() {
        let (_, diags) = actions(
            "ACTIONS { { 1;0;ActionContainer;ActionContainerType=ActionItems } { 2;1;ActionGroup } { 3;2;Action;OnAction=BEGIN END; } }",
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn element_rows_for_query() {
        let source = "ELEMENTS { { 1;0;DataItemName;DataItem;DataItemTable=Table18 } { 2;1;No;Column;DataSource=No. } }";
        let mut p = Parser::new(Lexer::tokenize(source));
        let start = p.bump();
        let section = parse_element_section(&mut p, start);
        assert!(p.diagnostics.is_empty(), "{:?}", p.diagnostics);
        assert_eq!(section.elements.len(), 1);
        let root = &section.elements[0];
        assert_eq!(root.name, "DataItemName");
        assert!(root.element_kind.eq_ignore_ascii_case("dataitem"));
        assert_eq!(root.children.len(), 1);
    }
}
