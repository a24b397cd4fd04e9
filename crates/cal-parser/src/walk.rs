//! Depth-first AST walker with a configurable depth ceiling.
//!
//! Feature providers implement [`Visitor`] and override only the node
//! families they care about; everything else descends by default. The
//! walker counts nesting depth and refuses to descend past the ceiling,
//! recording a warning instead -- pathological input can therefore never
//! exhaust the stack of a consumer.

use cal_common::diagnostic::Diagnostic;
use cal_common::token::Token;

use crate::ast::{
    ActionDeclaration, ControlDeclaration, Document, ElementDeclaration, Expression,
    ExpressionKind, FieldDeclaration, FieldGroupDeclaration, KeyDeclaration, ObjectDeclaration,
    ParameterDeclaration, ProcedureDeclaration, Property, Statement, StatementKind,
    TriggerDeclaration, VariableDeclaration,
};

/// What a visitor callback wants the walker to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl {
    /// Recurse into the node's children (the default everywhere).
    Descend,
    /// Do not recurse into this node's children.
    Skip,
}

/// One callback per node family; every default returns
/// [`VisitControl::Descend`].
#[allow(unused_variables)]
pub trait Visitor {
    fn visit_object(&mut self, node: &ObjectDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_property(&mut self, node: &Property) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_field(&mut self, node: &FieldDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_key(&mut self, node: &KeyDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_field_group(&mut self, node: &FieldGroupDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_variable(&mut self, node: &VariableDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_parameter(&mut self, node: &ParameterDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_procedure(&mut self, node: &ProcedureDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_trigger(&mut self, node: &TriggerDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_control(&mut self, node: &ControlDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_action(&mut self, node: &ActionDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_element(&mut self, node: &ElementDeclaration) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_statement(&mut self, node: &Statement) -> VisitControl {
        VisitControl::Descend
    }
    fn visit_expression(&mut self, node: &Expression) -> VisitControl {
        VisitControl::Descend
    }
}

/// Default traversal depth ceiling.
pub const DEFAULT_MAX_DEPTH: usize = 500;

/// The walker. Collects one warning per subtree that exceeded the depth
/// ceiling.
pub struct Walker {
    max_depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Default for Walker {
    fn default() -> Self {
        Self::new()
    }
}

impl Walker {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            diagnostics: Vec::new(),
        }
    }

    /// Diagnostics recorded so far (depth violations).
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Walk a whole document.
    pub fn walk(&mut self, document: &Document, visitor: &mut dyn Visitor) {
        if let Some(object) = &document.object {
            self.walk_object(object, visitor);
        }
    }

    /// True when descent below `depth` is still allowed.
    fn check_depth(&mut self, depth: usize, token: &Token) -> bool {
        if depth > self.max_depth {
            self.diagnostics.push(Diagnostic::warning(
                "maximum nesting depth exceeded",
                token.clone(),
            ));
            false
        } else {
            true
        }
    }

    fn walk_object(&mut self, object: &ObjectDeclaration, visitor: &mut dyn Visitor) {
        if visitor.visit_object(object) == VisitControl::Skip {
            return;
        }

        for section in [&object.object_properties, &object.properties]
            .into_iter()
            .flatten()
        {
            for property in &section.properties {
                self.walk_property(property, visitor, 1);
            }
        }
        if let Some(fields) = &object.fields {
            for field in &fields.fields {
                self.walk_field(field, visitor, 1);
            }
        }
        if let Some(keys) = &object.keys {
            for key in &keys.keys {
                self.walk_key(key, visitor, 1);
            }
        }
        if let Some(groups) = &object.field_groups {
            for group in &groups.groups {
                visitor.visit_field_group(group);
            }
        }
        if let Some(code) = &object.code {
            for variable in &code.variables {
                visitor.visit_variable(variable);
            }
            for procedure in &code.procedures {
                self.walk_procedure(procedure, visitor, 1);
            }
            for trigger in &code.triggers {
                self.walk_trigger(trigger, visitor, 1);
            }
            if let Some(trigger) = &code.document_trigger {
                self.walk_trigger(trigger, visitor, 1);
            }
        }
        if let Some(controls) = &object.controls {
            for control in &controls.controls {
                self.walk_control(control, visitor, 1);
            }
        }
        if let Some(actions) = &object.actions {
            for action in &actions.actions {
                self.walk_action(action, visitor, 1);
            }
        }
        for section in [&object.elements, &object.dataset].into_iter().flatten() {
            for element in &section.elements {
                self.walk_element(element, visitor, 1);
            }
        }
    }

    fn walk_property(&mut self, property: &Property, visitor: &mut dyn Visitor, depth: usize) {
        if visitor.visit_property(property) == VisitControl::Skip {
            return;
        }
        if let Some(trigger) = &property.trigger {
            self.walk_trigger(trigger, visitor, depth + 1);
        }
    }

    fn walk_field(&mut self, field: &FieldDeclaration, visitor: &mut dyn Visitor, depth: usize) {
        if visitor.visit_field(field) == VisitControl::Skip {
            return;
        }
        for property in &field.properties {
            self.walk_property(property, visitor, depth + 1);
        }
    }

    fn walk_key(&mut self, key: &KeyDeclaration, visitor: &mut dyn Visitor, depth: usize) {
        if visitor.visit_key(key) == VisitControl::Skip {
            return;
        }
        for property in &key.properties {
            self.walk_property(property, visitor, depth + 1);
        }
    }

    fn walk_procedure(
        &mut self,
        procedure: &ProcedureDeclaration,
        visitor: &mut dyn Visitor,
        depth: usize,
    ) {
        if visitor.visit_procedure(procedure) == VisitControl::Skip {
            return;
        }
        for parameter in &procedure.parameters {
            visitor.visit_parameter(parameter);
        }
        for variable in &procedure.variables {
            visitor.visit_variable(variable);
        }
        for statement in &procedure.body {
            self.walk_statement(statement, visitor, depth + 1);
        }
    }

    fn walk_trigger(
        &mut self,
        trigger: &TriggerDeclaration,
        visitor: &mut dyn Visitor,
        depth: usize,
    ) {
        if visitor.visit_trigger(trigger) == VisitControl::Skip {
            return;
        }
        for variable in &trigger.variables {
            visitor.visit_variable(variable);
        }
        for statement in &trigger.body {
            self.walk_statement(statement, visitor, depth + 1);
        }
    }

    fn walk_control(
        &mut self,
        control: &ControlDeclaration,
        visitor: &mut dyn Visitor,
        depth: usize,
    ) {
        if !self.check_depth(depth, &control.start_token) {
            return;
        }
        if visitor.visit_control(control) == VisitControl::Skip {
            return;
        }
        for property in &control.properties {
            self.walk_property(property, visitor, depth + 1);
        }
        for child in &control.children {
            self.walk_control(child, visitor, depth + 1);
        }
    }

    fn walk_action(&mut self, action: &ActionDeclaration, visitor: &mut dyn Visitor, depth: usize) {
        if !self.check_depth(depth, &action.start_token) {
            return;
        }
        if visitor.visit_action(action) == VisitControl::Skip {
            return;
        }
        for property in &action.properties {
            self.walk_property(property, visitor, depth + 1);
        }
        for child in &action.children {
            self.walk_action(child, visitor, depth + 1);
        }
    }

    fn walk_element(
        &mut self,
        element: &ElementDeclaration,
        visitor: &mut dyn Visitor,
        depth: usize,
    ) {
        if !self.check_depth(depth, &element.start_token) {
            return;
        }
        if visitor.visit_element(element) == VisitControl::Skip {
            return;
        }
        for property in &element.properties {
            self.walk_property(property, visitor, depth + 1);
        }
        for child in &element.children {
            self.walk_element(child, visitor, depth + 1);
        }
    }

    fn walk_statement(
        &mut self,
        statement: &Statement,
        visitor: &mut dyn Visitor,
        depth: usize,
    ) {
        if !self.check_depth(depth, &statement.start_token) {
            return;
        }
        if visitor.visit_statement(statement) == VisitControl::Skip {
            return;
        }
        match &statement.kind {
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.walk_expression(condition, visitor, depth + 1);
                self.walk_statement(then_branch, visitor, depth + 1);
                if let Some(else_branch) = else_branch {
                    self.walk_statement(else_branch, visitor, depth + 1);
                }
            }
            StatementKind::While { condition, body } => {
                self.walk_expression(condition, visitor, depth + 1);
                self.walk_statement(body, visitor, depth + 1);
            }
            StatementKind::Repeat { body, condition } => {
                for statement in body {
                    self.walk_statement(statement, visitor, depth + 1);
                }
                self.walk_expression(condition, visitor, depth + 1);
            }
            StatementKind::For {
                variable,
                initial,
                limit,
                body,
                ..
            } => {
                self.walk_expression(variable, visitor, depth + 1);
                self.walk_expression(initial, visitor, depth + 1);
                self.walk_expression(limit, visitor, depth + 1);
                self.walk_statement(body, visitor, depth + 1);
            }
            StatementKind::Case {
                scrutinee,
                branches,
                else_branch,
            } => {
                self.walk_expression(scrutinee, visitor, depth + 1);
                for branch in branches {
                    for label in &branch.labels {
                        self.walk_expression(label, visitor, depth + 1);
                    }
                    for statement in &branch.statements {
                        self.walk_statement(statement, visitor, depth + 1);
                    }
                }
                if let Some(statements) = else_branch {
                    for statement in statements {
                        self.walk_statement(statement, visitor, depth + 1);
                    }
                }
            }
            StatementKind::With { subject, body } => {
                self.walk_expression(subject, visitor, depth + 1);
                self.walk_statement(body, visitor, depth + 1);
            }
            StatementKind::Block { statements } => {
                for statement in statements {
                    self.walk_statement(statement, visitor, depth + 1);
                }
            }
            StatementKind::Assignment { target, value, .. } => {
                self.walk_expression(target, visitor, depth + 1);
                self.walk_expression(value, visitor, depth + 1);
            }
            StatementKind::Call { expression } => {
                self.walk_expression(expression, visitor, depth + 1);
            }
            StatementKind::Exit { value } => {
                if let Some(value) = value {
                    self.walk_expression(value, visitor, depth + 1);
                }
            }
            StatementKind::Empty => {}
        }
    }

    fn walk_expression(
        &mut self,
        expression: &Expression,
        visitor: &mut dyn Visitor,
        depth: usize,
    ) {
        if !self.check_depth(depth, &expression.start_token) {
            return;
        }
        if visitor.visit_expression(expression) == VisitControl::Skip {
            return;
        }
        match &expression.kind {
            ExpressionKind::Identifier { .. } | ExpressionKind::Literal(_) => {}
            ExpressionKind::Binary { left, right, .. } => {
                self.walk_expression(left, visitor, depth + 1);
                self.walk_expression(right, visitor, depth + 1);
            }
            ExpressionKind::Unary { operand, .. } => {
                self.walk_expression(operand, visitor, depth + 1);
            }
            ExpressionKind::Member { base, .. } => {
                self.walk_expression(base, visitor, depth + 1);
            }
            ExpressionKind::Call { callee, arguments } => {
                self.walk_expression(callee, visitor, depth + 1);
                for argument in arguments {
                    self.walk_expression(argument, visitor, depth + 1);
                }
            }
            ExpressionKind::ArrayAccess { base, indexes } => {
                self.walk_expression(base, visitor, depth + 1);
                for index in indexes {
                    self.walk_expression(index, visitor, depth + 1);
                }
            }
            ExpressionKind::Set { elements } => {
                for element in elements {
                    self.walk_expression(element, visitor, depth + 1);
                }
            }
            ExpressionKind::Range { low, high } => {
                self.walk_expression(low, visitor, depth + 1);
                self.walk_expression(high, visitor, depth + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[derive(Default)]
    struct Counter {
        statements: usize,
        expressions: usize,
        procedures: usize,
        skip_procedures: bool,
    }

    impl Visitor for Counter {
        fn visit_procedure(&mut self, _: &ProcedureDeclaration) -> VisitControl {
            self.procedures += 1;
            if self.skip_procedures {
                VisitControl::Skip
            } else {
                VisitControl::Descend
            }
        }
        fn visit_statement(&mut self, _: &Statement) -> VisitControl {
            self.statements += 1;
            VisitControl::Descend
        }
        fn visit_expression(&mut self, _: &Expression) -> VisitControl {
            self.expressions += 1;
            VisitControl::Descend
        }
    }

    const SOURCE: &str = "OBJECT Codeunit 1 T { CODE { PROCEDURE P@1(); BEGIN IF x > 1 THEN y := 2; END; BEGIN END. } }";

    #[test]
    fn walker_visits_nested_nodes() {
        let parse = parse(SOURCE);
        let mut walker = Walker::new();
        let mut counter = Counter::default();
        walker.walk(&parse.document, &mut counter);
        assert_eq!(counter.procedures, 1);
        // IF and the nested assignment.
        assert!(counter.statements >= 2);
        // x, 1, x > 1, y, 2 at least.
        assert!(counter.expressions >= 5);
        assert!(walker.diagnostics().is_empty());
    }

    #[test]
    fn skip_suppresses_descent() {
        let parse = parse(SOURCE);
        let mut walker = Walker::new();
        let mut counter = Counter {
            skip_procedures: true,
            ..Counter::default()
        };
        walker.walk(&parse.document, &mut counter);
        assert_eq!(counter.procedures, 1);
        assert_eq!(counter.statements, 0);
    }

    #[test]
    fn depth_limit_reports_and_stops() {
        // 20 nested BEGIN blocks against a ceiling of 5.
        let mut body = String::new();
        for _ in 0..20 {
            body.push_str("BEGIN ");
        }
        body.push_str("x := 1; ");
        for _ in 0..20 {
            body.push_str("END; ");
        }
        let source = format!(
            "OBJECT Codeunit 1 T {{ CODE {{ PROCEDURE P@1(); {body} BEGIN END. }} }}",
        );
        let parse = parse(&source);
        let mut walker = Walker::with_max_depth(5);
        let mut counter = Counter::default();
        walker.walk(&parse.document, &mut counter);
        assert!(!walker.diagnostics().is_empty());
        assert!(walker.diagnostics()[0]
            .message
            .contains("maximum nesting depth exceeded"));
        // Nothing below the ceiling was visited.
        assert!(counter.statements <= 5);
    }
}
