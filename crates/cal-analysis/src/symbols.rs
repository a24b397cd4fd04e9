//! Scope tree and symbol table.
//!
//! Scopes form an arena: every scope is an index into one vector, with
//! parent and child edges as indices, so the parent/child cycle of the
//! conceptual tree never becomes a reference cycle. The root scope spans
//! the whole document; each procedure and trigger owns a child scope
//! covering its byte range, holding its parameters and locals. Lookup is
//! case-insensitive and inner scopes shadow outer ones.

use cal_common::token::{normalize, Token};
use cal_parser::ast::{Document, ProcedureDeclaration, Property, TriggerDeclaration};
use rustc_hash::FxHashMap;

/// What a symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Field,
    Variable,
    Parameter,
    Procedure,
    Trigger,
    /// A procedure with a return type.
    Function,
}

/// One named entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// The name as written at the definition site.
    pub name: String,
    /// Lower-cased lookup key.
    pub normalized_name: String,
    pub kind: SymbolKind,
    /// The token to jump to for go-to-definition.
    pub definition_token: Token,
    /// The declared type, rendered as a string; `None` for procedures
    /// without a return type and for triggers.
    pub type_string: Option<String>,
}

impl Symbol {
    fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        definition_token: Token,
        type_string: Option<String>,
    ) -> Self {
        let name = name.into();
        Self {
            normalized_name: normalize(&name),
            name,
            kind,
            definition_token,
            type_string,
        }
    }
}

/// One scope: a byte range and a name->symbol map. Within a scope a
/// later declaration of the same normalized name replaces the earlier
/// one.
#[derive(Debug, Clone, PartialEq)]
struct Scope {
    parent: Option<usize>,
    children: Vec<usize>,
    symbols: FxHashMap<String, Symbol>,
    start: u32,
    end: u32,
}

impl Scope {
    fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }

    fn len(&self) -> u32 {
        self.end - self.start
    }
}

/// The symbol table: a scope arena with the root at index 0.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

const ROOT: usize = 0;

impl SymbolTable {
    /// Build the table from a parsed document in one AST walk.
    pub fn build(document: &Document) -> Self {
        let mut table = Self {
            scopes: vec![Scope {
                parent: None,
                children: Vec::new(),
                symbols: FxHashMap::default(),
                start: 0,
                end: u32::MAX,
            }],
        };

        let Some(object) = &document.object else {
            return table;
        };

        // Table fields.
        if let Some(fields) = &object.fields {
            for field in &fields.fields {
                let token = field
                    .name_tokens
                    .first()
                    .cloned()
                    .unwrap_or_else(|| field.start_token.clone());
                table.define(
                    ROOT,
                    Symbol::new(
                        field.name.clone(),
                        SymbolKind::Field,
                        token,
                        Some(field.data_type.to_string()),
                    ),
                );
                for property in &field.properties {
                    table.add_property_trigger_scope(property);
                }
            }
        }

        // Object-level property triggers (OnInsert, OnOpenPage, ...).
        for section in [&object.object_properties, &object.properties]
            .into_iter()
            .flatten()
        {
            for property in &section.properties {
                table.add_property_trigger_scope(property);
            }
        }

        // Control and action triggers.
        if let Some(controls) = &object.controls {
            let mut stack: Vec<_> = controls.controls.iter().collect();
            while let Some(control) = stack.pop() {
                for property in &control.properties {
                    table.add_property_trigger_scope(property);
                }
                stack.extend(control.children.iter());
            }
        }
        if let Some(actions) = &object.actions {
            let mut stack: Vec<_> = actions.actions.iter().collect();
            while let Some(action) = stack.pop() {
                for property in &action.properties {
                    table.add_property_trigger_scope(property);
                }
                stack.extend(action.children.iter());
            }
        }

        // The CODE section.
        if let Some(code) = &object.code {
            for variable in &code.variables {
                table.define(
                    ROOT,
                    Symbol::new(
                        variable.name.clone(),
                        SymbolKind::Variable,
                        variable.start_token.clone(),
                        Some(variable.data_type.to_string()),
                    ),
                );
            }
            for procedure in &code.procedures {
                table.add_procedure(procedure);
            }
            for trigger in &code.triggers {
                table.add_trigger(trigger);
            }
            if let Some(trigger) = &code.document_trigger {
                table.add_trigger(trigger);
            }
        }

        table
    }

    // ── Construction helpers ───────────────────────────────────────────

    fn define(&mut self, scope: usize, symbol: Symbol) {
        self.scopes[scope]
            .symbols
            .insert(symbol.normalized_name.clone(), symbol);
    }

    fn push_scope(&mut self, parent: usize, start: u32, end: u32) -> usize {
        let index = self.scopes.len();
        self.scopes.push(Scope {
            parent: Some(parent),
            children: Vec::new(),
            symbols: FxHashMap::default(),
            start,
            end,
        });
        self.scopes[parent].children.push(index);
        index
    }

    fn add_procedure(&mut self, procedure: &ProcedureDeclaration) {
        let kind = if procedure.return_type.is_some() {
            SymbolKind::Function
        } else {
            SymbolKind::Procedure
        };
        self.define(
            ROOT,
            Symbol::new(
                procedure.name.clone(),
                kind,
                procedure.start_token.clone(),
                procedure.return_type.as_ref().map(|t| t.to_string()),
            ),
        );

        let scope = self.push_scope(
            ROOT,
            procedure.start_token.span.start,
            procedure.end_token.span.end,
        );
        for parameter in &procedure.parameters {
            self.define(
                scope,
                Symbol::new(
                    parameter.name.clone(),
                    SymbolKind::Parameter,
                    parameter.start_token.clone(),
                    parameter.data_type.as_ref().map(|t| t.to_string()),
                ),
            );
        }
        for variable in &procedure.variables {
            self.define(
                scope,
                Symbol::new(
                    variable.name.clone(),
                    SymbolKind::Variable,
                    variable.start_token.clone(),
                    Some(variable.data_type.to_string()),
                ),
            );
        }
    }

    fn add_trigger(&mut self, trigger: &TriggerDeclaration) {
        self.define(
            ROOT,
            Symbol::new(
                trigger.name.clone(),
                SymbolKind::Trigger,
                trigger.start_token.clone(),
                None,
            ),
        );
        self.add_trigger_scope(trigger);
    }

    /// A scope for a trigger body without a root symbol; used for
    /// trigger-valued properties.
    fn add_trigger_scope(&mut self, trigger: &TriggerDeclaration) {
        if trigger.variables.is_empty() {
            return;
        }
        let scope = self.push_scope(
            ROOT,
            trigger.start_token.span.start,
            trigger.end_token.span.end,
        );
        for variable in &trigger.variables {
            self.define(
                scope,
                Symbol::new(
                    variable.name.clone(),
                    SymbolKind::Variable,
                    variable.start_token.clone(),
                    Some(variable.data_type.to_string()),
                ),
            );
        }
    }

    fn add_property_trigger_scope(&mut self, property: &Property) {
        if let Some(trigger) = &property.trigger {
            self.add_trigger_scope(trigger);
        }
    }

    // ── Lookup ─────────────────────────────────────────────────────────

    /// Whether the root scope defines the name (case-insensitive).
    pub fn has_symbol(&self, name: &str) -> bool {
        self.get_symbol(name).is_some()
    }

    /// Root-scope lookup (case-insensitive).
    pub fn get_symbol(&self, name: &str) -> Option<&Symbol> {
        self.scopes[ROOT].symbols.get(&normalize(name))
    }

    /// All symbols of the root scope, in no particular order.
    pub fn get_all_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.scopes[ROOT].symbols.values()
    }

    /// The symbol visible under `name` at a byte offset: the innermost
    /// enclosing scope is searched first, then its parents.
    pub fn get_symbol_at_offset(&self, name: &str, offset: u32) -> Option<&Symbol> {
        let key = normalize(name);
        let mut scope = Some(self.scope_at_offset(offset));
        while let Some(index) = scope {
            if let Some(symbol) = self.scopes[index].symbols.get(&key) {
                return Some(symbol);
            }
            scope = self.scopes[index].parent;
        }
        None
    }

    /// Index of the innermost scope containing the offset.
    fn scope_at_offset(&self, offset: u32) -> usize {
        let mut best = ROOT;
        for (index, scope) in self.scopes.iter().enumerate() {
            if scope.contains(offset) && scope.len() < self.scopes[best].len() {
                best = index;
            }
        }
        best
    }

    /// Every symbol visible at a byte offset, innermost first; shadowed
    /// outer symbols are omitted.
    pub fn symbols_in_scope_at(&self, offset: u32) -> Vec<&Symbol> {
        let mut seen: FxHashMap<&str, ()> = FxHashMap::default();
        let mut out = Vec::new();
        let mut scope = Some(self.scope_at_offset(offset));
        while let Some(index) = scope {
            for symbol in self.scopes[index].symbols.values() {
                if seen.insert(symbol.normalized_name.as_str(), ()).is_none() {
                    out.push(symbol);
                }
            }
            scope = self.scopes[index].parent;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cal_parser::parse;

    const SOURCE: &str = r#"OBJECT Table 50000 Customer
{
  FIELDS
  {
    { 1 ; ;No.      ;Code20 }
    { 2 ; ;Balance  ;Decimal }
  }
  CODE
  {
    VAR
      Total@1000 : Decimal;
      Shadow@1001 : Integer;

    PROCEDURE Compute@1(Factor@1 : Decimal) : Decimal;
    VAR
      Shadow@2 : Decimal;
    BEGIN
      EXIT(Total * Factor);
    END;

    BEGIN
    END.
  }
}
"#;

    fn table() -> SymbolTable {
        let result = parse(SOURCE);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
        SymbolTable::build(&result.document)
    }

    #[test]
    fn root_scope_holds_fields_globals_and_procedures() {
        let table = table();
        assert!(table.has_symbol("No."));
        assert!(table.has_symbol("no."));
        assert!(table.has_symbol("Balance"));
        assert!(table.has_symbol("Total"));
        assert!(table.has_symbol("Compute"));
        assert!(table.has_symbol("OnRun"));
        assert!(!table.has_symbol("Factor"), "parameters are not global");
        assert!(!table.has_symbol("Missing"));
    }

    #[test]
    fn kinds_and_types_recorded() {
        let table = table();
        let field = table.get_symbol("Balance").expect("field");
        assert_eq!(field.kind, SymbolKind::Field);
        assert_eq!(field.type_string.as_deref(), Some("Decimal"));

        let compute = table.get_symbol("Compute").expect("procedure");
        assert_eq!(compute.kind, SymbolKind::Function);
        assert_eq!(compute.type_string.as_deref(), Some("Decimal"));

        let run = table.get_symbol("OnRun").expect("trigger");
        assert_eq!(run.kind, SymbolKind::Trigger);
    }

    #[test]
    fn keywords_never_collide_with_symbols() {
        let table = table();
        assert!(!table.has_symbol("BEGIN"));
        assert!(!table.has_symbol("IF"));
    }

    #[test]
    fn parameter_visible_only_inside_procedure() {
        let source = SOURCE;
        let table = table();
        let inside = source.find("EXIT(Total * Factor)").expect("body") as u32;
        let outside = source.find("FIELDS").expect("fields") as u32;

        let factor = table.get_symbol_at_offset("Factor", inside).expect("param");
        assert_eq!(factor.kind, SymbolKind::Parameter);
        assert!(table.get_symbol_at_offset("Factor", outside).is_none());
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let source = SOURCE;
        let table = table();
        let inside = source.find("EXIT(Total * Factor)").expect("body") as u32;

        // Inside Compute, `Shadow` is the Decimal local.
        let inner = table.get_symbol_at_offset("Shadow", inside).expect("local");
        assert_eq!(inner.type_string.as_deref(), Some("Decimal"));

        // Outside, it is the Integer global.
        let outer = table.get_symbol_at_offset("Shadow", 0).expect("global");
        assert_eq!(outer.type_string.as_deref(), Some("Integer"));
    }

    #[test]
    fn later_same_name_declaration_wins() {
        let source = "OBJECT Codeunit 1 T { CODE { VAR X@1 : Integer; X@2 : Decimal; BEGIN END. } }";
        let result = parse(source);
        let table = SymbolTable::build(&result.document);
        let x = table.get_symbol("X").expect("x");
        assert_eq!(x.type_string.as_deref(), Some("Decimal"));
    }

    #[test]
    fn build_is_idempotent() {
        let result = parse(SOURCE);
        let a = SymbolTable::build(&result.document);
        let b = SymbolTable::build(&result.document);
        assert_eq!(a, b);
    }

    #[test]
    fn symbols_in_scope_prefer_inner() {
        let source = SOURCE;
        let table = table();
        let inside = source.find("EXIT(Total * Factor)").expect("body") as u32;
        let visible = table.symbols_in_scope_at(inside);
        let shadow = visible
            .iter()
            .find(|s| s.normalized_name == "shadow")
            .expect("shadow");
        assert_eq!(shadow.type_string.as_deref(), Some("Decimal"));
        assert!(visible.iter().any(|s| s.normalized_name == "factor"));
        assert!(visible.iter().any(|s| s.normalized_name == "total"));
    }

    #[test]
    fn empty_document_has_empty_table() {
        let result = parse("");
        let table = SymbolTable::build(&result.document);
        assert_eq!(table.get_all_symbols().count(), 0);
        assert!(table.get_symbol_at_offset("x", 0).is_none());
    }
}
