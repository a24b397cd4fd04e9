//! Typed AST for C/AL documents.
//!
//! The AST is a closed tagged-variant hierarchy: every construct is an
//! owned struct or enum, and every node carries a copy of its first and
//! last token so consumers can map any node back to an exact byte range
//! without holding on to the token stream.
//!
//! Layout follows the grammar: this module holds the document root, the
//! object declaration, and the section containers; declarations live in
//! [`item`], statements in [`stmt`], expressions in [`expr`], and the
//! structured property sub-trees (CalcFormula / TableRelation) in
//! [`formula`].

pub mod expr;
pub mod formula;
pub mod item;
pub mod stmt;

pub use expr::{BinaryOp, Expression, ExpressionKind, Literal, UnaryOp};
pub use formula::{
    CalcFormulaNode, ConditionalRelation, FilterCondition, PredicateKind, SimpleRelation,
    TableRelationNode,
};
pub use item::{
    ActionDeclaration, ActionKind, Attribute, ControlDeclaration, ControlKind, DataType,
    ElementDeclaration, FieldDeclaration, FieldGroupDeclaration, KeyDeclaration,
    ParameterDeclaration, ProcedureDeclaration, Property, TriggerDeclaration,
    VariableDeclaration,
};
pub use stmt::{AssignOp, CaseBranch, Statement, StatementKind};

use cal_common::token::Token;
use serde::Serialize;

/// The root of a parse: one source file, holding at most one object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub object: Option<ObjectDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

/// The seven C/AL object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectKind {
    Table,
    Page,
    Report,
    Codeunit,
    Query,
    XmlPort,
    MenuSuite,
}

impl ObjectKind {
    /// Parse an object kind name case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match cal_common::token::normalize(name).as_str() {
            "table" => Some(Self::Table),
            "page" => Some(Self::Page),
            "report" => Some(Self::Report),
            "codeunit" => Some(Self::Codeunit),
            "query" => Some(Self::Query),
            "xmlport" => Some(Self::XmlPort),
            "menusuite" => Some(Self::MenuSuite),
            _ => None,
        }
    }

    /// Canonical display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "Table",
            Self::Page => "Page",
            Self::Report => "Report",
            Self::Codeunit => "Codeunit",
            Self::Query => "Query",
            Self::XmlPort => "XMLport",
            Self::MenuSuite => "MenuSuite",
        }
    }
}

/// `OBJECT <kind> <id> <name> { sections }`.
///
/// Every section is optional; malformed files may carry none at all. A
/// section that appears twice keeps the last occurrence (the parser
/// reports the duplicate).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectDeclaration {
    pub kind: ObjectKind,
    pub id: i64,
    pub name: String,
    pub object_properties: Option<PropertySection>,
    pub properties: Option<PropertySection>,
    pub fields: Option<FieldSection>,
    pub keys: Option<KeySection>,
    pub field_groups: Option<FieldGroupSection>,
    pub code: Option<CodeSection>,
    pub controls: Option<ControlSection>,
    pub actions: Option<ActionSection>,
    pub elements: Option<ElementSection>,
    pub dataset: Option<ElementSection>,
    pub start_token: Token,
    pub end_token: Token,
}

/// `PROPERTIES { ... }` or `OBJECT-PROPERTIES { ... }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySection {
    pub properties: Vec<Property>,
    pub start_token: Token,
    pub end_token: Token,
}

/// `FIELDS { rows }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSection {
    pub fields: Vec<FieldDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

/// `KEYS { rows }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySection {
    pub keys: Vec<KeyDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

/// `FIELDGROUPS { rows }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldGroupSection {
    pub groups: Vec<FieldGroupDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

/// `CODE { VAR ... procedures ... BEGIN ... END. }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeSection {
    /// Global variables from the leading `VAR` block.
    pub variables: Vec<VariableDeclaration>,
    pub procedures: Vec<ProcedureDeclaration>,
    /// `TRIGGER`-headed declarations, rare but accepted.
    pub triggers: Vec<TriggerDeclaration>,
    /// The final `BEGIN ... END.` block (the object's run trigger).
    pub document_trigger: Option<TriggerDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

/// `CONTROLS { rows }` -- rows already assembled into a tree by indent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlSection {
    pub controls: Vec<ControlDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

/// `ACTIONS { rows }` -- rows already assembled into a tree by indent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSection {
    pub actions: Vec<ActionDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

/// `ELEMENTS { rows }` or `DATASET { rows }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementSection {
    pub elements: Vec<ElementDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}
