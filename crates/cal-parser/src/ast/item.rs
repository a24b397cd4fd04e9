//! Declaration nodes: properties, fields, keys, variables, procedures,
//! triggers, controls, actions, and data types.

use std::fmt;

use cal_common::token::Token;
use serde::Serialize;

use super::stmt::Statement;

/// One `Name=Value;` row inside a property section, a field row, a
/// control row, or an action row.
///
/// `value` is the reassembled display string. `value_tokens` keeps the
/// original tokens of the value so structured properties (CalcFormula,
/// TableRelation) can be re-parsed later without re-lexing. For
/// trigger-valued properties the value is the sentinel `"BEGIN...END"`
/// and `trigger` holds the parsed body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub name: String,
    pub value: String,
    pub value_tokens: Vec<Token>,
    pub trigger: Option<TriggerDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

impl Property {
    /// Whether this property carries a parsed trigger body.
    pub fn is_trigger(&self) -> bool {
        self.trigger.is_some()
    }
}

/// One `{ no ; class ; name ; type [; properties] }` row of FIELDS.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDeclaration {
    pub number: i64,
    /// The reserved second slot; usually empty.
    pub field_class: String,
    pub name: String,
    /// Exact tokens of the name so a consumer can tell how to re-quote it.
    pub name_tokens: Vec<Token>,
    pub data_type: DataType,
    pub properties: Vec<Property>,
    pub start_token: Token,
    pub end_token: Token,
}

impl FieldDeclaration {
    /// The field's trigger bodies (OnValidate, OnLookup, ...).
    pub fn triggers(&self) -> impl Iterator<Item = &TriggerDeclaration> {
        self.properties.iter().filter_map(|p| p.trigger.as_ref())
    }
}

/// One `{ ; field,field ; properties }` row of KEYS.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyDeclaration {
    pub fields: Vec<String>,
    pub properties: Vec<Property>,
    pub start_token: Token,
    pub end_token: Token,
}

/// One `{ id ; name ; field,field }` row of FIELDGROUPS.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldGroupDeclaration {
    pub id: Option<i64>,
    pub name: String,
    pub fields: Vec<String>,
    pub start_token: Token,
    pub end_token: Token,
}

/// `Name : Type;` in a VAR block (global or local).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDeclaration {
    pub name: String,
    pub data_type: DataType,
    pub is_temporary: bool,
    pub start_token: Token,
    pub end_token: Token,
}

/// `[VAR] Name : Type` in a procedure header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterDeclaration {
    pub name: String,
    /// Missing when the header is malformed; the parameter still exists.
    pub data_type: Option<DataType>,
    pub by_reference: bool,
    pub is_temporary: bool,
    pub start_token: Token,
    pub end_token: Token,
}

/// `[Name]` or `[Name(args)]` preceding a procedure.
///
/// Arguments are kept as the raw balanced token run; C/AL attribute
/// arguments have no further grammar worth modeling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub arguments: Vec<Token>,
    pub start_token: Token,
    pub end_token: Token,
}

/// A `PROCEDURE` or `EVENT` declaration in the CODE section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureDeclaration {
    pub name: String,
    pub is_local: bool,
    pub is_internal: bool,
    /// `EVENT` declarations share the header grammar but may lack a body.
    pub is_event: bool,
    pub attributes: Vec<Attribute>,
    pub parameters: Vec<ParameterDeclaration>,
    pub return_type: Option<DataType>,
    pub variables: Vec<VariableDeclaration>,
    pub body: Vec<Statement>,
    pub start_token: Token,
    pub end_token: Token,
}

/// A named statement body: a `TRIGGER` declaration in CODE, a
/// trigger-valued property (`OnValidate=...`), or the final
/// `BEGIN ... END.` block of a CODE section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerDeclaration {
    pub name: String,
    pub variables: Vec<VariableDeclaration>,
    pub body: Vec<Statement>,
    pub start_token: Token,
    pub end_token: Token,
}

/// Control kinds in a page's CONTROLS section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlKind {
    Container,
    Group,
    Field,
    Part,
    Separator,
}

impl ControlKind {
    /// Parse a control kind case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match cal_common::token::normalize(name).as_str() {
            "container" => Some(Self::Container),
            "group" => Some(Self::Group),
            "field" => Some(Self::Field),
            "part" => Some(Self::Part),
            "separator" => Some(Self::Separator),
            _ => None,
        }
    }
}

/// One control with its children, assembled from `{ id ; indent ; kind
/// [; properties] }` rows by the indent-stack builder.
///
/// Unknown kinds default to [`ControlKind::Field`] with the raw text
/// preserved in `raw_control_type` so validators can still see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlDeclaration {
    pub id: i64,
    pub indent_level: i64,
    pub kind: ControlKind,
    pub raw_control_type: Option<String>,
    pub properties: Vec<Property>,
    pub children: Vec<ControlDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

/// Action kinds in a page's ACTIONS section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    ActionContainer,
    ActionGroup,
    Action,
    Separator,
}

impl ActionKind {
    /// Parse an action kind case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match cal_common::token::normalize(name).as_str() {
            "actioncontainer" => Some(Self::ActionContainer),
            "actiongroup" => Some(Self::ActionGroup),
            "action" => Some(Self::Action),
            "separator" => Some(Self::Separator),
            _ => None,
        }
    }

    /// Whether this kind may own children.
    pub fn allows_children(&self) -> bool {
        matches!(self, Self::ActionContainer | Self::ActionGroup)
    }
}

/// One action with its children; same row shape and builder as controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDeclaration {
    pub id: i64,
    pub indent_level: i64,
    pub kind: ActionKind,
    pub raw_action_type: Option<String>,
    pub properties: Vec<Property>,
    pub children: Vec<ActionDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

/// One row of an ELEMENTS or DATASET section, assembled by indent like
/// controls. Query columns, XMLport nodes, and report data items all
/// share this shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementDeclaration {
    pub id: Option<i64>,
    pub indent_level: i64,
    pub name: String,
    /// The raw kind slot (`Element`, `DataItem`, `Column`, ...).
    pub element_kind: String,
    pub properties: Vec<Property>,
    pub children: Vec<ElementDeclaration>,
    pub start_token: Token,
    pub end_token: Token,
}

/// A declared data type. No semantic checking happens here: names are
/// recorded as written and only the structured forms get fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DataType {
    /// `Integer`, `Boolean`, `Code20`, `RecordRef`, ...
    Simple { name: String },
    /// `Text` or `Text[50]`.
    Text { length: Option<i64> },
    /// `Code` or `Code[20]`.
    Code { length: Option<i64> },
    /// `Record 18`, `Record "Customer"`, `TEMPORARY Record 18`.
    Record {
        table_id: Option<i64>,
        table_name: Option<String>,
        temporary: bool,
    },
    /// `Option` with its option string captured verbatim (may be empty).
    OptionString { options: String },
    /// `ARRAY [N] OF T`.
    Array { length: i64, element: Box<DataType> },
    /// `DotNet "'assembly'.Namespace.Type"` -- reference kept verbatim.
    DotNet { type_name: String },
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple { name } => write!(f, "{name}"),
            Self::Text { length: Some(n) } => write!(f, "Text[{n}]"),
            Self::Text { length: None } => write!(f, "Text"),
            Self::Code { length: Some(n) } => write!(f, "Code[{n}]"),
            Self::Code { length: None } => write!(f, "Code"),
            Self::Record {
                table_id,
                table_name,
                temporary,
            } => {
                if *temporary {
                    write!(f, "TEMPORARY ")?;
                }
                write!(f, "Record")?;
                if let Some(id) = table_id {
                    write!(f, " {id}")?;
                } else if let Some(name) = table_name {
                    write!(f, " {name}")?;
                }
                Ok(())
            }
            Self::OptionString { options } if options.is_empty() => write!(f, "Option"),
            Self::OptionString { options } => write!(f, "Option {options}"),
            Self::Array { length, element } => write!(f, "ARRAY [{length}] OF {element}"),
            Self::DotNet { type_name } => write!(f, "DotNet {type_name}"),
        }
    }
}
