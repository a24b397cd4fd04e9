//! End-to-end parser tests over complete object files, including the
//! canonical malformed-input scenarios and the parser totality
//! invariant.

use cal_common::diagnostic::Severity;
use cal_common::token::TokenKind;
use cal_parser::ast::{ObjectKind, StatementKind};
use cal_parser::{parse, property_value};
use proptest::prelude::*;

const CUSTOMER_TABLE: &str = r#"OBJECT Table 50000 My Customer
{
  OBJECT-PROPERTIES
  {
    Date=01-02-24;
    Time=12:00:00;
    Version List=ACME1.00;
  }
  PROPERTIES
  {
    CaptionML=ENU=My Customer;
    OnInsert=BEGIN
               "No." := '10000';
             END;
  }
  FIELDS
  {
    { 1   ;   ;No.                 ;Code20        ;CaptionML=ENU=No. }
    { 2   ;   ;Name                ;Text50         }
    { 3   ;   ;Balance             ;Decimal       ;FieldClass=FlowField;
                                                   CalcFormula=Sum("Cust. Ledger Entry".Amount WHERE (CustNo=FIELD(No.)));
                                                   Editable=No }
    { 4   ;   ;Currency Code       ;Code10        ;TableRelation=Currency.Code;
                                                   OnValidate=BEGIN
                                                                CheckCurrency;
                                                              END;
                                                    }
  }
  KEYS
  {
    {    ;No.                      ;Clustered=Yes }
    {    ;Name                      }
  }
  FIELDGROUPS
  {
    { 1   ;DropDown                ;No.,Name }
  }
  CODE
  {
    VAR
      Currency@1000 : Record 4;
      Total@1001 : Decimal;

    PROCEDURE CheckCurrency@1();
    BEGIN
      IF "Currency Code" = '' THEN
        EXIT;
      Currency.GET("Currency Code");
    END;

    LOCAL PROCEDURE Sum@2(Amount@1000 : Decimal) : Decimal;
    BEGIN
      Total := Total + Amount;
      EXIT(Total);
    END;

    BEGIN
    END.
  }
}
"#;

#[test]
fn full_table_object_parses_clean() {
    let result = parse(CUSTOMER_TABLE);
    assert!(
        result.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        result.diagnostics
    );

    let object = result.document.object.expect("object");
    assert_eq!(object.kind, ObjectKind::Table);
    assert_eq!(object.id, 50000);
    assert_eq!(object.name, "My Customer");

    let object_properties = object.object_properties.expect("object-properties");
    assert_eq!(object_properties.properties.len(), 3);
    assert_eq!(object_properties.properties[2].name, "Version List");

    let properties = object.properties.expect("properties");
    assert!(properties.properties[1].is_trigger());

    let fields = object.fields.expect("fields");
    assert_eq!(fields.fields.len(), 4);
    assert_eq!(fields.fields[0].name, "No.");
    assert_eq!(fields.fields[3].name, "Currency Code");
    assert_eq!(fields.fields[3].triggers().count(), 1);

    let keys = object.keys.expect("keys");
    assert_eq!(keys.keys.len(), 2);

    let code = object.code.expect("code");
    assert_eq!(code.variables.len(), 2);
    assert_eq!(code.procedures.len(), 2);
    assert!(code.document_trigger.is_some());
}

#[test]
fn calc_formula_tokens_reparse() {
    let result = parse(CUSTOMER_TABLE);
    let object = result.document.object.expect("object");
    let fields = object.fields.expect("fields");
    let calc = fields.fields[2]
        .properties
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case("CalcFormula"))
        .expect("CalcFormula property");

    let (node, diags) = property_value::parse_calc_formula(&calc.value_tokens);
    assert!(diags.is_empty(), "{diags:?}");
    let node = node.expect("calc formula node");
    assert_eq!(node.aggregation_function, "Sum");
    assert_eq!(node.source_table, "Cust. Ledger Entry");
    assert_eq!(node.source_field.as_deref(), Some("Amount"));
}

#[test]
fn table_relation_tokens_reparse() {
    let result = parse(CUSTOMER_TABLE);
    let object = result.document.object.expect("object");
    let fields = object.fields.expect("fields");
    let relation = fields.fields[3]
        .properties
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case("TableRelation"))
        .expect("TableRelation property");

    let (node, diags) = property_value::parse_table_relation(&relation.value_tokens);
    assert!(diags.is_empty(), "{diags:?}");
    let relation = node.expect("node").relation.expect("simple relation");
    assert_eq!(relation.table_name, "Currency");
    assert_eq!(relation.field_name.as_deref(), Some("Code"));
}

// ── Scenario A: empty THEN body is an error ────────────────────────────

#[test]
fn empty_then_body_reports_and_keeps_the_if() {
    let source = "OBJECT Codeunit 1 Test { CODE {\n  PROCEDURE P@1(); BEGIN IF TRUE THEN END; END;\n  BEGIN END.\n} }";
    let result = parse(source);
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("THEN")),
        "expected a THEN diagnostic: {:?}",
        result.diagnostics
    );

    let object = result.document.object.expect("object");
    let code = object.code.expect("code");
    let procedure = &code.procedures[0];
    assert_eq!(procedure.name, "P");
    assert!(matches!(
        procedure.body[0].kind,
        StatementKind::If { .. }
    ));
}

// ── Scenario B: `THEN;` is a valid empty statement ─────────────────────

#[test]
fn semicolon_then_body_is_valid() {
    let source = "OBJECT Codeunit 1 Test { CODE {\n  PROCEDURE P@1(); BEGIN IF TRUE THEN; END;\n  BEGIN END.\n} }";
    let result = parse(source);
    assert!(
        result.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        result.diagnostics
    );

    let object = result.document.object.expect("object");
    let code = object.code.expect("code");
    match &code.procedures[0].body[0].kind {
        StatementKind::If { then_branch, .. } => {
            assert_eq!(then_branch.kind, StatementKind::Empty);
        }
        other => panic!("expected If, got {other:?}"),
    }
}

// ── Scenario F: attribute discard warning carries the count ────────────

#[test]
fn malformed_procedure_discards_attribute_count() {
    let source =
        "OBJECT Codeunit 1 Test { CODE {\n[External] [TryFunction] PROCEDURE BEGIN;\n} }";
    let result = parse(source);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message.contains("malformed procedure")));
    let discard = result
        .diagnostics
        .iter()
        .find(|d| d.message == "2 attributes discarded")
        .expect("discard warning");
    assert_eq!(discard.severity, Severity::Warning);
}

// ── Recovery behavior ──────────────────────────────────────────────────

#[test]
fn missing_object_close_brace_still_yields_object() {
    let source = "OBJECT Codeunit 9 Half { CODE { BEGIN END. }";
    let result = parse(source);
    assert!(result.document.object.is_some());
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message.contains("missing `}`")));
}

#[test]
fn unknown_section_is_skipped_with_warning() {
    let source = "OBJECT Table 1 T { RDLDATA { <xml>stuff</xml> } FIELDS { { 1 ; ;A ;Integer } } }";
    let result = parse(source);
    let object = result.document.object.expect("object");
    assert_eq!(object.fields.expect("fields").fields.len(), 1);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.severity == Severity::Warning && d.message.contains("RDLDATA")));
}

#[test]
fn empty_file_yields_empty_document() {
    let result = parse("");
    assert!(result.document.object.is_none());
    assert!(result.diagnostics.is_empty());
}

#[test]
fn garbage_never_panics_and_keeps_positions_in_range() {
    let sources = [
        "OBJECT",
        "OBJECT Table",
        "OBJECT Table 18",
        "OBJECT Table 18 Customer {",
        "{}{}{}",
        "OBJECT Table 18 Customer { FIELDS { { ; ; ; } } }",
        "PROPERTIES { x=y }",
        "OBJECT Codeunit 1 T { CODE { PROCEDURE",
    ];
    for source in sources {
        let result = parse(source);
        for diagnostic in &result.diagnostics {
            assert!(
                diagnostic.token.span.end as usize <= source.len(),
                "diagnostic out of range for {source:?}: {diagnostic:?}"
            );
        }
    }
}

#[test]
fn diagnostics_are_ordered_by_source_position() {
    let source = "OBJECT Codeunit 1 T { CODE {\nPROCEDURE A@1(); BEGIN IF x THEN END; END;\nPROCEDURE B@2(); BEGIN WHILE y DO END; END;\nBEGIN END.\n} }";
    let result = parse(source);
    let errors: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.is_error())
        .collect();
    assert!(errors.len() >= 2);
    for pair in errors.windows(2) {
        assert!(pair[0].token.span.start <= pair[1].token.span.start);
    }
}

proptest! {
    /// Parser totality: any input yields a document, never a panic, and
    /// every diagnostic stays within the source.
    #[test]
    fn parse_is_total(source in ".{0,200}") {
        let result = parse(&source);
        for diagnostic in &result.diagnostics {
            prop_assert!(diagnostic.token.span.end as usize <= source.len());
        }
    }

    /// Structured object-shaped inputs with arbitrary section noise
    /// still produce an object without panicking.
    #[test]
    fn object_shell_is_robust(noise in "[a-zA-Z0-9 ;={}().,\n]{0,120}") {
        let source = format!("OBJECT Table 1 T {{ PROPERTIES {{ {noise} }} }}");
        let _ = parse(&source);
    }
}
