//! Scenario: Explicit roster schema
//!
//! # Invariants under test
//!
//! 1. A header line becomes an ordered, typed schema.
//! 2. Device rows parse against the schema and expose their key.
//! 3. Rows written by the builder escape delimiter, quote and newline, and
//!    parse back to the same values.
//! 4. Arity and field-kind violations are reported, not coerced.
//! 5. A `"` inside an unquoted device value is text: it survives parsing and
//!    the written line reads back to the same row.

use afd_reconcile::{EmployeeKey, FieldKind, RosterRow, RosterRowError, RosterSchema};

const HEADER: &str = "cpf;nome;administrador;matricula;rfid;codigo;senha;barras;digitais";

const DEVICE_ROW: &str = "83384666215;NOME EXEMPLO 01;0;25656;0;123123;13;;SUNSUzIxAAAJjgMBAAAAAMUAxQAEAUABAAAAgzwd+/==";

#[test]
fn header_maps_to_default_user_schema() {
    let schema = RosterSchema::from_header(HEADER).unwrap();
    assert_eq!(schema, RosterSchema::default_user());
    assert_eq!(schema.len(), 9);
    assert_eq!(schema.fields()[0].kind, FieldKind::Key);
    assert_eq!(schema.fields()[2].kind, FieldKind::Flag);
    assert_eq!(schema.fields()[8].kind, FieldKind::Blob);
    assert_eq!(schema.header_line().unwrap(), HEADER);
}

#[test]
fn unknown_columns_are_text() {
    let schema = RosterSchema::from_header("cpf;apelido").unwrap();
    assert_eq!(schema.fields()[1].kind, FieldKind::Text);
}

#[test]
fn empty_header_is_rejected() {
    assert_eq!(RosterSchema::from_header(""), Err(RosterRowError::EmptyHeader));
    assert_eq!(RosterSchema::from_header(" ; "), Err(RosterRowError::EmptyHeader));
}

#[test]
fn device_row_parses_and_exposes_key() {
    let schema = RosterSchema::default_user();
    let row = RosterRow::parse(&schema, DEVICE_ROW).unwrap();
    assert_eq!(row.key(), Some(EmployeeKey(83384666215)));
    assert_eq!(row.get(&schema, "nome"), Some("NOME EXEMPLO 01"));
    assert_eq!(row.get(&schema, "barras"), Some(""));
    assert_eq!(row.to_line().unwrap(), DEVICE_ROW, "plain rows are written back verbatim");
}

#[test]
fn builder_escapes_and_round_trips() {
    let schema = RosterSchema::default_user();
    let row = RosterRow::builder(&schema)
        .set("cpf", "12345678901")
        .unwrap()
        .set("nome", "SILVA; \"ZECA\"\nJR")
        .unwrap()
        .set("administrador", "1")
        .unwrap()
        .build()
        .unwrap();

    let line = row.to_line().unwrap();
    assert_eq!(line, "12345678901;\"SILVA; \"\"ZECA\"\"\nJR\";1;;;;;;");

    let back = RosterRow::parse(&schema, &line).unwrap();
    assert_eq!(back, row);
    assert_eq!(back.get(&schema, "nome"), Some("SILVA; \"ZECA\"\nJR"));
}

#[test]
fn builder_rejects_unknown_fields_and_bad_values() {
    let schema = RosterSchema::default_user();
    assert!(matches!(
        RosterRow::builder(&schema).set("email", "x"),
        Err(RosterRowError::UnknownField { .. })
    ));
    let bad_flag = RosterRow::builder(&schema)
        .set("cpf", "1")
        .unwrap()
        .set("administrador", "yes")
        .unwrap()
        .build();
    assert_eq!(
        bad_flag,
        Err(RosterRowError::InvalidField {
            field: "administrador".to_string(),
            value: "yes".to_string()
        })
    );
}

#[test]
fn missing_key_is_invalid() {
    let schema = RosterSchema::default_user();
    let err = RosterRow::builder(&schema).build().unwrap_err();
    assert_eq!(
        err,
        RosterRowError::InvalidField {
            field: "cpf".to_string(),
            value: String::new()
        }
    );
}

#[test]
fn wrong_arity_is_reported() {
    let schema = RosterSchema::default_user();
    assert_eq!(
        RosterRow::parse(&schema, "1;ANA;0"),
        Err(RosterRowError::Arity {
            expected: 9,
            got: 3
        })
    );
}

#[test]
fn embedded_quotes_in_device_values_survive() {
    let schema = RosterSchema::default_user();

    let row = RosterRow::parse(&schema, "80627000000;JOAO \"ZE\" DA SILVA;0;;;;;;").unwrap();
    assert_eq!(row.get(&schema, "nome"), Some("JOAO \"ZE\" DA SILVA"));

    let line = row.to_line().unwrap();
    assert_eq!(line, "80627000000;\"JOAO \"\"ZE\"\" DA SILVA\";0;;;;;;");
    assert_eq!(RosterRow::parse(&schema, &line).unwrap(), row);

    let lone = RosterRow::parse(&schema, "80627000001;O\"BRIEN;0;;;;;;").unwrap();
    assert_eq!(lone.get(&schema, "nome"), Some("O\"BRIEN"));
    assert_eq!(
        RosterRow::parse(&schema, &lone.to_line().unwrap()).unwrap(),
        lone
    );
}
