//! Explicit roster schema.
//!
//! A device roster row is an ordered list of named fields. The schema is read
//! from the export header (or taken from [`RosterSchema::default_user`]) and
//! shared by the row reader and writer, so both agree on arity, field kinds
//! and escaping:
//!
//! - a value is quoted when it contains the delimiter, a `"` or a line break;
//! - a `"` inside a quoted value is doubled.
//!
//! The merge step never rewrites roster lines; this module is for inspection,
//! normalising saved exports and building rows that must round-trip through
//! a device.

use std::fmt;

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};

use crate::{EmployeeKey, DEFAULT_SEPARATOR};

/// How a roster field's value is validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Employee key (CPF): non-empty digits.
    Key,
    /// Free text.
    Text,
    /// Optional unsigned integer (empty allowed).
    Integer,
    /// `0`, `1` or empty.
    Flag,
    /// Opaque encoded payload (biometric templates).
    Blob,
}

impl FieldKind {
    /// Kind for a known device column name; unknown columns are text.
    pub fn for_column(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "cpf" => FieldKind::Key,
            "administrador" => FieldKind::Flag,
            "matricula" | "rfid" | "codigo" => FieldKind::Integer,
            "digitais" => FieldKind::Blob,
            _ => FieldKind::Text,
        }
    }

    fn accepts(&self, value: &str) -> bool {
        match self {
            FieldKind::Key => !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()),
            FieldKind::Integer => value.bytes().all(|b| b.is_ascii_digit()),
            FieldKind::Flag => matches!(value, "" | "0" | "1"),
            FieldKind::Text | FieldKind::Blob => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterField {
    pub name: String,
    pub kind: FieldKind,
}

/// Ordered, typed roster columns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterSchema {
    fields: Vec<RosterField>,
}

const DEFAULT_USER_COLUMNS: &[&str] = &[
    "cpf",
    "nome",
    "administrador",
    "matricula",
    "rfid",
    "codigo",
    "senha",
    "barras",
    "digitais",
];

impl RosterSchema {
    /// Column set exported by the devices this workspace talks to.
    pub fn default_user() -> Self {
        Self::from_names(DEFAULT_USER_COLUMNS.iter().copied())
    }

    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            fields: names
                .into_iter()
                .map(|n| RosterField {
                    name: n.trim().to_string(),
                    kind: FieldKind::for_column(n),
                })
                .collect(),
        }
    }

    /// Schema described by an export header line.
    pub fn from_header(header: &str) -> Result<Self, RosterRowError> {
        let names = read_fields(header)?;
        if names.iter().all(|n| n.trim().is_empty()) {
            return Err(RosterRowError::EmptyHeader);
        }
        Ok(Self::from_names(names.iter().map(String::as_str)))
    }

    pub fn fields(&self) -> &[RosterField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    fn key_index(&self) -> Option<usize> {
        self.fields.iter().position(|f| f.kind == FieldKind::Key)
    }

    /// Header line for this schema.
    pub fn header_line(&self) -> Result<String, RosterRowError> {
        write_fields(self.fields.iter().map(|f| f.name.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RosterRowError {
    EmptyHeader,
    /// The delimited text could not be read or written.
    Malformed { reason: String },
    Arity { expected: usize, got: usize },
    InvalidField { field: String, value: String },
    UnknownField { field: String },
}

impl fmt::Display for RosterRowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterRowError::EmptyHeader => write!(f, "roster header is empty"),
            RosterRowError::Malformed { reason } => write!(f, "malformed roster line: {reason}"),
            RosterRowError::Arity { expected, got } => {
                write!(f, "expected {expected} fields, got {got}")
            }
            RosterRowError::InvalidField { field, value } => {
                write!(f, "field '{field}' rejects value '{value}'")
            }
            RosterRowError::UnknownField { field } => write!(f, "unknown field '{field}'"),
        }
    }
}

impl std::error::Error for RosterRowError {}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One roster row, values in schema order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterRow {
    values: Vec<String>,
    key_index: Option<usize>,
}

impl RosterRow {
    /// Parse and validate `line` against `schema`.
    pub fn parse(schema: &RosterSchema, line: &str) -> Result<Self, RosterRowError> {
        let values = read_fields(line)?;
        if values.len() != schema.len() {
            return Err(RosterRowError::Arity {
                expected: schema.len(),
                got: values.len(),
            });
        }
        validate(schema, &values)?;
        Ok(Self {
            values,
            key_index: schema.key_index(),
        })
    }

    pub fn builder(schema: &RosterSchema) -> RosterRowBuilder<'_> {
        RosterRowBuilder {
            schema,
            values: vec![String::new(); schema.len()],
        }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get<'a>(&'a self, schema: &RosterSchema, name: &str) -> Option<&'a str> {
        schema
            .index_of(name)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    pub fn key(&self) -> Option<EmployeeKey> {
        let raw = self.values.get(self.key_index?)?;
        raw.trim().parse::<u64>().ok().map(EmployeeKey)
    }

    /// Serialise with the escaping rule.
    pub fn to_line(&self) -> Result<String, RosterRowError> {
        write_fields(self.values.iter().map(String::as_str))
    }
}

/// Field-by-field [`RosterRow`] construction. Unset fields are empty.
pub struct RosterRowBuilder<'s> {
    schema: &'s RosterSchema,
    values: Vec<String>,
}

impl<'s> RosterRowBuilder<'s> {
    pub fn set(mut self, name: &str, value: impl Into<String>) -> Result<Self, RosterRowError> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| RosterRowError::UnknownField {
                field: name.to_string(),
            })?;
        self.values[idx] = value.into();
        Ok(self)
    }

    pub fn build(self) -> Result<RosterRow, RosterRowError> {
        validate(self.schema, &self.values)?;
        Ok(RosterRow {
            values: self.values,
            key_index: self.schema.key_index(),
        })
    }
}

fn validate(schema: &RosterSchema, values: &[String]) -> Result<(), RosterRowError> {
    for (field, value) in schema.fields.iter().zip(values) {
        if !field.kind.accepts(value.trim()) {
            return Err(RosterRowError::InvalidField {
                field: field.name.clone(),
                value: value.clone(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

const DELIMITER: u8 = DEFAULT_SEPARATOR as u8;

fn csv_error(e: impl fmt::Display) -> RosterRowError {
    RosterRowError::Malformed {
        reason: e.to_string(),
    }
}

/// Fields of one delimited line. A `"` only opens a quoted value at the
/// start of a field; elsewhere it is kept as text.
fn read_fields(line: &str) -> Result<Vec<String>, RosterRowError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    if !reader.read_record(&mut record).map_err(csv_error)? {
        // Blank line: one empty field.
        return Ok(vec![String::new()]);
    }
    if reader.read_record(&mut StringRecord::new()).map_err(csv_error)? {
        return Err(RosterRowError::Malformed {
            reason: "line holds more than one record".to_string(),
        });
    }
    Ok(record.iter().map(str::to_string).collect())
}

/// One delimited line, no terminator. Values are quoted only when they
/// contain the delimiter, a `"` or a line break.
fn write_fields<'a>(values: impl IntoIterator<Item = &'a str>) -> Result<String, RosterRowError> {
    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(values).map_err(csv_error)?;
    let bytes = writer.into_inner().map_err(|e| csv_error(e.error()))?;
    let mut line = String::from_utf8(bytes).map_err(csv_error)?;
    if line.ends_with('\n') {
        line.pop();
    }
    Ok(line)
}
