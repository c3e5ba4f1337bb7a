//! Target table schemas.
//!
//! A schema is an ordered list of columns, each with a BigQuery-style type
//! name and an optional mode. The same definition drives the stage table DDL
//! and the row validation performed before anything is written.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::StagedRecord;

/// Column type as it appears in the entity configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Date,
}

impl FieldType {
    /// Name used in configuration files and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Date => "DATE",
        }
    }

    /// Check whether a non-null JSON value can be loaded into a column of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
            (FieldType::Integer, Value::String(s)) => s.trim().parse::<i64>().is_ok(),
            (FieldType::Float, Value::Number(_)) => true,
            (FieldType::Float, Value::String(s)) => s.trim().parse::<f64>().is_ok(),
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Boolean, Value::String(s)) => {
                matches!(s.to_ascii_lowercase().as_str(), "true" | "false")
            }
            (FieldType::Timestamp, Value::String(s)) => parse_timestamp(s).is_some(),
            (FieldType::Date, Value::String(s)) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            }
            _ => false,
        }
    }
}

/// Column nullability, `NULLABLE` when omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
}

/// Column definition in a target schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,

    /// Column type
    #[serde(rename = "type")]
    pub column_type: FieldType,

    /// Column mode
    #[serde(default)]
    pub mode: FieldMode,
}

impl ColumnDefinition {
    /// Create a new nullable column definition.
    pub fn new(name: impl Into<String>, column_type: FieldType) -> Self {
        Self {
            name: name.into(),
            column_type,
            mode: FieldMode::Nullable,
        }
    }

    /// Create a new required column definition.
    pub fn required(name: impl Into<String>, column_type: FieldType) -> Self {
        Self {
            name: name.into(),
            column_type,
            mode: FieldMode::Required,
        }
    }

    pub fn is_required(&self) -> bool {
        self.mode == FieldMode::Required
    }
}

/// Parse an API timestamp.
///
/// Accepts RFC 3339 (with offset) and the offset-less
/// `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` forms, the latter read as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Check one staged row against a schema.
///
/// Returns a description of the first problem found: a non-object row, a
/// column the schema does not declare, a value of the wrong type, or a
/// missing required column.
pub fn validate_row(schema: &[ColumnDefinition], row: &StagedRecord) -> Result<(), String> {
    for (name, value) in row {
        let column = schema
            .iter()
            .find(|c| &c.name == name)
            .ok_or_else(|| format!("no such field: {name}"))?;
        if value.is_null() {
            continue;
        }
        if !column.column_type.accepts(value) {
            return Err(format!(
                "field '{name}' expects {} but got {value}",
                column.column_type.as_str()
            ));
        }
    }

    for column in schema.iter().filter(|c| c.is_required()) {
        match row.get(&column.name) {
            Some(v) if !v.is_null() => {}
            _ => return Err(format!("missing required field '{}'", column.name)),
        }
    }

    Ok(())
}
