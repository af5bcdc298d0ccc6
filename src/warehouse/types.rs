//! BigQuery wire types and row decoding.
//!
//! BigQuery returns rows in a compact positional form: each row is
//! `{"f": [{"v": ...}, ...]}` with every scalar encoded as a string, records
//! nested as another `{"f": [...]}` and repeated fields as `[{"v": ...}]`.
//! Decoding walks the result schema alongside each row to rebuild ordered
//! column maps with typed values.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies BigQuery type names into logical categories
//! 2. `decode_value` turns the wire value into JSON based on that category

use crate::models::{ColumnMetadata, Row};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Number, Value as JsonValue};

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableFieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub mode: Option<String>,
    /// Sub-fields of a RECORD/STRUCT column
    #[serde(default)]
    pub fields: Vec<TableFieldSchema>,
}

impl TableFieldSchema {
    pub fn is_repeated(&self) -> bool {
        self.mode
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("REPEATED"))
    }
}

impl From<&TableFieldSchema> for ColumnMetadata {
    fn from(field: &TableFieldSchema) -> Self {
        ColumnMetadata::new(
            field.name.clone(),
            field.field_type.clone(),
            field.mode.clone().unwrap_or_else(|| "NULLABLE".to_string()),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableRow {
    #[serde(default)]
    pub f: Vec<TableCell>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableCell {
    #[serde(default)]
    pub v: JsonValue,
}

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for BigQuery column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Record,
    /// STRING, BYTES (base64), NUMERIC, DATE, DATETIME, TIME, GEOGRAPHY, JSON...
    Text,
}

/// Classify a BigQuery type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT64" => TypeCategory::Integer,
        "FLOAT" | "FLOAT64" => TypeCategory::Float,
        "BOOLEAN" | "BOOL" => TypeCategory::Boolean,
        "TIMESTAMP" => TypeCategory::Timestamp,
        "RECORD" | "STRUCT" => TypeCategory::Record,
        // NUMERIC/BIGNUMERIC stay textual to keep exact precision
        _ => TypeCategory::Text,
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode all rows of a result page.
pub fn decode_rows(schema: &TableSchema, rows: &[TableRow]) -> Vec<Row> {
    rows.iter().map(|row| decode_row(&schema.fields, row)).collect()
}

/// Decode one positional row into a column map in schema order.
pub fn decode_row(fields: &[TableFieldSchema], row: &TableRow) -> Row {
    let mut out = Row::new();
    for (i, field) in fields.iter().enumerate() {
        let value = row.f.get(i).map(|cell| &cell.v).unwrap_or(&JsonValue::Null);
        out.insert(field.name.clone(), decode_field(field, value));
    }
    out
}

fn decode_field(field: &TableFieldSchema, value: &JsonValue) -> JsonValue {
    if field.is_repeated() {
        match value {
            JsonValue::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| decode_value(field, item.get("v").unwrap_or(&JsonValue::Null)))
                    .collect(),
            ),
            JsonValue::Null => JsonValue::Array(Vec::new()),
            other => other.clone(),
        }
    } else {
        decode_value(field, value)
    }
}

/// Decode a single (non-repeated) wire value according to the field's type.
pub fn decode_value(field: &TableFieldSchema, value: &JsonValue) -> JsonValue {
    if value.is_null() {
        return JsonValue::Null;
    }

    match categorize_type(&field.field_type) {
        TypeCategory::Record => match serde_json::from_value::<TableRow>(value.clone()) {
            Ok(nested) => JsonValue::Object(decode_row(&field.fields, &nested)),
            Err(_) => value.clone(),
        },
        TypeCategory::Integer => with_text(value, |s| s.parse::<i64>().ok().map(JsonValue::from)),
        TypeCategory::Float => with_text(value, |s| {
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(JsonValue::Number)
        }),
        TypeCategory::Boolean => with_text(value, |s| match s.to_ascii_lowercase().as_str() {
            "true" => Some(JsonValue::Bool(true)),
            "false" => Some(JsonValue::Bool(false)),
            _ => None,
        }),
        TypeCategory::Timestamp => {
            with_text(value, |s| parse_timestamp(s).map(|ts| JsonValue::String(format_timestamp(&ts))))
        }
        TypeCategory::Text => value.clone(),
    }
}

/// Apply `convert` to a string wire value, keeping the original on failure.
fn with_text(value: &JsonValue, convert: impl FnOnce(&str) -> Option<JsonValue>) -> JsonValue {
    match value {
        JsonValue::String(s) => convert(s).unwrap_or_else(|| value.clone()),
        other => other.clone(),
    }
}

/// Parse a TIMESTAMP wire value.
///
/// With `useInt64Timestamp` the value is integer microseconds since the
/// epoch; otherwise it is floating-point seconds such as `"1.7146944E9"`.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(micros) = s.parse::<i64>() {
        return DateTime::from_timestamp_micros(micros);
    }
    let secs = s.parse::<f64>().ok()?;
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: JsonValue) -> TableSchema {
        serde_json::from_value(value).unwrap()
    }

    fn rows(value: JsonValue) -> Vec<TableRow> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_categorize_type() {
        assert_eq!(categorize_type("INTEGER"), TypeCategory::Integer);
        assert_eq!(categorize_type("int64"), TypeCategory::Integer);
        assert_eq!(categorize_type("FLOAT64"), TypeCategory::Float);
        assert_eq!(categorize_type("BOOL"), TypeCategory::Boolean);
        assert_eq!(categorize_type("TIMESTAMP"), TypeCategory::Timestamp);
        assert_eq!(categorize_type("RECORD"), TypeCategory::Record);
        assert_eq!(categorize_type("NUMERIC"), TypeCategory::Text);
        assert_eq!(categorize_type("DATE"), TypeCategory::Text);
    }

    #[test]
    fn test_parse_timestamp_micros_and_seconds() {
        let from_micros = parse_timestamp("1714694400000000").unwrap();
        let from_secs = parse_timestamp("1.7146944E9").unwrap();
        assert_eq!(from_micros, from_secs);
        assert_eq!(format_timestamp(&from_micros), "2024-05-03T00:00:00Z");
        assert!(parse_timestamp("not a time").is_none());
    }

    #[test]
    fn test_decode_scalars() {
        let schema = schema(json!({"fields": [
            {"name": "num_downloads", "type": "INTEGER", "mode": "NULLABLE"},
            {"name": "share", "type": "FLOAT"},
            {"name": "ci", "type": "BOOLEAN"},
            {"name": "month", "type": "DATE"},
            {"name": "cpu", "type": "STRING"}
        ]}));
        let rows = rows(json!([
            {"f": [{"v": "42"}, {"v": "0.5"}, {"v": "true"}, {"v": "2024-05-01"}, {"v": null}]}
        ]));

        let decoded = decode_rows(&schema, &rows);
        assert_eq!(decoded.len(), 1);
        assert_eq!(
            JsonValue::Object(decoded[0].clone()),
            json!({"num_downloads": 42, "share": 0.5, "ci": true, "month": "2024-05-01", "cpu": null})
        );
        let keys: Vec<&str> = decoded[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["num_downloads", "share", "ci", "month", "cpu"]);
    }

    #[test]
    fn test_decode_nested_record() {
        let schema = schema(json!({"fields": [
            {"name": "file", "type": "RECORD", "fields": [
                {"name": "project", "type": "STRING"},
                {"name": "version", "type": "STRING"}
            ]},
            {"name": "details", "type": "RECORD", "fields": [
                {"name": "distro", "type": "RECORD", "fields": [
                    {"name": "libc", "type": "RECORD", "fields": [
                        {"name": "lib", "type": "STRING"}
                    ]}
                ]},
                {"name": "ci", "type": "BOOLEAN"}
            ]}
        ]}));
        let rows = rows(json!([{"f": [
            {"v": {"f": [{"v": "pydantic"}, {"v": "2.7.1"}]}},
            {"v": {"f": [
                {"v": {"f": [{"v": {"f": [{"v": "glibc"}]}}]}},
                {"v": null}
            ]}}
        ]}]));

        let decoded = decode_rows(&schema, &rows);
        assert_eq!(
            JsonValue::Object(decoded[0].clone()),
            json!({
                "file": {"project": "pydantic", "version": "2.7.1"},
                "details": {"distro": {"libc": {"lib": "glibc"}}, "ci": null}
            })
        );
    }

    #[test]
    fn test_decode_repeated_field() {
        let schema = schema(json!({"fields": [
            {"name": "versions", "type": "STRING", "mode": "REPEATED"},
            {"name": "counts", "type": "INTEGER", "mode": "REPEATED"}
        ]}));
        let rows = rows(json!([{"f": [
            {"v": [{"v": "1.0"}, {"v": "2.0"}]},
            {"v": [{"v": "3"}, {"v": "4"}]}
        ]}]));

        let decoded = decode_rows(&schema, &rows);
        assert_eq!(
            JsonValue::Object(decoded[0].clone()),
            json!({"versions": ["1.0", "2.0"], "counts": [3, 4]})
        );
    }

    #[test]
    fn test_decode_timestamp_column() {
        let schema = schema(json!({"fields": [{"name": "timestamp", "type": "TIMESTAMP"}]}));
        let rows = rows(json!([{"f": [{"v": "1714694400123456"}]}]));
        let decoded = decode_rows(&schema, &rows);
        assert_eq!(decoded[0]["timestamp"], json!("2024-05-03T00:00:00.123456Z"));
    }

    #[test]
    fn test_missing_cells_decode_as_null() {
        let schema = schema(json!({"fields": [
            {"name": "a", "type": "STRING"},
            {"name": "b", "type": "STRING"}
        ]}));
        let rows = rows(json!([{"f": [{"v": "x"}]}]));
        let decoded = decode_rows(&schema, &rows);
        assert_eq!(decoded[0]["b"], JsonValue::Null);
    }

    #[test]
    fn test_column_metadata_from_schema() {
        let schema = schema(json!({"fields": [{"name": "project", "type": "STRING"}]}));
        let meta = ColumnMetadata::from(&schema.fields[0]);
        assert_eq!(meta.name, "project");
        assert_eq!(meta.mode, "NULLABLE");
    }
}
