//! Output formatting for query results.
//!
//! Rows are rendered as XML-like elements, which models read reliably:
//!
//! ```text
//! <row>
//!   <country_code>US</country_code>
//!   <file>
//!     <project>pydantic</project>
//!   </file>
//! </row>
//! ```

use crate::models::Row;
use serde_json::Value as JsonValue;

/// Element name used for each row and for each item of a repeated field.
pub const ROW_TAG: &str = "row";

const INDENT: &str = "  ";
const NULL_TEXT: &str = "null";

/// Format rows as a sequence of `<row>` elements.
///
/// Row order and column order are kept exactly as given. An empty row set
/// formats to an empty string.
pub fn format_rows_as_xml(rows: &[Row]) -> String {
    let mut lines = Vec::new();
    for row in rows {
        lines.push(format!("<{ROW_TAG}>"));
        write_fields(row, 1, &mut lines);
        lines.push(format!("</{ROW_TAG}>"));
    }
    lines.join("\n")
}

fn write_fields(fields: &serde_json::Map<String, JsonValue>, depth: usize, lines: &mut Vec<String>) {
    for (name, value) in fields {
        write_element(name, value, depth, lines);
    }
}

fn write_element(tag: &str, value: &JsonValue, depth: usize, lines: &mut Vec<String>) {
    let pad = INDENT.repeat(depth);
    match value {
        JsonValue::Object(fields) if !fields.is_empty() => {
            lines.push(format!("{pad}<{tag}>"));
            write_fields(fields, depth + 1, lines);
            lines.push(format!("{pad}</{tag}>"));
        }
        JsonValue::Array(items) if !items.is_empty() => {
            lines.push(format!("{pad}<{tag}>"));
            for item in items {
                write_element(ROW_TAG, item, depth + 1, lines);
            }
            lines.push(format!("{pad}</{tag}>"));
        }
        JsonValue::Object(_) | JsonValue::Array(_) => lines.push(format!("{pad}<{tag}/>")),
        scalar => lines.push(format!("{pad}<{tag}>{}</{tag}>", scalar_text(scalar))),
    }
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => NULL_TEXT.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => escape_text(s),
        // Containers are handled by write_element
        JsonValue::Array(_) | JsonValue::Object(_) => escape_text(&value.to_string()),
    }
}

/// Escape the characters that would break element text.
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
