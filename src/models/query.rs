//! Query-related data models.
//!
//! This module defines the row set returned by the warehouse.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A result row keyed by column name, in warehouse column order.
///
/// Nested record columns are nested maps; repeated columns are arrays.
pub type Row = serde_json::Map<String, JsonValue>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// BigQuery type name (e.g., "STRING", "TIMESTAMP", "RECORD")
    pub type_name: String,
    /// BigQuery field mode ("NULLABLE", "REQUIRED" or "REPEATED")
    pub mode: String,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        mode: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            mode: mode.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<Row>,
    /// Bytes scanned by the query, as reported by the warehouse
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes_processed: Option<u64>,
    /// Whether the warehouse answered from its result cache
    pub cache_hit: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a result from rows alone.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
