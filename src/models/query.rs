//! Query-related data models.
//!
//! This module defines the result set returned by executing SQL.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

static NULL: JsonValue = JsonValue::Null;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// ClickHouse type (e.g., "UInt64", "Nullable(String)", "DateTime")
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }

    /// Build column metadata from a ClickHouse type name, deriving nullability
    /// from the `Nullable(...)` wrapper.
    pub fn from_clickhouse(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let nullable = type_name.starts_with("Nullable(")
            || type_name.starts_with("LowCardinality(Nullable(");
        Self {
            name: name.into(),
            type_name,
            nullable,
        }
    }

    /// Whether values of this column are numeric (right-aligned in tables).
    pub fn is_numeric(&self) -> bool {
        let inner = self
            .type_name
            .trim_start_matches("LowCardinality(")
            .trim_start_matches("Nullable(");
        ["UInt", "Int", "Float", "Decimal"]
            .iter()
            .any(|prefix| inner.starts_with(prefix))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create an empty result (for statements that return no data).
    pub fn empty(execution_time_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            execution_time_ms,
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

    /// Values of one column, in row order. Missing cells read as `Null`.
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a JsonValue> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&NULL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_result_empty() {
        let result = QueryResult::empty(10);
        assert!(result.is_empty());
        assert_eq!(result.row_count(), 0);
    }

    #[test]
    fn test_nullable_detection() {
        assert!(ColumnMetadata::from_clickhouse("a", "Nullable(String)").nullable);
        assert!(ColumnMetadata::from_clickhouse("a", "LowCardinality(Nullable(String))").nullable);
        assert!(!ColumnMetadata::from_clickhouse("a", "UInt64").nullable);
    }

    #[test]
    fn test_numeric_detection() {
        assert!(ColumnMetadata::from_clickhouse("n", "UInt64").is_numeric());
        assert!(ColumnMetadata::from_clickhouse("n", "Nullable(Float64)").is_numeric());
        assert!(ColumnMetadata::from_clickhouse("n", "Decimal(18, 2)").is_numeric());
        assert!(!ColumnMetadata::from_clickhouse("s", "String").is_numeric());
        assert!(!ColumnMetadata::from_clickhouse("d", "DateTime").is_numeric());
    }

    #[test]
    fn test_column_values_fills_missing_with_null() {
        let mut first = serde_json::Map::new();
        first.insert("clicks".to_string(), json!(3));
        let result = QueryResult {
            columns: vec![ColumnMetadata::new("clicks", "UInt64", false)],
            rows: vec![first, serde_json::Map::new()],
            execution_time_ms: 1,
        };
        let values: Vec<_> = result.column_values("clicks").cloned().collect();
        assert_eq!(values, vec![json!(3), JsonValue::Null]);
    }

    #[test]
    fn test_serialized_fields() {
        let value = serde_json::to_value(QueryResult::empty(4)).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["columns", "execution_time_ms", "rows"]);
    }
}
