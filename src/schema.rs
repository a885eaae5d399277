//! Schema describer.
//!
//! Produces the schema text embedded in the prompt. Two explicit strategies:
//!
//! - [`SchemaMode::Static`]: the hand-written EVENTS_DB description, returned
//!   verbatim without touching the database.
//! - [`SchemaMode::Live`]: table/column/type triples from
//!   `INFORMATION_SCHEMA.COLUMNS`, annotated with primary keys from
//!   `system.columns`, grouped by table.
//!
//! The result is opaque prompt text; nothing downstream parses it.

use crate::config::SchemaMode;
use crate::db::QueryBackend;
use crate::error::AppResult;
use crate::models::{ColumnDefinition, QueryResult, SchemaDescription, SchemaSource, TableSchema};
use tracing::{debug, info, warn};

pub const DEFAULT_SCHEMA_CATALOG: &str = "default";
/// Internal bookkeeping table excluded from live descriptions by default.
pub const DEFAULT_EXCLUDED_TABLE: &str = "statistics";

/// Hand-written description of the EVENTS_DB tables.
pub const STATIC_SCHEMA: &str = "
# CUSTOMERS(CUSTOMER_ID: int, CUSTOMER_NAME: str)
# CUSTOMERS_PLATFORMS(CUSTOMER_ID: int, PLATFORM_ID: int, CPC: float)
# EVENTS(EVENT_ID: int, EVENT_TYPE: str)
# EVENT_STATISTICS(date: datetime, customer_id: int, platform_id: int, event_id: int)
# Primary keys:
# CUSTOMERS: CUSTOMER_ID
# EVENTS: EVENT_ID
# Foreign keys:
# CUSTOMERS_PLATFORMS: CUSTOMER_ID to CUSTOMERS.CUSTOMER_ID, PLATFORM_ID to PLATFORMS.PLATFORM_ID
# EVENT_STATISTICS: customer_id to CUSTOMERS.CUSTOMER_ID, platform_id to PLATFORMS.PLATFORM_ID, event_id to EVENTS.EVENT_ID
";

pub struct SchemaDescriber {
    mode: SchemaMode,
    catalog: String,
    excluded_tables: Vec<String>,
}

impl SchemaDescriber {
    pub fn new(mode: SchemaMode) -> Self {
        Self {
            mode,
            catalog: DEFAULT_SCHEMA_CATALOG.to_string(),
            excluded_tables: vec![DEFAULT_EXCLUDED_TABLE.to_string()],
        }
    }

    /// Database whose tables are described in live mode.
    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = catalog.into();
        self
    }

    /// Tables left out of live descriptions.
    pub fn with_excluded_tables(mut self, tables: Vec<String>) -> Self {
        self.excluded_tables = tables;
        self
    }

    pub fn mode(&self) -> SchemaMode {
        self.mode
    }

    /// Describe the schema using the configured strategy.
    pub async fn describe<B: QueryBackend>(&self, backend: &B) -> AppResult<SchemaDescription> {
        info!(mode = %self.mode, "Describing database schema");
        match self.mode {
            SchemaMode::Static => Ok(SchemaDescription::new(
                SchemaSource::Static,
                STATIC_SCHEMA,
                0,
            )),
            SchemaMode::Live => self.describe_live(backend).await,
        }
    }

    async fn describe_live<B: QueryBackend>(&self, backend: &B) -> AppResult<SchemaDescription> {
        let columns = backend.query(&self.columns_query()).await?;
        let mut tables = group_columns(&columns);

        if tables.is_empty() {
            warn!(
                catalog = %self.catalog,
                backend = backend.name(),
                "No table metadata found; schema description is empty"
            );
            return Ok(SchemaDescription::new(SchemaSource::Live, "", 0));
        }

        // Primary keys are decoration; a failure here still leaves a usable description.
        match backend.query(&self.primary_keys_query()).await {
            Ok(keys) => attach_primary_keys(&mut tables, &keys),
            Err(e) => warn!(error = %e, "Cannot read primary keys; describing columns only"),
        }

        debug!(tables = tables.len(), "Rendered live schema");
        Ok(SchemaDescription::new(
            SchemaSource::Live,
            render_tables(&tables),
            tables.len(),
        ))
    }

    fn columns_query(&self) -> String {
        let mut sql = format!(
            "SELECT DISTINCT table_name, column_name, data_type, ordinal_position \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE table_catalog = {}",
            quote_literal(&self.catalog)
        );
        if !self.excluded_tables.is_empty() {
            let excluded: Vec<String> = self
                .excluded_tables
                .iter()
                .map(|t| quote_literal(t))
                .collect();
            sql.push_str(&format!(" AND table_name NOT IN ({})", excluded.join(", ")));
        }
        sql.push_str(" ORDER BY table_name, ordinal_position");
        sql
    }

    fn primary_keys_query(&self) -> String {
        format!(
            "SELECT table AS table_name, name AS column_name \
             FROM system.columns \
             WHERE database = {} AND is_in_primary_key = 1 \
             ORDER BY table, position",
            quote_literal(&self.catalog)
        )
    }
}

/// Single-quoted SQL string literal.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn cell<'a>(row: &'a serde_json::Map<String, serde_json::Value>, key: &str) -> Option<&'a str> {
    row.get(key).and_then(|v| v.as_str())
}

/// Group table/column/type rows by table, keeping first-seen order.
pub fn group_columns(result: &QueryResult) -> Vec<TableSchema> {
    let mut tables: Vec<TableSchema> = Vec::new();
    for row in &result.rows {
        let (Some(table), Some(column), Some(data_type)) = (
            cell(row, "table_name"),
            cell(row, "column_name"),
            cell(row, "data_type"),
        ) else {
            continue;
        };

        let column = ColumnDefinition::new(column, data_type);
        match tables.iter_mut().find(|t| t.table_name == table) {
            Some(existing) => {
                if !existing.columns.contains(&column) {
                    existing.columns.push(column);
                }
            }
            None => tables.push(TableSchema::new(table).with_column(column)),
        }
    }
    tables
}

fn attach_primary_keys(tables: &mut [TableSchema], keys: &QueryResult) {
    for row in &keys.rows {
        let (Some(table), Some(column)) = (cell(row, "table_name"), cell(row, "column_name"))
        else {
            continue;
        };
        if let Some(t) = tables.iter_mut().find(|t| t.table_name == table) {
            t.primary_key.push(column.to_string());
        }
    }
}

/// Render tables as prompt text:
///
/// ```text
/// Table: EVENTS
/// Columns and data types:
/// EVENT_ID: Int32
/// EVENT_TYPE: String
/// Primary keys: EVENT_ID
/// ```
///
/// Blocks are separated by a blank line.
pub fn render_tables(tables: &[TableSchema]) -> String {
    tables
        .iter()
        .map(|table| {
            let mut block = format!("Table: {}\nColumns and data types:\n", table.table_name);
            for column in &table.columns {
                block.push_str(&format!("{}: {}\n", column.name, column.data_type));
            }
            if !table.primary_key.is_empty() {
                block.push_str(&format!("Primary keys: {}\n", table.primary_key.join(", ")));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::ColumnMetadata;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers the metadata queries from canned rows and records every SQL.
    struct MetadataBackend {
        columns: Vec<(&'static str, &'static str, &'static str)>,
        keys: Option<Vec<(&'static str, &'static str)>>,
        seen: Mutex<Vec<String>>,
    }

    impl MetadataBackend {
        fn new(columns: Vec<(&'static str, &'static str, &'static str)>) -> Self {
            Self {
                columns,
                keys: Some(Vec::new()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    fn rows(pairs: Vec<Vec<(&str, &str)>>) -> QueryResult {
        let rows = pairs
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(k, v)| (k.to_string(), json!(v)))
                    .collect()
            })
            .collect();
        QueryResult {
            columns: vec![ColumnMetadata::new("table_name", "String", false)],
            rows,
            execution_time_ms: 1,
        }
    }

    impl QueryBackend for MetadataBackend {
        async fn query(&self, sql: &str) -> AppResult<QueryResult> {
            self.seen.lock().unwrap().push(sql.to_string());
            if sql.contains("INFORMATION_SCHEMA.COLUMNS") {
                Ok(rows(
                    self.columns
                        .iter()
                        .map(|(t, c, d)| {
                            vec![("table_name", *t), ("column_name", *c), ("data_type", *d)]
                        })
                        .collect(),
                ))
            } else {
                match &self.keys {
                    Some(keys) => Ok(rows(
                        keys.iter()
                            .map(|(t, c)| vec![("table_name", *t), ("column_name", *c)])
                            .collect(),
                    )),
                    None => Err(AppError::database("ACCESS_DENIED", Some("497".into()), "")),
                }
            }
        }

        fn name(&self) -> &'static str {
            "metadata"
        }
    }

    #[test]
    fn test_static_mode_returns_literal_without_querying() {
        let backend = MetadataBackend::new(Vec::new());
        let desc = tokio_test::block_on(SchemaDescriber::new(SchemaMode::Static).describe(&backend))
            .unwrap();
        assert_eq!(desc.text, STATIC_SCHEMA);
        assert_eq!(desc.source, SchemaSource::Static);
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_live_mode_zero_rows_is_empty() {
        let backend = MetadataBackend::new(Vec::new());
        let desc = tokio_test::block_on(SchemaDescriber::new(SchemaMode::Live).describe(&backend))
            .unwrap();
        assert_eq!(desc.source, SchemaSource::Live);
        assert_eq!(desc.text, "");
        assert_eq!(desc.table_count, 0);
    }

    #[test]
    fn test_live_mode_groups_by_table_and_annotates_keys() {
        let mut backend = MetadataBackend::new(vec![
            ("EVENTS", "EVENT_ID", "Int32"),
            ("CUSTOMERS", "CUSTOMER_ID", "Int32"),
            ("EVENTS", "EVENT_TYPE", "String"),
            ("CUSTOMERS", "CUSTOMER_NAME", "String"),
        ]);
        backend.keys = Some(vec![("EVENTS", "EVENT_ID"), ("CUSTOMERS", "CUSTOMER_ID")]);

        let desc = tokio_test::block_on(SchemaDescriber::new(SchemaMode::Live).describe(&backend))
            .unwrap();
        assert_eq!(
            desc.text,
            "Table: EVENTS\nColumns and data types:\nEVENT_ID: Int32\nEVENT_TYPE: String\n\
             Primary keys: EVENT_ID\n\
             \n\
             Table: CUSTOMERS\nColumns and data types:\nCUSTOMER_ID: Int32\nCUSTOMER_NAME: String\n\
             Primary keys: CUSTOMER_ID\n"
        );
        assert_eq!(desc.table_count, 2);
    }

    #[test]
    fn test_live_mode_survives_primary_key_failure() {
        let mut backend = MetadataBackend::new(vec![("EVENTS", "EVENT_ID", "Int32")]);
        backend.keys = None;
        let desc = tokio_test::block_on(SchemaDescriber::new(SchemaMode::Live).describe(&backend))
            .unwrap();
        assert_eq!(desc.text, "Table: EVENTS\nColumns and data types:\nEVENT_ID: Int32\n");
    }

    #[test]
    fn test_columns_query_filters_catalog_and_excluded_tables() {
        let describer = SchemaDescriber::new(SchemaMode::Live)
            .with_catalog("events_db")
            .with_excluded_tables(vec!["statistics".into(), "o'brien".into()]);
        let sql = describer.columns_query();
        assert!(sql.contains("table_catalog = 'events_db'"));
        assert!(sql.contains("NOT IN ('statistics', 'o\\'brien')"));
    }

    #[test]
    fn test_columns_query_without_exclusions() {
        let sql = SchemaDescriber::new(SchemaMode::Live)
            .with_excluded_tables(Vec::new())
            .columns_query();
        assert!(!sql.contains("NOT IN"));
    }

    #[test]
    fn test_group_columns_skips_incomplete_rows_and_duplicates() {
        let result = rows(vec![
            vec![("table_name", "T"), ("column_name", "a"), ("data_type", "UInt8")],
            vec![("table_name", "T"), ("column_name", "a"), ("data_type", "UInt8")],
            vec![("table_name", "T"), ("column_name", "b")],
        ]);
        let tables = group_columns(&result);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].columns, vec![ColumnDefinition::new("a", "UInt8")]);
    }
}
