//! Data models for clickhouse-text2sql.
//!
//! This module re-exports all model types used throughout the application.

pub mod query;
pub mod schema;

// Re-export commonly used types
pub use query::{ColumnMetadata, QueryResult};
pub use schema::{ColumnDefinition, SchemaDescription, SchemaSource, TableSchema};
