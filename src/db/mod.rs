//! Database access layer.
//!
//! This module provides ClickHouse access:
//! - Connection provider (`connector`)
//! - Client handle and query execution (`client`)
//! - HTTP response decoding and error classification (`types`)

pub mod client;
pub mod connector;
pub mod types;

pub use client::ClickHouseClient;
pub use connector::ClickHouseConnector;

use crate::error::AppResult;
use crate::models::QueryResult;
use std::future::Future;

/// Anything that can run a SQL statement and hand back a tabular result.
///
/// The schema describer and the pipeline only depend on this trait, so a
/// single handle serves both the metadata query and the generated query.
pub trait QueryBackend: Send + Sync {
    /// Execute one SQL statement.
    fn query(&self, sql: &str) -> impl Future<Output = AppResult<QueryResult>> + Send;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}
