//! clickhouse-text2sql library.
//!
//! Turns a natural-language question into SQL with a hosted completion model,
//! runs it on ClickHouse and returns the result set.

pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod translator;

pub use config::{AppConfig, Config};
pub use error::{AppError, AppResult};
pub use pipeline::{Pipeline, PipelineOutput, strip_semicolons};
