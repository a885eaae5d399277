//! Question-to-result pipeline.
//!
//! Strictly sequential: describe schema, translate, strip semicolons, execute
//! on the same backend. Any stage error ends the run.

use crate::config::SchemaMode;
use crate::db::QueryBackend;
use crate::error::{AppError, AppResult};
use crate::llm::CompletionModel;
use crate::models::{QueryResult, SchemaDescription};
use crate::prompt::{PromptTemplate, SCHEMA_VAR};
use crate::schema::SchemaDescriber;
use crate::translator::Text2Sql;
use tracing::{debug, info};

/// Remove every `;` from model-generated SQL.
///
/// Not a safety measure: the remaining text reaches the database as-is.
/// Semicolons inside string literals are removed too, and multi-statement
/// output collapses into a single statement.
pub fn strip_semicolons(sql: &str) -> String {
    sql.replace(';', "")
}

/// Reject a live schema paired with a template that has no `{db_schema}`
/// placeholder: the metadata would be queried and then dropped.
pub fn check_schema_template(mode: SchemaMode, template: &PromptTemplate) -> AppResult<()> {
    if mode == SchemaMode::Live && !template.takes(SCHEMA_VAR) {
        return Err(AppError::invalid_input(
            "--schema-mode live needs a template with a {db_schema} placeholder; \
             use --template schema-aware",
        ));
    }
    Ok(())
}

/// Everything a run produced.
#[derive(Debug)]
pub struct PipelineOutput {
    pub schema: SchemaDescription,
    /// Completion text exactly as returned by the model.
    pub raw_sql: String,
    /// SQL submitted to the database.
    pub sql: String,
    pub result: QueryResult,
}

pub struct Pipeline<'a, B, M> {
    backend: &'a B,
    translator: Text2Sql<M>,
    describer: SchemaDescriber,
}

impl<'a, B: QueryBackend, M: CompletionModel> Pipeline<'a, B, M> {
    pub fn new(backend: &'a B, translator: Text2Sql<M>, describer: SchemaDescriber) -> Self {
        Self {
            backend,
            translator,
            describer,
        }
    }

    pub fn translator(&self) -> &Text2Sql<M> {
        &self.translator
    }

    /// Answer one question.
    pub async fn run(&self, question: &str) -> AppResult<PipelineOutput> {
        info!(question = %question, "Answering question");
        check_schema_template(self.describer.mode(), self.translator.template())?;

        let schema = self.describer.describe(self.backend).await?;
        debug!(
            source = %schema.source,
            schema_chars = schema.text.len(),
            "Schema described"
        );

        let raw_sql = self
            .translator
            .get_sql_by_question_and_schema(question, schema.as_str())
            .await?;

        let sql = strip_semicolons(&raw_sql);
        if sql.trim().is_empty() {
            return Err(AppError::completion(
                "Model returned no SQL",
                "Rephrase the question or raise max_tokens in models.openai.params",
            ));
        }
        info!(sql = %sql.trim(), "Executing generated SQL");

        let result = self.backend.query(&sql).await?;
        info!(
            rows = result.row_count(),
            execution_time_ms = result.execution_time_ms,
            "Query complete"
        );

        Ok(PipelineOutput {
            schema,
            raw_sql,
            sql,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_schema_needs_schema_placeholder() {
        use crate::prompt::{few_shot_template, schema_aware_template};

        assert!(check_schema_template(SchemaMode::Static, &few_shot_template()).is_ok());
        assert!(check_schema_template(SchemaMode::Static, &schema_aware_template()).is_ok());
        assert!(check_schema_template(SchemaMode::Live, &schema_aware_template()).is_ok());

        let err = check_schema_template(SchemaMode::Live, &few_shot_template()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { .. }));
    }

    #[test]
    fn test_strip_trailing_semicolon() {
        assert_eq!(strip_semicolons("SELECT 1;"), "SELECT 1");
    }

    #[test]
    fn test_strip_every_semicolon() {
        assert_eq!(
            strip_semicolons("SELECT 1; DROP TABLE x;"),
            "SELECT 1 DROP TABLE x"
        );
    }

    #[test]
    fn test_strip_leaves_other_sql_untouched() {
        let sql = " SELECT count() FROM EVENT_STATISTICS WHERE toYear(date) = 2022\n";
        assert_eq!(strip_semicolons(sql), sql);
    }

    #[test]
    fn test_strip_inside_literals_too() {
        assert_eq!(strip_semicolons("SELECT 'a;b'"), "SELECT 'ab'");
    }
}
