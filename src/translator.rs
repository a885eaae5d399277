//! Question-to-SQL translation.

use crate::config::TemplateKind;
use crate::error::AppResult;
use crate::llm::CompletionModel;
use crate::prompt::{PromptTemplate, QUESTION_VAR, SCHEMA_VAR, few_shot_template, schema_aware_template};
use tracing::{debug, info};

/// Renders the prompt for a question and asks the completion model for SQL.
pub struct Text2Sql<M> {
    model: M,
    template: PromptTemplate,
}

impl<M: CompletionModel> Text2Sql<M> {
    pub fn new(model: M, template: PromptTemplate) -> Self {
        Self { model, template }
    }

    /// Translator using one of the built-in templates.
    pub fn with_builtin(model: M, kind: TemplateKind) -> Self {
        let template = match kind {
            TemplateKind::FewShot => few_shot_template(),
            TemplateKind::SchemaAware => schema_aware_template(),
        };
        Self::new(model, template)
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Render the prompt for `question` and `db_schema`.
    ///
    /// The schema is only used when the template declares `{db_schema}`.
    pub fn render_prompt(&self, question: &str, db_schema: &str) -> AppResult<String> {
        self.template
            .render(&[(QUESTION_VAR, question), (SCHEMA_VAR, db_schema)])
    }

    /// Candidate SQL for `question`: the raw completion text, unvalidated.
    pub async fn get_sql_by_question_and_schema(
        &self,
        question: &str,
        db_schema: &str,
    ) -> AppResult<String> {
        let prompt = self.render_prompt(question, db_schema)?;
        info!(
            model = self.model.model_name(),
            uses_schema = self.template.takes(SCHEMA_VAR),
            "Translating question to SQL"
        );
        debug!(prompt_chars = prompt.len(), "Prompt rendered");

        self.model.complete(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct EchoModel {
        prompts: Mutex<Vec<String>>,
    }

    impl CompletionModel for EchoModel {
        async fn complete(&self, prompt: &str) -> AppResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(" SELECT count() FROM EVENTS;".to_string())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn echo() -> EchoModel {
        EchoModel {
            prompts: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_returns_completion_unmodified() {
        let translator = Text2Sql::with_builtin(echo(), TemplateKind::FewShot);
        let sql = tokio_test::block_on(
            translator.get_sql_by_question_and_schema("How many events?", "ignored"),
        )
        .unwrap();
        assert_eq!(sql, " SELECT count() FROM EVENTS;");
    }

    #[test]
    fn test_schema_aware_prompt_contains_schema() {
        let translator = Text2Sql::with_builtin(echo(), TemplateKind::SchemaAware);
        tokio_test::block_on(
            translator.get_sql_by_question_and_schema("How many events?", "Table: EVENTS"),
        )
        .unwrap();
        let prompts = translator.model().prompts.lock().unwrap();
        assert!(prompts[0].contains("Table: EVENTS"));
        assert!(prompts[0].contains("[Q]: How many events?;"));
    }

    #[test]
    fn test_few_shot_prompt_ignores_schema() {
        let translator = Text2Sql::with_builtin(echo(), TemplateKind::FewShot);
        let prompt = translator
            .render_prompt("How many events?", "Table: SOMETHING_ELSE")
            .unwrap();
        assert!(!prompt.contains("SOMETHING_ELSE"));
    }
}
