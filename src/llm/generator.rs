use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schema_registry::SchemaRegistry;
use crate::error::GenerationError;
use crate::llm::models::{GeneratedQuery, QuerySource};
use crate::llm::prompt::build_prompt;
use crate::llm::sanitize::{ensure_row_limit, strip_code_fences};
use crate::llm::templates::match_template;
use crate::llm::{LlmError, LlmManager};

/// Natural-language question to SQL. AI first when configured, keyword
/// templates otherwise or when the AI call fails.
pub struct SqlGenerator {
    llm: Option<LlmManager>,
    registry: Arc<SchemaRegistry>,
    row_limit: u32,
}

impl SqlGenerator {
    pub fn new(llm: Option<LlmManager>, registry: Arc<SchemaRegistry>, row_limit: u32) -> Self {
        Self {
            llm,
            registry,
            row_limit,
        }
    }

    pub fn has_ai(&self) -> bool {
        self.llm.is_some()
    }

    pub fn row_limit(&self) -> u32 {
        self.row_limit
    }

    pub async fn generate(&self, question: &str) -> Result<GeneratedQuery, GenerationError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(GenerationError::EmptyQuestion);
        }

        if let Some(llm) = &self.llm {
            match self.generate_with_ai(llm, question).await {
                Ok(sql) => {
                    info!("Generated SQL with {}", llm.provider_name());
                    return Ok(self.finish(question, &sql, QuerySource::Ai));
                }
                Err(e) => {
                    let e = GenerationError::from(e);
                    warn!("{}; falling back to templates", e);
                }
            }
        }

        let (rule, sql) = match_template(question);
        info!("Generated SQL from template {}", rule);
        Ok(self.finish(question, &sql, QuerySource::Template))
    }

    async fn generate_with_ai(&self, llm: &LlmManager, question: &str) -> Result<String, LlmError> {
        let prompt = build_prompt(&self.registry, question);
        let response = llm.complete(&prompt).await?;
        let sql = strip_code_fences(&response);

        if sql.is_empty() {
            return Err(LlmError::ResponseError("Completion contained no SQL".to_string()));
        }

        let unknown = self.registry.unknown_tables(&sql);
        if !unknown.is_empty() {
            // Tables outside the registry may still exist in the warehouse
            warn!("Generated SQL references unregistered tables: {}", unknown.join(", "));
        }

        Ok(sql)
    }

    fn finish(&self, question: &str, sql: &str, source: QuerySource) -> GeneratedQuery {
        GeneratedQuery {
            natural_language_text: question.to_string(),
            sql_text: ensure_row_limit(sql, self.row_limit),
            source,
        }
    }
}
