use std::collections::HashMap;

use tabletalk_core::{ChatLlm, LlmRequest, Message};

use crate::error::AgentError;
use crate::execute::QueryResult;
use crate::prompt::{PromptTemplate, SUMMARY_PROMPT};

/// Turns tabular results back into a business-readable answer. An empty
/// result set short-circuits to a fixed answer instead of asking the model
/// to narrate rows that do not exist.
pub struct ResultSummarizer<L> {
    llm: L,
    model: String,
    temperature: Option<f32>,
}

impl<L: ChatLlm> ResultSummarizer<L> {
    pub fn new(llm: L, model: impl Into<String>, temperature: Option<f32>) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature,
        }
    }

    pub async fn summarize(
        &self,
        question: &str,
        sql: &str,
        result: &QueryResult,
    ) -> Result<String, AgentError> {
        if result.rows.is_empty() {
            return Ok("No rows matched the query.".to_string());
        }

        let prompt = PromptTemplate::new(SUMMARY_PROMPT).render(&HashMap::from([
            ("question", question.to_string()),
            ("sql", sql.to_string()),
            ("result", result.to_prompt_block()),
        ]));

        let mut request = LlmRequest::new(self.model.clone(), vec![Message::system(prompt)]);
        request.temperature = self.temperature;

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|err| AgentError::Generation(err.to_string()))?;

        Ok(response.content.trim().to_string())
    }
}
