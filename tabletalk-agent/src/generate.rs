use std::collections::HashMap;

use tabletalk_core::{ChatLlm, LlmRequest, Message};

use crate::error::AgentError;
use crate::prompt::{
    PromptTemplate, FEEDBACK_BLOCK, FOLLOWUP_BLOCK, GENERATE_SYSTEM_PROMPT, GENERATE_USER_PROMPT,
};
use crate::schema::SchemaSummary;
use crate::state::ConversationState;
use crate::validate::SqlCandidate;

/// Turns a question plus schema and conversation context into an
/// unchecked SQL candidate. When the validator rejected a previous
/// attempt, its error is fed back verbatim to bias the correction.
pub struct QueryGenerator<L> {
    llm: L,
    model: String,
    row_cap: usize,
    temperature: Option<f32>,
}

impl<L: ChatLlm> QueryGenerator<L> {
    pub fn new(llm: L, model: impl Into<String>, row_cap: usize, temperature: Option<f32>) -> Self {
        Self {
            llm,
            model: model.into(),
            row_cap,
            temperature,
        }
    }

    pub async fn generate(
        &self,
        question: &str,
        schema: &SchemaSummary,
        state: &ConversationState,
        feedback: Option<&str>,
    ) -> Result<SqlCandidate, AgentError> {
        let system = PromptTemplate::new(GENERATE_SYSTEM_PROMPT).render(&HashMap::from([
            ("row_cap", self.row_cap.to_string()),
            ("schema", schema.to_prompt_block()),
        ]));

        let followup_context = match &state.prev_question {
            Some(prev_question) => PromptTemplate::new(FOLLOWUP_BLOCK).render(&HashMap::from([
                ("prev_question", prev_question.clone()),
                ("prev_sql", state.last_sql.clone().unwrap_or_default()),
                ("prev_summary", state.prev_summary.clone().unwrap_or_default()),
            ])),
            None => String::new(),
        };

        let feedback_block = match feedback {
            Some(error) => PromptTemplate::new(FEEDBACK_BLOCK)
                .render(&HashMap::from([("feedback", error.to_string())])),
            None => String::new(),
        };

        let user = PromptTemplate::new(GENERATE_USER_PROMPT).render(&HashMap::from([
            ("followup_context", followup_context),
            ("feedback", feedback_block),
            ("question", question.to_string()),
        ]));

        let mut messages = vec![Message::system(system)];
        messages.extend(state.messages.iter().cloned());
        messages.push(Message::user(user));

        let mut request = LlmRequest::new(self.model.clone(), messages);
        request.temperature = self.temperature;

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|err| AgentError::Generation(err.to_string()))?;

        Ok(SqlCandidate::unchecked(clean_sql(&response.content)))
    }
}

/// Strips markdown fences and a leading `sql` language tag from a model
/// completion, leaving the bare statement.
pub fn clean_sql(raw: &str) -> String {
    let stripped = raw.replace("```", "");
    let trimmed = stripped.trim();
    let without_tag = trimmed
        .strip_prefix("sql")
        .or_else(|| trimmed.strip_prefix("SQL"))
        .unwrap_or(trimmed);
    without_tag.trim().to_string()
}
