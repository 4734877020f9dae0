use std::time::Duration;

/// Tuning knobs for one agent instance. The core performs no environment
/// or file parsing; callers build this from whatever configuration layer
/// they own.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Model identifier forwarded to the LLM provider.
    pub model: String,
    /// Hard cap on rows returned by execution, independent of any LIMIT
    /// clause in the statement itself.
    pub row_cap: usize,
    /// Extra SQL generation attempts after the first one fails validation.
    pub retry_budget: usize,
    /// Sample values captured per column during schema introspection.
    pub sample_rows: usize,
    /// Sensitive columns excluded from the schema summary, as
    /// case-insensitive `table.column` names.
    pub excluded_columns: Vec<String>,
    /// Wall-clock bound on a single query execution.
    pub statement_timeout: Duration,
    /// Sampling temperature for generation and summarization.
    pub temperature: Option<f32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            row_cap: 30,
            retry_budget: 2,
            sample_rows: 3,
            excluded_columns: Vec::new(),
            statement_timeout: Duration::from_secs(30),
            temperature: None,
        }
    }
}

impl AgentConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }
}
