use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Minimal `{{var}}` substitution template. Unknown variables render as
/// empty strings so optional blocks (feedback, follow-up context) can be
/// omitted without a second template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern =
            PATTERN.get_or_init(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("static pattern"));
        pattern
            .replace_all(&self.template, |caps: &regex::Captures| {
                vars.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned()
    }
}

pub const GENERATE_SYSTEM_PROMPT: &str = "\
You are an agent designed to interact with a SQLite database.
Given an input question, write a single syntactically correct SQLite query.
Unless the user asks for a specific number of rows, limit your query to at
most {{row_cap}} results. Never query for all columns of a table; select only
the columns relevant to the question.

DO NOT make any DML statements (INSERT, UPDATE, DELETE, DROP etc.) to the
database. Only read-only SELECT queries are permitted.

Reply with the SQL statement only, no commentary and no markdown fences.

Database schema:
{{schema}}";

pub const GENERATE_USER_PROMPT: &str = "\
{{followup_context}}{{feedback}}Question: {{question}}";

pub const FEEDBACK_BLOCK: &str = "\
Your previous query was rejected by the validator. Fix the problem and
return a corrected query.
Validator error: {{feedback}}

";

pub const FOLLOWUP_BLOCK: &str = "\
Previous question: {{prev_question}}
Previous SQL: {{prev_sql}}
Previous answer: {{prev_summary}}

";

pub const SUMMARY_PROMPT: &str = "\
You are a data analyst explaining query results to a business user.
Answer the question directly in plain language, mentioning relevant counts
and totals from the result. Do not invent values that are not present.

Question: {{question}}
SQL executed: {{sql}}
Result rows:
{{result}}";
