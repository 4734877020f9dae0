//! Conversational SQL agent with checkpointed thread memory.
//!
//! One call to [`SqlAgent::ask`] performs one turn: load the latest
//! checkpoint for the thread, discover the schema, generate SQL, validate
//! and repair it within a bounded budget, execute it read-only under a row
//! cap, summarize the result, and durably append the new conversation
//! state before returning.

mod agent;
mod config;
mod error;
mod execute;
mod generate;
mod prompt;
mod schema;
mod state;
mod summarize;
mod validate;

pub use agent::SqlAgent;
pub use config::AgentConfig;
pub use error::{AgentError, FailureKind};
pub use execute::{QueryExecutor, QueryResult};
pub use generate::{clean_sql, QueryGenerator};
pub use prompt::PromptTemplate;
pub use schema::{ColumnSummary, SchemaIntrospector, SchemaSummary, TableSummary};
pub use state::{ConversationState, Turn, TurnFailure, TurnReport, TurnStep};
pub use summarize::ResultSummarizer;
pub use validate::{SqlCandidate, SqlValidator, ValidationStatus};
