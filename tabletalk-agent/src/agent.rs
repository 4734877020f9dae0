use std::sync::Arc;
use std::time::Instant;

use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use tabletalk_core::{ChatLlm, Checkpoint, Checkpointer, Message, RetryingLlm};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::execute::{QueryExecutor, QueryResult};
use crate::generate::QueryGenerator;
use crate::schema::{SchemaIntrospector, SchemaSummary};
use crate::state::{ConversationState, Turn, TurnFailure, TurnReport, TurnStep};
use crate::summarize::ResultSummarizer;
use crate::validate::{SqlCandidate, SqlValidator, ValidationStatus};

/// Transparent retry on transient LLM provider failures, applied at the
/// call boundary. Distinct from the SQL repair loop.
const LLM_ATTEMPTS: usize = 2;

type AgentLlm = RetryingLlm<Arc<dyn ChatLlm>>;

/// States of one turn. Transitions are fixed; the only branch is at
/// `CheckQuery`, which either proceeds to execution or loops back to
/// generation while the retry budget lasts.
enum AgentStep {
    Start,
    ListTables,
    GetSchema,
    GenerateQuery {
        attempt: usize,
        feedback: Option<String>,
    },
    CheckQuery {
        candidate: SqlCandidate,
        attempt: usize,
    },
    RunQuery {
        sql: String,
    },
    Summarize {
        sql: String,
        result: QueryResult,
    },
    End {
        answer: String,
    },
}

impl AgentStep {
    fn label(&self) -> &'static str {
        match self {
            AgentStep::Start => "start",
            AgentStep::ListTables => "list_tables",
            AgentStep::GetSchema => "get_schema",
            AgentStep::GenerateQuery { .. } => "generate_query",
            AgentStep::CheckQuery { .. } => "check_query",
            AgentStep::RunQuery { .. } => "run_query",
            AgentStep::Summarize { .. } => "summarize",
            AgentStep::End { .. } => "end",
        }
    }
}

/// The conversational SQL agent. One call to [`SqlAgent::ask`] performs
/// exactly one turn: it resumes from the latest checkpoint for the thread,
/// walks the state machine, and appends exactly one new checkpoint —
/// success or failure — before returning.
pub struct SqlAgent {
    db: SqlitePool,
    checkpointer: Arc<dyn Checkpointer<ConversationState>>,
    config: AgentConfig,
    introspector: SchemaIntrospector,
    validator: SqlValidator,
    executor: QueryExecutor,
    generator: QueryGenerator<AgentLlm>,
    summarizer: ResultSummarizer<AgentLlm>,
    schema_cache: RwLock<Option<SchemaSummary>>,
}

impl SqlAgent {
    pub fn new(
        llm: Arc<dyn ChatLlm>,
        db: SqlitePool,
        checkpointer: Arc<dyn Checkpointer<ConversationState>>,
        config: AgentConfig,
    ) -> Self {
        let generator = QueryGenerator::new(
            RetryingLlm::new(Arc::clone(&llm), LLM_ATTEMPTS),
            config.model.clone(),
            config.row_cap,
            config.temperature,
        );
        let summarizer = ResultSummarizer::new(
            RetryingLlm::new(llm, LLM_ATTEMPTS),
            config.model.clone(),
            config.temperature,
        );
        let introspector = SchemaIntrospector::new(config.sample_rows, &config.excluded_columns);
        let executor = QueryExecutor::new(config.row_cap, config.statement_timeout);

        Self {
            db,
            checkpointer,
            config,
            introspector,
            validator: SqlValidator::new(),
            executor,
            generator,
            summarizer,
            schema_cache: RwLock::new(None),
        }
    }

    pub fn new_thread_id() -> String {
        tabletalk_core::new_thread_id()
    }

    /// Drops the cached schema summary and re-extracts it.
    pub async fn refresh_schema(&self) -> Result<SchemaSummary, AgentError> {
        self.schema(true).await
    }

    async fn schema(&self, force: bool) -> Result<SchemaSummary, AgentError> {
        if !force {
            if let Some(cached) = self.schema_cache.read().await.as_ref() {
                return Ok(cached.clone());
            }
        }
        let summary = self.introspector.extract(&self.db).await?;
        *self.schema_cache.write().await = Some(summary.clone());
        Ok(summary)
    }

    /// Performs one turn for `thread_id`. Every invocation produces exactly
    /// one turn record; failures inside the turn are recorded on the turn
    /// and checkpointed. Only a memory-store failure makes this return
    /// `Err`, because a turn the store cannot persist would silently break
    /// the conversation's continuity.
    pub async fn ask(&self, thread_id: &str, question: &str) -> Result<TurnReport, AgentError> {
        let started = Instant::now();

        let prior = self
            .checkpointer
            .load(thread_id)
            .await
            .map_err(|err| AgentError::MemoryStore(err.to_string()))?;
        let (mut state, seq) = match prior {
            Some(checkpoint) => (checkpoint.state, checkpoint.seq + 1),
            None => (ConversationState::default(), 1),
        };

        let mut turn = Turn::started(question);
        match self.run_turn(question, &state, &mut turn).await {
            Ok(answer) => turn.answer = Some(answer),
            Err(error) => {
                turn.failure = Some(TurnFailure {
                    kind: error.kind(),
                    message: error.to_string(),
                });
            }
        }

        // History records the turn either way, so follow-up turns know the
        // prior attempt did not succeed.
        state.messages.push(Message::user(question));
        if let Some(answer) = &turn.answer {
            state.messages.push(Message::assistant(answer.clone()));
        } else if let Some(failure) = &turn.failure {
            state.messages.push(Message::assistant(format!(
                "That question could not be answered: {}",
                failure.message
            )));
        }
        if !turn.failed() {
            state.prev_question = Some(question.to_string());
            state.prev_summary = turn.answer.clone();
            if let Some(sql) = &turn.sql {
                state.last_sql = Some(sql.clone());
            }
        }
        state.turns.push(turn.clone());

        let checkpoint = Checkpoint::new(thread_id.to_string(), seq, state);
        self.checkpointer
            .append(&checkpoint)
            .await
            .map_err(|err| AgentError::MemoryStore(err.to_string()))?;

        info!(
            thread_id,
            seq,
            failed = turn.failed(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "turn completed"
        );

        Ok(TurnReport {
            thread_id: thread_id.to_string(),
            seq,
            turn,
        })
    }

    async fn run_turn(
        &self,
        question: &str,
        state: &ConversationState,
        turn: &mut Turn,
    ) -> Result<String, AgentError> {
        let mut schema_summary = SchemaSummary::default();
        let mut step = AgentStep::Start;

        loop {
            let label = step.label();
            let step_started = Instant::now();

            step = match step {
                AgentStep::Start => AgentStep::ListTables,

                AgentStep::ListTables => {
                    let summary = self.schema(false).await?;
                    debug!(tables = summary.tables.len(), "tables listed");
                    AgentStep::GetSchema
                }

                AgentStep::GetSchema => {
                    schema_summary = self.schema(false).await?;
                    turn.steps.push(TurnStep::SchemaLoaded {
                        tables: schema_summary.tables.len(),
                    });
                    AgentStep::GenerateQuery {
                        attempt: 1,
                        feedback: None,
                    }
                }

                AgentStep::GenerateQuery { attempt, feedback } => {
                    let candidate = self
                        .generator
                        .generate(question, &schema_summary, state, feedback.as_deref())
                        .await?;
                    turn.steps.push(TurnStep::SqlGenerated {
                        attempt,
                        sql: candidate.sql.clone(),
                    });
                    AgentStep::CheckQuery { candidate, attempt }
                }

                AgentStep::CheckQuery { candidate, attempt } => {
                    let checked = self.validator.validate(&candidate, &schema_summary);
                    match checked.status {
                        ValidationStatus::Valid => {
                            turn.steps.push(TurnStep::ValidationPassed { attempt });
                            AgentStep::RunQuery { sql: checked.sql }
                        }
                        ValidationStatus::Invalid {
                            reason,
                            policy_violation,
                        } => {
                            turn.steps.push(TurnStep::ValidationFailed {
                                attempt,
                                reason: reason.clone(),
                                policy_violation,
                            });
                            if policy_violation {
                                return Err(AgentError::PolicyViolation(reason));
                            }
                            if attempt <= self.config.retry_budget {
                                warn!(attempt, reason = %reason, "query invalid, regenerating");
                                AgentStep::GenerateQuery {
                                    attempt: attempt + 1,
                                    feedback: Some(reason),
                                }
                            } else {
                                return Err(AgentError::Validation {
                                    reason,
                                    attempts: attempt,
                                });
                            }
                        }
                        ValidationStatus::Unchecked => {
                            return Err(AgentError::Validation {
                                reason: "validator returned an unchecked candidate".to_string(),
                                attempts: attempt,
                            })
                        }
                    }
                }

                AgentStep::RunQuery { sql } => {
                    let result = self.executor.run(&self.db, &sql).await?;
                    turn.steps.push(TurnStep::QueryExecuted {
                        rows: result.row_count,
                        truncated: result.truncated,
                    });
                    turn.sql = Some(sql.clone());
                    AgentStep::Summarize { sql, result }
                }

                AgentStep::Summarize { sql, result } => {
                    let answer = self.summarizer.summarize(question, &sql, &result).await?;
                    turn.steps.push(TurnStep::Summarized);
                    AgentStep::End { answer }
                }

                AgentStep::End { answer } => {
                    debug!(
                        state = label,
                        elapsed_ms = step_started.elapsed().as_millis() as u64,
                        "state completed"
                    );
                    return Ok(answer);
                }
            };

            debug!(
                state = label,
                elapsed_ms = step_started.elapsed().as_millis() as u64,
                "state completed"
            );
        }
    }
}
