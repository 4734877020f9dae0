use chrono::Utc;
use serde::{Deserialize, Serialize};

use tabletalk_core::{Message, StateSchema};

use crate::error::FailureKind;

/// Full conversation state for one thread, snapshotted into a checkpoint
/// after every turn.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub turns: Vec<Turn>,
    /// Last successfully executed SQL, if any.
    pub last_sql: Option<String>,
    pub prev_question: Option<String>,
    pub prev_summary: Option<String>,
}

impl StateSchema for ConversationState {}

/// One user question plus everything the agent did for it. Every call to
/// `ask` produces exactly one of these, success or failure.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub question: String,
    pub steps: Vec<TurnStep>,
    pub sql: Option<String>,
    pub answer: Option<String>,
    pub failure: Option<TurnFailure>,
    pub created_at: String,
}

impl Turn {
    pub fn started(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            steps: Vec::new(),
            sql: None,
            answer: None,
            failure: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Ordered trace of what happened inside a turn.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TurnStep {
    SchemaLoaded {
        tables: usize,
    },
    SqlGenerated {
        attempt: usize,
        sql: String,
    },
    ValidationFailed {
        attempt: usize,
        reason: String,
        policy_violation: bool,
    },
    ValidationPassed {
        attempt: usize,
    },
    QueryExecuted {
        rows: usize,
        truncated: bool,
    },
    Summarized,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TurnFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// What `ask` hands back to the caller: the finalized turn plus where it
/// landed in the thread's checkpoint sequence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TurnReport {
    pub thread_id: String,
    pub seq: u64,
    pub turn: Turn,
}

impl TurnReport {
    pub fn answer(&self) -> Option<&str> {
        self.turn.answer.as_deref()
    }

    pub fn failed(&self) -> bool {
        self.turn.failed()
    }
}
