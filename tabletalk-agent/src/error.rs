use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("schema introspection failed: {0}")]
    Introspection(String),
    #[error("query generation failed: {0}")]
    Generation(String),
    #[error("query validation failed after {attempts} attempts: {reason}")]
    Validation { reason: String, attempts: usize },
    #[error("statement rejected by policy: {0}")]
    PolicyViolation(String),
    #[error("query execution failed: {0}")]
    Execution(String),
    #[error("memory store failed: {0}")]
    MemoryStore(String),
}

/// Failure taxonomy recorded on a turn. Mirrors the `AgentError` variants
/// so persisted turns can name why they failed.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Introspection,
    Generation,
    Validation,
    PolicyViolation,
    Execution,
    MemoryStore,
}

impl AgentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AgentError::Introspection(_) => FailureKind::Introspection,
            AgentError::Generation(_) => FailureKind::Generation,
            AgentError::Validation { .. } => FailureKind::Validation,
            AgentError::PolicyViolation(_) => FailureKind::PolicyViolation,
            AgentError::Execution(_) => FailureKind::Execution,
            AgentError::MemoryStore(_) => FailureKind::MemoryStore,
        }
    }
}
