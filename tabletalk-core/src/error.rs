use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TabletalkError {
    #[error("LLM provider failed: {0}")]
    LlmProvider(String),
    #[error("LLM returned an empty completion")]
    EmptyCompletion,
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Max retries ({max}) exceeded")]
    MaxRetriesExceeded { max: usize },
    #[error("Checkpoint failed: {0}")]
    CheckpointFailed(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Custom(String),
}
