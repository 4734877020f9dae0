mod checkpoint;
mod error;
mod llm;
mod retry;

pub use checkpoint::{
    Checkpoint, CheckpointMetadata, Checkpointer, HistoryCheckpointer, InMemoryCheckpointer,
    StateSchema,
};
pub use error::TabletalkError;
pub use llm::{ChatLlm, LlmRequest, LlmResponse, Message, Role};
pub use retry::{is_retryable, RetryingLlm};

/// Generates an opaque thread identifier for callers that do not supply
/// their own.
pub fn new_thread_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
