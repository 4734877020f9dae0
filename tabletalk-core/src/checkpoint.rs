use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::TabletalkError;

/// Conversation state that can be snapshotted into a checkpoint.
pub trait StateSchema:
    Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static
{
}

/// An immutable snapshot of a thread's conversation state, taken after
/// each completed turn. Checkpoints for a thread form a strictly ordered
/// append-only sequence; a new turn always starts from the latest one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(bound = "S: StateSchema")]
pub struct Checkpoint<S: StateSchema> {
    pub thread_id: String,
    pub seq: u64,
    pub created_at: String,
    pub state: S,
}

impl<S: StateSchema> Checkpoint<S> {
    pub fn new(thread_id: String, seq: u64, state: S) -> Self {
        Self {
            thread_id,
            seq,
            created_at: Utc::now().to_rfc3339(),
            state,
        }
    }
}

/// Durable checkpoint store. `append` is the only write operation and the
/// write must survive a crash once the call returns. Checkpoints are never
/// mutated in place. At most one in-flight turn per thread is assumed; if
/// two turns race, the later append wins.
#[async_trait::async_trait]
pub trait Checkpointer<S: StateSchema>: Send + Sync {
    async fn append(&self, checkpoint: &Checkpoint<S>) -> Result<(), TabletalkError>;
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, TabletalkError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointMetadata {
    pub seq: u64,
    pub created_at: String,
}

#[async_trait::async_trait]
pub trait HistoryCheckpointer<S: StateSchema>: Checkpointer<S> {
    async fn list_checkpoints(
        &self,
        thread_id: &str,
    ) -> Result<Vec<CheckpointMetadata>, TabletalkError>;
}

/// Volatile checkpoint store for tests and single-process use.
#[derive(Default, Clone)]
pub struct InMemoryCheckpointer<S: StateSchema> {
    inner: Arc<RwLock<HashMap<String, Vec<Checkpoint<S>>>>>,
}

impl<S: StateSchema> InMemoryCheckpointer<S> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl<S: StateSchema> Checkpointer<S> for InMemoryCheckpointer<S> {
    async fn append(&self, checkpoint: &Checkpoint<S>) -> Result<(), TabletalkError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| TabletalkError::CheckpointFailed("lock".into()))?;
        guard
            .entry(checkpoint.thread_id.clone())
            .or_default()
            .push(checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, TabletalkError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| TabletalkError::CheckpointFailed("lock".into()))?;
        Ok(guard
            .get(thread_id)
            .and_then(|history| history.last().cloned()))
    }
}

#[async_trait::async_trait]
impl<S: StateSchema> HistoryCheckpointer<S> for InMemoryCheckpointer<S> {
    async fn list_checkpoints(
        &self,
        thread_id: &str,
    ) -> Result<Vec<CheckpointMetadata>, TabletalkError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| TabletalkError::CheckpointFailed("lock".into()))?;
        let history = guard.get(thread_id).cloned().unwrap_or_default();
        Ok(history
            .into_iter()
            .map(|cp| CheckpointMetadata {
                seq: cp.seq,
                created_at: cp.created_at,
            })
            .collect())
    }
}
