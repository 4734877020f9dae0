//! SQLite-backed checkpoint store.
//!
//! Checkpoints land in a single append-only table keyed by
//! `(thread_id, seq)`. The write is committed before `append` returns, so
//! a crash immediately after the call cannot lose the turn.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;

use tabletalk_core::{
    Checkpoint, CheckpointMetadata, Checkpointer, HistoryCheckpointer, StateSchema,
    TabletalkError,
};

const CREATE_CHECKPOINTS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS checkpoints (\
    thread_id TEXT NOT NULL,\
    seq INTEGER NOT NULL,\
    created_at TEXT NOT NULL,\
    state_json TEXT NOT NULL,\
    PRIMARY KEY (thread_id, seq)\
)";

#[derive(Debug, Error)]
pub enum CheckpointSqliteError {
    #[error("failed to connect: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::Error),
    #[error("checkpoint query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("checkpoint state is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

fn map_sqlite_error(error: CheckpointSqliteError) -> TabletalkError {
    TabletalkError::CheckpointFailed(error.to_string())
}

#[derive(Debug, Clone)]
pub struct SqliteCheckpointer {
    pool: sqlx::SqlitePool,
}

#[derive(Debug, Clone)]
pub struct SqliteCheckpointerBuilder {
    database_url: String,
    max_connections: u32,
}

impl SqliteCheckpointer {
    pub fn builder(database_url: impl Into<String>) -> SqliteCheckpointerBuilder {
        SqliteCheckpointerBuilder {
            database_url: database_url.into(),
            max_connections: 1,
        }
    }
}

impl SqliteCheckpointerBuilder {
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub async fn build(self) -> Result<SqliteCheckpointer, CheckpointSqliteError> {
        let options = SqliteConnectOptions::from_str(&self.database_url)
            .map_err(CheckpointSqliteError::Connection)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await
            .map_err(CheckpointSqliteError::Connection)?;

        sqlx::query(CREATE_CHECKPOINTS_TABLE_SQL)
            .execute(&pool)
            .await
            .map_err(CheckpointSqliteError::Migration)?;

        Ok(SqliteCheckpointer { pool })
    }
}

#[async_trait::async_trait]
impl<S: StateSchema> Checkpointer<S> for SqliteCheckpointer {
    async fn append(&self, checkpoint: &Checkpoint<S>) -> Result<(), TabletalkError> {
        let seq = i64::try_from(checkpoint.seq)
            .map_err(|_| TabletalkError::CheckpointFailed("seq does not fit into i64".into()))?;
        let state_json = serde_json::to_string(&checkpoint.state)
            .map_err(CheckpointSqliteError::Serde)
            .map_err(map_sqlite_error)?;

        // Racing appends on the same (thread_id, seq) resolve last-writer-wins;
        // the caller is expected to run one turn per thread at a time.
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoints (thread_id, seq, created_at, state_json) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&checkpoint.thread_id)
        .bind(seq)
        .bind(&checkpoint.created_at)
        .bind(state_json)
        .execute(&self.pool)
        .await
        .map_err(CheckpointSqliteError::Query)
        .map_err(map_sqlite_error)?;

        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, TabletalkError> {
        let row = sqlx::query(
            "SELECT seq, created_at, state_json FROM checkpoints \
             WHERE thread_id = ?1 ORDER BY seq DESC LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CheckpointSqliteError::Query)
        .map_err(map_sqlite_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let seq: i64 = row
            .try_get("seq")
            .map_err(CheckpointSqliteError::Query)
            .map_err(map_sqlite_error)?;
        let seq = u64::try_from(seq)
            .map_err(|_| TabletalkError::CheckpointFailed("seq is negative".into()))?;
        let created_at: String = row
            .try_get("created_at")
            .map_err(CheckpointSqliteError::Query)
            .map_err(map_sqlite_error)?;
        let state_json: String = row
            .try_get("state_json")
            .map_err(CheckpointSqliteError::Query)
            .map_err(map_sqlite_error)?;
        let state: S = serde_json::from_str(&state_json)
            .map_err(CheckpointSqliteError::Serde)
            .map_err(map_sqlite_error)?;

        Ok(Some(Checkpoint {
            thread_id: thread_id.to_string(),
            seq,
            created_at,
            state,
        }))
    }
}

#[async_trait::async_trait]
impl<S: StateSchema> HistoryCheckpointer<S> for SqliteCheckpointer {
    async fn list_checkpoints(
        &self,
        thread_id: &str,
    ) -> Result<Vec<CheckpointMetadata>, TabletalkError> {
        let rows = sqlx::query(
            "SELECT seq, created_at FROM checkpoints WHERE thread_id = ?1 ORDER BY seq ASC",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CheckpointSqliteError::Query)
        .map_err(map_sqlite_error)?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let seq: i64 = row
                .try_get("seq")
                .map_err(CheckpointSqliteError::Query)
                .map_err(map_sqlite_error)?;
            let seq = u64::try_from(seq)
                .map_err(|_| TabletalkError::CheckpointFailed("seq is negative".into()))?;
            let created_at: String = row
                .try_get("created_at")
                .map_err(CheckpointSqliteError::Query)
                .map_err(map_sqlite_error)?;
            history.push(CheckpointMetadata { seq, created_at });
        }
        Ok(history)
    }
}
