use std::time::Duration;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};

use crate::error::AgentError;

/// Rows returned by a validated query, bounded by the configured row cap.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub row_count: usize,
    /// True iff the underlying result set held more rows than the cap.
    pub truncated: bool,
}

impl QueryResult {
    /// Renders rows as pretty JSON for the summarization prompt, with an
    /// explicit truncation marker so the model cannot mistake a capped
    /// result for a complete one.
    pub fn to_prompt_block(&self) -> String {
        let rows = Value::Array(self.rows.iter().cloned().map(Value::Object).collect());
        let mut block = serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string());
        if self.truncated {
            block.push_str(&format!(
                "\n... [truncated: showing first {} rows, more exist]",
                self.row_count
            ));
        }
        block
    }
}

/// Decodes one column of a SQLite row into JSON by storage class.
pub(crate) fn decode_column(row: &SqliteRow, index: usize) -> Value {
    let raw = match row.try_get_raw(index) {
        Ok(raw) => raw,
        Err(_) => return Value::Null,
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_string();
    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get::<i64, _>(index)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" => row
            .try_get::<f64, _>(index)
            .map(|v| serde_json::json!(v))
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|v| Value::String(format!("<{} bytes>", v.len())))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<String, _>(index)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Runs validated SQL with a row cap and a statement timeout. Database
/// errors here are fatal for the turn; the validator already had its say,
/// this is defense in depth.
#[derive(Clone, Debug)]
pub struct QueryExecutor {
    row_cap: usize,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(row_cap: usize, timeout: Duration) -> Self {
        Self { row_cap, timeout }
    }

    pub async fn run(&self, pool: &SqlitePool, sql: &str) -> Result<QueryResult, AgentError> {
        match tokio::time::timeout(self.timeout, self.fetch_capped(pool, sql)).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Execution(format!(
                "statement timed out after {:?}",
                self.timeout
            ))),
        }
    }

    async fn fetch_capped(&self, pool: &SqlitePool, sql: &str) -> Result<QueryResult, AgentError> {
        let mut stream = sqlx::query(sql).fetch(pool);
        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Map<String, Value>> = Vec::new();
        let mut truncated = false;

        while let Some(row) = stream
            .try_next()
            .await
            .map_err(|err| AgentError::Execution(err.to_string()))?
        {
            if columns.is_empty() {
                columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            if rows.len() == self.row_cap {
                truncated = true;
                break;
            }
            let mut object = Map::new();
            for (index, column) in row.columns().iter().enumerate() {
                object.insert(column.name().to_string(), decode_column(&row, index));
            }
            rows.push(object);
        }

        Ok(QueryResult {
            columns,
            row_count: rows.len(),
            rows,
            truncated,
        })
    }
}
