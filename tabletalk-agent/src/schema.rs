use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Column, Row, SqlitePool};

use crate::error::AgentError;
use crate::execute::decode_column;

/// Structured description of the target database, rendered into prompts
/// and consulted by the validator.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SchemaSummary {
    pub tables: Vec<TableSummary>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TableSummary {
    pub name: String,
    pub columns: Vec<ColumnSummary>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub data_type: String,
    pub samples: Vec<Value>,
}

impl SchemaSummary {
    pub fn table(&self, name: &str) -> Option<&TableSummary> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Renders the schema the way the generation prompt consumes it: one
    /// block per table, columns with declared types and sample values.
    pub fn to_prompt_block(&self) -> String {
        let mut block = String::new();
        for table in &self.tables {
            block.push_str(&format!("\nTable: {}\n", table.name));
            for column in &table.columns {
                let examples = if column.samples.is_empty() {
                    String::new()
                } else {
                    let rendered: Vec<String> =
                        column.samples.iter().map(render_sample).collect();
                    format!(" (e.g., {})", rendered.join(", "))
                };
                block.push_str(&format!(
                    "  - {} ({}){}\n",
                    column.name, column.data_type, examples
                ));
            }
        }
        block
    }
}

impl TableSummary {
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

fn render_sample(value: &Value) -> String {
    match value.as_str() {
        Some(text) => text.to_string(),
        None => value.to_string(),
    }
}

/// Extracts tables, columns and representative sample values from the
/// target database. Sensitive columns named in the exclusion list never
/// reach the summary (and therefore never reach a prompt).
#[derive(Clone, Debug)]
pub struct SchemaIntrospector {
    sample_rows: usize,
    excluded: HashSet<String>,
}

impl SchemaIntrospector {
    pub fn new(sample_rows: usize, excluded_columns: &[String]) -> Self {
        Self {
            sample_rows,
            excluded: excluded_columns
                .iter()
                .map(|c| c.to_ascii_lowercase())
                .collect(),
        }
    }

    pub async fn extract(&self, pool: &SqlitePool) -> Result<SchemaSummary, AgentError> {
        let table_rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await
        .map_err(|err| AgentError::Introspection(err.to_string()))?;

        let mut tables = Vec::with_capacity(table_rows.len());
        for table_row in table_rows {
            let table_name: String = table_row
                .try_get("name")
                .map_err(|err| AgentError::Introspection(err.to_string()))?;
            tables.push(self.describe_table(pool, &table_name).await?);
        }

        Ok(SchemaSummary { tables })
    }

    async fn describe_table(
        &self,
        pool: &SqlitePool,
        table_name: &str,
    ) -> Result<TableSummary, AgentError> {
        let quoted = quote_identifier(table_name);

        let column_rows = sqlx::query(&format!("PRAGMA table_info({quoted})"))
            .fetch_all(pool)
            .await
            .map_err(|err| AgentError::Introspection(err.to_string()))?;

        let sample_rows = sqlx::query(&format!(
            "SELECT * FROM {quoted} LIMIT {}",
            self.sample_rows
        ))
        .fetch_all(pool)
        .await
        .map_err(|err| AgentError::Introspection(err.to_string()))?;

        let mut columns = Vec::new();
        for column_row in column_rows {
            let name: String = column_row
                .try_get("name")
                .map_err(|err| AgentError::Introspection(err.to_string()))?;
            let data_type: String = column_row
                .try_get("type")
                .map_err(|err| AgentError::Introspection(err.to_string()))?;

            let key = format!(
                "{}.{}",
                table_name.to_ascii_lowercase(),
                name.to_ascii_lowercase()
            );
            if self.excluded.contains(&key) {
                continue;
            }

            let samples = collect_samples(&sample_rows, &name, &data_type);
            columns.push(ColumnSummary {
                name,
                data_type,
                samples,
            });
        }

        Ok(TableSummary {
            name: table_name.to_string(),
            columns,
        })
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn collect_samples(rows: &[sqlx::sqlite::SqliteRow], column: &str, declared: &str) -> Vec<Value> {
    let mut samples = Vec::new();
    for row in rows {
        let Some(index) = row.columns().iter().position(|c| c.name() == column) else {
            continue;
        };
        if let Some(value) = coerce_sample(declared, decode_column(row, index)) {
            samples.push(value);
        }
    }
    samples
}

/// Coerces a sampled value to match the column's declared type, mirroring
/// the storage-class affinity rules loosely: integers stay integral, reals
/// stay floating, everything else renders as text. Nulls are dropped.
fn coerce_sample(declared: &str, value: Value) -> Option<Value> {
    if value.is_null() {
        return None;
    }
    let ty = declared.to_ascii_lowercase();
    if ty.contains("int") {
        value.as_i64().map(Value::from)
    } else if ty.contains("real") || ty.contains("floa") || ty.contains("doub") {
        value.as_f64().map(|v| serde_json::json!(v))
    } else {
        Some(match value {
            Value::String(text) => Value::String(text),
            other => Value::String(other.to_string()),
        })
    }
}
