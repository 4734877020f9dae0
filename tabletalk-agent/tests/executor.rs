use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tabletalk_agent::{AgentError, QueryExecutor};

async fn seeded_pool(rows: usize) -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT, price REAL, notes TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();
    for n in 1..=rows {
        sqlx::query("INSERT INTO items (id, label, price, notes) VALUES (?1, ?2, ?3, NULL)")
            .bind(n as i64)
            .bind(format!("item-{n}"))
            .bind(n as f64 * 1.5)
            .execute(&pool)
            .await
            .unwrap();
    }
    pool
}

#[tokio::test]
async fn returns_all_rows_under_the_cap() {
    let pool = seeded_pool(4).await;
    let executor = QueryExecutor::new(10, Duration::from_secs(5));

    let result = executor
        .run(&pool, "SELECT id, label FROM items ORDER BY id")
        .await
        .unwrap();

    assert_eq!(result.row_count, 4);
    assert!(!result.truncated);
    assert_eq!(result.columns, vec!["id".to_string(), "label".to_string()]);
    assert_eq!(result.rows[0]["label"], "item-1");
}

#[tokio::test]
async fn caps_rows_and_flags_truncation() {
    let pool = seeded_pool(10).await;
    let executor = QueryExecutor::new(3, Duration::from_secs(5));

    let result = executor
        .run(&pool, "SELECT id FROM items ORDER BY id")
        .await
        .unwrap();

    assert_eq!(result.row_count, 3);
    assert!(result.truncated);
}

#[tokio::test]
async fn exact_cap_is_not_truncated() {
    let pool = seeded_pool(3).await;
    let executor = QueryExecutor::new(3, Duration::from_secs(5));

    let result = executor
        .run(&pool, "SELECT id FROM items")
        .await
        .unwrap();

    assert_eq!(result.row_count, 3);
    assert!(!result.truncated);
}

#[tokio::test]
async fn cap_applies_over_statement_limit() {
    let pool = seeded_pool(10).await;
    let executor = QueryExecutor::new(2, Duration::from_secs(5));

    let result = executor
        .run(&pool, "SELECT id FROM items LIMIT 8")
        .await
        .unwrap();

    assert_eq!(result.row_count, 2);
    assert!(result.truncated);
}

#[tokio::test]
async fn decodes_types_and_nulls() {
    let pool = seeded_pool(1).await;
    let executor = QueryExecutor::new(10, Duration::from_secs(5));

    let result = executor
        .run(&pool, "SELECT id, label, price, notes FROM items")
        .await
        .unwrap();

    let row = &result.rows[0];
    assert_eq!(row["id"], serde_json::json!(1));
    assert_eq!(row["label"], serde_json::json!("item-1"));
    assert_eq!(row["price"], serde_json::json!(1.5));
    assert!(row["notes"].is_null());
}

#[tokio::test]
async fn database_rejection_is_an_execution_error() {
    let pool = seeded_pool(1).await;
    let executor = QueryExecutor::new(10, Duration::from_secs(5));

    let error = executor
        .run(&pool, "SELECT nope FROM missing_table")
        .await
        .unwrap_err();
    assert!(matches!(error, AgentError::Execution(_)));
}

#[tokio::test]
async fn truncated_result_discloses_the_cut_in_prompt_block() {
    let pool = seeded_pool(5).await;
    let executor = QueryExecutor::new(2, Duration::from_secs(5));

    let result = executor.run(&pool, "SELECT id FROM items").await.unwrap();
    let block = result.to_prompt_block();
    assert!(block.contains("truncated"));
    assert!(block.contains("first 2"));
}
