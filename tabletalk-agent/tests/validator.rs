use serde_json::json;
use tabletalk_agent::{
    ColumnSummary, SchemaSummary, SqlCandidate, SqlValidator, TableSummary, ValidationStatus,
};

fn chinook_like_schema() -> SchemaSummary {
    SchemaSummary {
        tables: vec![
            TableSummary {
                name: "customers".to_string(),
                columns: vec![
                    ColumnSummary {
                        name: "customer_id".to_string(),
                        data_type: "INTEGER".to_string(),
                        samples: vec![json!(1), json!(2)],
                    },
                    ColumnSummary {
                        name: "name".to_string(),
                        data_type: "TEXT".to_string(),
                        samples: vec![json!("Ana")],
                    },
                    ColumnSummary {
                        name: "country".to_string(),
                        data_type: "TEXT".to_string(),
                        samples: vec![json!("Brazil")],
                    },
                ],
            },
            TableSummary {
                name: "invoices".to_string(),
                columns: vec![
                    ColumnSummary {
                        name: "invoice_id".to_string(),
                        data_type: "INTEGER".to_string(),
                        samples: vec![],
                    },
                    ColumnSummary {
                        name: "customer_id".to_string(),
                        data_type: "INTEGER".to_string(),
                        samples: vec![],
                    },
                    ColumnSummary {
                        name: "total".to_string(),
                        data_type: "REAL".to_string(),
                        samples: vec![],
                    },
                ],
            },
        ],
    }
}

fn validate(sql: &str) -> ValidationStatus {
    let validator = SqlValidator::new();
    validator
        .validate(&SqlCandidate::unchecked(sql), &chinook_like_schema())
        .status
}

fn assert_policy_violation(sql: &str) {
    match validate(sql) {
        ValidationStatus::Invalid {
            policy_violation, ..
        } => assert!(policy_violation, "expected policy violation for: {sql}"),
        other => panic!("expected invalid status for {sql:?}, got {other:?}"),
    }
}

fn assert_repairable(sql: &str) {
    match validate(sql) {
        ValidationStatus::Invalid {
            policy_violation, ..
        } => assert!(
            !policy_violation,
            "expected repairable invalidity for: {sql}"
        ),
        other => panic!("expected invalid status for {sql:?}, got {other:?}"),
    }
}

#[test]
fn accepts_simple_select() {
    assert_eq!(
        validate("SELECT name, country FROM customers WHERE country = 'Brazil'"),
        ValidationStatus::Valid
    );
}

#[test]
fn accepts_join_with_aliases() {
    assert_eq!(
        validate(
            "SELECT c.name, i.total FROM customers AS c \
             JOIN invoices AS i ON i.customer_id = c.customer_id \
             ORDER BY i.total DESC LIMIT 5"
        ),
        ValidationStatus::Valid
    );
}

#[test]
fn accepts_cte_queries() {
    assert_eq!(
        validate(
            "WITH brazil AS (SELECT customer_id FROM customers WHERE country = 'Brazil') \
             SELECT invoice_id FROM invoices \
             WHERE customer_id IN (SELECT customer_id FROM brazil)"
        ),
        ValidationStatus::Valid
    );
}

#[test]
fn rejects_write_statements_in_any_casing() {
    for sql in [
        "DELETE FROM customers",
        "delete from customers",
        "  DeLeTe   FROM customers WHERE customer_id = 1",
        "INSERT INTO customers (name) VALUES ('x')",
        "update customers set name = 'x'",
        "DROP TABLE customers",
        "alter table customers add column x text",
        "CREATE TABLE t (x INTEGER)",
        "PRAGMA table_info(customers)",
    ] {
        assert_policy_violation(sql);
    }
}

#[test]
fn rejects_write_keyword_smuggled_after_select() {
    // A compound attempt still trips the policy scan.
    assert_policy_violation("SELECT name FROM customers; DROP TABLE customers");
}

#[test]
fn write_keyword_inside_string_literal_is_fine() {
    assert_eq!(
        validate("SELECT name FROM customers WHERE name = 'DROP TABLE'"),
        ValidationStatus::Valid
    );
}

#[test]
fn replace_as_a_scalar_function_is_a_read() {
    assert_eq!(
        validate("SELECT REPLACE(name, 'a', 'b') FROM customers"),
        ValidationStatus::Valid
    );
    assert_eq!(
        validate("SELECT replace(country, 'Bra', 'Bra-') FROM customers WHERE country = 'Brazil'"),
        ValidationStatus::Valid
    );
}

#[test]
fn replace_as_a_statement_is_still_rejected() {
    assert_policy_violation("REPLACE INTO customers (name) VALUES ('x')");
}

#[test]
fn accepts_derived_table_aliases() {
    assert_eq!(
        validate("SELECT sub.n FROM (SELECT COUNT(*) AS n FROM customers) sub"),
        ValidationStatus::Valid
    );
    assert_eq!(
        validate("SELECT sub.n FROM (SELECT COUNT(*) AS n FROM customers) AS sub"),
        ValidationStatus::Valid
    );
}

#[test]
fn accepts_joined_derived_tables() {
    assert_eq!(
        validate(
            "SELECT c.name, t.spent FROM customers AS c \
             JOIN (SELECT customer_id, SUM(total) AS spent FROM invoices \
             GROUP BY customer_id) t ON t.customer_id = c.customer_id"
        ),
        ValidationStatus::Valid
    );
}

#[test]
fn rejects_unknown_table() {
    assert_repairable("SELECT name FROM clients");
}

#[test]
fn rejects_unknown_qualified_column() {
    assert_repairable("SELECT c.full_name FROM customers AS c");
}

#[test]
fn rejects_unknown_bare_column() {
    assert_repairable("SELECT full_name FROM customers");
}

#[test]
fn rejects_unknown_alias() {
    assert_repairable("SELECT x.name FROM customers AS c");
}

#[test]
fn rejects_multiple_statements() {
    assert_repairable("SELECT name FROM customers; SELECT country FROM customers");
}

#[test]
fn rejects_unbalanced_parentheses() {
    assert_repairable("SELECT name FROM customers WHERE customer_id IN (1, 2");
}

#[test]
fn rejects_unterminated_string() {
    assert_repairable("SELECT name FROM customers WHERE name = 'Ana");
}

#[test]
fn rejects_empty_statement() {
    assert_repairable("   ");
}

#[test]
fn rejects_non_select_non_write() {
    assert_repairable("EXPLAIN QUERY PLAN SELECT name FROM customers");
}

#[test]
fn aggregate_functions_are_not_columns() {
    assert_eq!(
        validate(
            "SELECT country, COUNT(customer_id) AS headcount FROM customers \
             GROUP BY country ORDER BY headcount DESC"
        ),
        ValidationStatus::Valid
    );
}
