//! SQL execution dispatcher.
//!
//! Classifies a statement by its leading keyword and runs it:
//! - reads are fetched in full and returned as a query envelope
//! - writes run inside an explicit transaction that commits on success and rolls back
//!   on failure before the error is returned
//!
//! Classification is a keyword heuristic, not a parser. `EXPLAIN`, `SHOW`, multi-statement
//! scripts and data-modifying CTEs are knowingly misclassified.

use crate::error::BurrowError;
use crate::models::{ResultEnvelope, StatementKind, Value};
use crate::services::connection::SqlClient;

/// Message of the envelope returned for blank input.
pub const EMPTY_SQL_MESSAGE: &str = "empty SQL";

/// Classify a statement by its first keyword.
pub fn classify(sql: &str) -> StatementKind {
    let normalized = sql.trim().to_lowercase();
    if normalized.is_empty() {
        StatementKind::Empty
    } else if normalized.starts_with("select") || normalized.starts_with("with") {
        StatementKind::Read
    } else {
        StatementKind::Write
    }
}

/// Run one statement and wrap the outcome in an envelope.
pub async fn run(
    client: &dyn SqlClient,
    sql: &str,
    params: &[Value],
) -> Result<ResultEnvelope, BurrowError> {
    let kind = classify(sql);
    tracing::debug!(database = client.database(), ?kind, params = params.len(), "Dispatching statement");

    match kind {
        StatementKind::Empty => {
            Ok(ResultEnvelope::Command { affected: None, message: EMPTY_SQL_MESSAGE.to_string() })
        }
        StatementKind::Read => {
            let rs = client.query(sql, params).await?;
            let message = format!("{} row(s)", rs.len());
            Ok(ResultEnvelope::Query { columns: rs.columns, rows: rs.rows, message })
        }
        StatementKind::Write => {
            let affected = run_write(client, sql, params).await?;
            Ok(ResultEnvelope::Command {
                affected: Some(affected),
                message: format!("OK, rows affected: {affected}"),
            })
        }
    }
}

async fn run_write(client: &dyn SqlClient, sql: &str, params: &[Value]) -> Result<u64, BurrowError> {
    client.begin().await.map_err(BurrowError::into_execution)?;

    let outcome = match client.execute(sql, params).await {
        Ok(affected) => client.commit().await.map(|_| affected),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(affected) => Ok(affected),
        Err(e) => {
            if let Err(rollback_err) = client.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback failed");
            }
            tracing::warn!(error = %e, "Statement rolled back");
            Err(e.into_execution())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{result_set, MockClient};

    #[test]
    fn test_classify() {
        assert_eq!(classify("  SELECT 1"), StatementKind::Read);
        assert_eq!(classify("WITH x AS (SELECT 1) SELECT * FROM x"), StatementKind::Read);
        assert_eq!(classify("UPDATE t SET a=1"), StatementKind::Write);
        assert_eq!(classify(" \n\t"), StatementKind::Empty);
        assert_eq!(classify("explain select 1"), StatementKind::Write);
    }

    #[tokio::test]
    async fn test_blank_input_issues_nothing() {
        let client = MockClient::new("shop");
        let env = run(&client, "   ", &[]).await.unwrap();
        assert_eq!(env, ResultEnvelope::Command { affected: None, message: "empty SQL".into() });
        assert!(client.statements().is_empty());
    }

    #[tokio::test]
    async fn test_read_reports_row_count() {
        let client = MockClient::new("shop").with_result(
            "SELECT id FROM t",
            result_set(&["id"], &[&[Some("1")], &[Some("2")]]),
        );
        let env = run(&client, "SELECT id FROM t", &[]).await.unwrap();
        assert_eq!(env.message(), "2 row(s)");
        assert_eq!(env.row_count(), 2);
        assert_eq!(client.statements(), vec!["SELECT id FROM t"]);
    }

    #[tokio::test]
    async fn test_write_commits() {
        let client = MockClient::new("shop").with_affected(3);
        let env = run(&client, "UPDATE t SET a = 1", &[]).await.unwrap();
        assert_eq!(env.message(), "OK, rows affected: 3");
        assert_eq!(client.statements(), vec!["BEGIN", "UPDATE t SET a = 1", "COMMIT"]);
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let client = MockClient::new("shop").with_failure("COMMIT", "restart transaction", Some("40001"));
        let err = run(&client, "DELETE FROM t", &[]).await.unwrap_err();
        assert_eq!(err.label(), "ExecutionError");
        assert_eq!(client.statements(), vec!["BEGIN", "DELETE FROM t", "COMMIT", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn test_read_error_is_not_retagged() {
        let client = MockClient::new("shop").with_failure("SELECT nope", "column \"nope\" does not exist", Some("42703"));
        let err = run(&client, "SELECT nope", &[]).await.unwrap_err();
        assert!(matches!(err, BurrowError::Query { .. }));
    }
}
