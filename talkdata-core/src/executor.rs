//! Executes validated statements and normalizes the outcome.
//!
//! The executor never returns an error: syntax errors, constraint
//! violations, missing tables, timeouts and pool failures all become
//! [`ExecutionResult::ExecutionError`].

use crate::guard::ValidatedStatement;
use crate::models::{ExecutionResult, MutationInfo, Row, SqlParam, StatementKind};
use crate::storage::Storage;
use serde_json::Value as JsonValue;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row as _, Sqlite};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Runs [`ValidatedStatement`]s against storage.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    storage: Storage,
}

impl QueryExecutor {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Executes `statement`.
    ///
    /// Read-only statements return their full result set in statement
    /// order. Mutating statements return the affected-row count and last
    /// inserted row id.
    pub async fn execute(&self, statement: &ValidatedStatement) -> ExecutionResult {
        let timeout = self.storage.config().query_timeout;
        tracing::debug!(
            "Executing {} statement: {}",
            statement.kind(),
            statement.sql()
        );
        let start_time = std::time::Instant::now();

        let outcome = tokio::time::timeout(timeout, self.run(statement)).await;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ExecutionResult::ExecutionError(error_message(&e)),
            Err(_) => ExecutionResult::ExecutionError(format!(
                "Query timed out after {}s",
                timeout.as_secs()
            )),
        };

        match &result {
            ExecutionResult::ExecutionError(message) => {
                tracing::debug!("Statement failed: {}", message);
            }
            ExecutionResult::Rows(rows) => tracing::debug!(
                "Statement returned {} rows in {:.2}ms",
                rows.len(),
                start_time.elapsed().as_secs_f64() * 1000.0
            ),
            ExecutionResult::Mutation(info) => tracing::debug!(
                "Statement affected {} rows in {:.2}ms",
                info.rows_affected,
                start_time.elapsed().as_secs_f64() * 1000.0
            ),
        }

        result
    }

    async fn run(&self, statement: &ValidatedStatement) -> Result<ExecutionResult, sqlx::Error> {
        let query = bind_params(sqlx::query(statement.sql()), statement.params());

        match statement.kind() {
            StatementKind::ReadOnly => {
                let rows = query.fetch_all(self.storage.pool()).await?;
                Ok(ExecutionResult::Rows(rows.iter().map(row_to_json).collect()))
            }
            StatementKind::Mutating => {
                let done = query.execute(self.storage.pool()).await?;
                Ok(ExecutionResult::Mutation(MutationInfo {
                    rows_affected: done.rows_affected(),
                    last_insert_id: done.last_insert_rowid(),
                }))
            }
        }
    }
}

fn bind_params<'q>(mut query: SqliteQuery<'q>, params: &'q [SqlParam]) -> SqliteQuery<'q> {
    for param in params {
        query = match param {
            SqlParam::Integer(v) => query.bind(*v),
            SqlParam::Real(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.as_str()),
        };
    }
    query
}

/// Database errors report SQLite's own message; everything else uses the
/// error's display form.
fn error_message(error: &sqlx::Error) -> String {
    match error {
        sqlx::Error::Database(db) => db.message().to_string(),
        other => other.to_string(),
    }
}

fn row_to_json(row: &SqliteRow) -> Row {
    let mut map = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), extract_column_value(row, index));
    }
    map
}

/// Extract a column value as a JSON value.
fn extract_column_value(row: &SqliteRow, index: usize) -> JsonValue {
    // SQLite is dynamically typed, so we need to try multiple types
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v
            .map(|n| JsonValue::Number(n.into()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v
            .map(|bytes| {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                JsonValue::String(format!("base64:{}", encoded))
            })
            .unwrap_or(JsonValue::Null);
    }

    JsonValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{GuardPolicy, StatementGuard};
    use serde_json::json;

    async fn storage_with_payments() -> Storage {
        let storage = Storage::in_memory().await.unwrap();
        sqlx::query(
            "CREATE TABLE payments (id INTEGER PRIMARY KEY, payee TEXT, amount NUMERIC, memo BLOB)",
        )
        .execute(storage.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO payments (payee, amount, memo) VALUES \
             ('Rent Co', 950.00, NULL), ('Cafe', 4.5, x'6869')",
        )
        .execute(storage.pool())
        .await
        .unwrap();
        storage
    }

    fn validate(sql: &str, params: Vec<SqlParam>) -> ValidatedStatement {
        StatementGuard::new(GuardPolicy::permissive())
            .validate_with_params(sql, params)
            .unwrap()
    }

    #[tokio::test]
    async fn test_rows_keep_column_and_row_order() {
        let executor = QueryExecutor::new(storage_with_payments().await);
        let result = executor
            .execute(&validate(
                "SELECT payee, amount, id, memo FROM payments ORDER BY id",
                vec![],
            ))
            .await;

        let rows = result.rows().unwrap();
        assert_eq!(rows.len(), 2);
        let keys: Vec<&String> = rows[0].keys().collect();
        assert_eq!(keys, vec!["payee", "amount", "id", "memo"]);

        assert_eq!(rows[0]["payee"], json!("Rent Co"));
        assert_eq!(rows[0]["amount"].as_f64(), Some(950.0));
        assert_eq!(rows[0]["memo"], JsonValue::Null);
        assert_eq!(rows[1]["amount"], json!(4.5));
        assert_eq!(rows[1]["memo"], json!("base64:aGk="));
    }

    #[tokio::test]
    async fn test_params_are_bound() {
        let executor = QueryExecutor::new(storage_with_payments().await);
        let result = executor
            .execute(&validate(
                "SELECT payee FROM payments WHERE amount > ? AND payee <> ?",
                vec![SqlParam::Real(5.0), SqlParam::from("Cafe")],
            ))
            .await;
        assert_eq!(result.rows().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_statement_is_an_execution_error() {
        let executor = QueryExecutor::new(storage_with_payments().await);

        let result = executor.execute(&validate("SELEC nonsense", vec![])).await;
        assert!(matches!(result, ExecutionResult::ExecutionError(ref m) if !m.is_empty()));

        let result = executor
            .execute(&validate("SELECT * FROM missing_table", vec![]))
            .await;
        assert!(
            matches!(result, ExecutionResult::ExecutionError(ref m) if m.contains("no such table"))
        );
    }

    #[tokio::test]
    async fn test_mutation_reports_metadata() {
        let executor = QueryExecutor::new(storage_with_payments().await);
        let result = executor
            .execute(&validate(
                "INSERT INTO payments (payee, amount) VALUES (?, ?)",
                vec![SqlParam::from("Grocer"), SqlParam::Real(12.25)],
            ))
            .await;
        assert_eq!(
            result,
            ExecutionResult::Mutation(MutationInfo {
                rows_affected: 1,
                last_insert_id: 3
            })
        );
    }

    #[tokio::test]
    async fn test_closed_pool_is_an_execution_error() {
        let storage = storage_with_payments().await;
        let executor = QueryExecutor::new(storage.clone());
        storage.close().await;

        let result = executor
            .execute(&validate("SELECT * FROM payments", vec![]))
            .await;
        assert!(result.is_error());
    }
}
