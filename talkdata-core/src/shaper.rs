//! Turns translation and execution outcomes into a [`QueryResponse`].

use crate::guard::Rejection;
use crate::models::{ExecutionResult, QueryResponse, TranslationResult};

/// Builds outward-facing responses. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseShaper;

impl ResponseShaper {
    pub fn new() -> Self {
        Self
    }

    /// Shapes a response for `query`.
    ///
    /// A translator miss yields `error` and `suggestion` only. A translated
    /// statement without an execution result keeps the attempted `sql` and
    /// `reason` and leaves `result` absent.
    pub fn shape(
        &self,
        query: &str,
        translation: &TranslationResult,
        execution: Option<ExecutionResult>,
    ) -> QueryResponse {
        match translation {
            TranslationResult::Untranslatable { reason, suggestion } => QueryResponse {
                error: Some(reason.clone()),
                suggestion: suggestion.clone(),
                ..Default::default()
            },
            TranslationResult::Translated {
                sql, reason, params, ..
            } => QueryResponse {
                query: Some(query.to_string()),
                sql: Some(sql.clone()),
                params: params.clone(),
                reason: Some(reason.clone()),
                summary: execution.as_ref().map(summarize),
                result: execution,
                ..Default::default()
            },
        }
    }

    /// Shapes a response for a statement the guard refused.
    pub fn shape_rejection(
        &self,
        query: &str,
        translation: &TranslationResult,
        rejection: &Rejection,
    ) -> QueryResponse {
        let mut response = self.shape(query, translation, None);
        response.error = Some(format!("Statement rejected: {}", rejection));
        response
    }
}

/// One-line description of an execution result.
pub fn summarize(result: &ExecutionResult) -> String {
    match result {
        ExecutionResult::Rows(rows) if rows.is_empty() => "no results".to_string(),
        ExecutionResult::Rows(rows) => format!("found {} result(s)", rows.len()),
        ExecutionResult::Mutation(_) => "operation successful".to_string(),
        ExecutionResult::ExecutionError(message) => format!("query failed: {}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MutationInfo, Row, SqlParam};
    use serde_json::json;

    fn translated() -> TranslationResult {
        TranslationResult::translated(
            "bulk_listing",
            "SELECT * FROM transactions ORDER BY date DESC LIMIT 200",
            "list all transactions",
            vec![],
        )
    }

    fn row(amount: i64) -> Row {
        let mut row = Row::new();
        row.insert("amount".to_string(), json!(amount));
        row
    }

    #[test]
    fn test_translator_miss_has_no_sql() {
        let response =
            ResponseShaper::new().shape("asdkj random gibberish", &TranslationResult::no_match(), None);
        assert!(response.error.is_some());
        assert!(response.suggestion.is_some());
        assert!(response.sql.is_none());
        assert!(response.result.is_none());
    }

    #[test]
    fn test_summaries() {
        let shaper = ResponseShaper::new();

        let empty = shaper.shape("q", &translated(), Some(ExecutionResult::Rows(vec![])));
        assert_eq!(empty.summary.as_deref(), Some("no results"));

        let found = shaper.shape(
            "q",
            &translated(),
            Some(ExecutionResult::Rows(vec![row(1), row(2), row(3)])),
        );
        assert_eq!(found.summary.as_deref(), Some("found 3 result(s)"));
        assert_eq!(found.result.unwrap().rows().unwrap().len(), 3);

        let mutation = shaper.shape(
            "q",
            &translated(),
            Some(ExecutionResult::Mutation(MutationInfo {
                rows_affected: 1,
                last_insert_id: 9,
            })),
        );
        assert_eq!(mutation.summary.as_deref(), Some("operation successful"));
    }

    #[test]
    fn test_execution_error_keeps_sql_and_reason() {
        let response = ResponseShaper::new().shape(
            "q",
            &translated(),
            Some(ExecutionResult::ExecutionError("no such table: transactions".to_string())),
        );
        assert!(response.sql.is_some());
        assert_eq!(response.reason.as_deref(), Some("list all transactions"));
        assert!(response.error.is_none());

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["result"], json!({ "error": "no such table: transactions" }));
    }

    #[test]
    fn test_rejection_keeps_attempted_sql() {
        let translation = TranslationResult::translated(
            "completion",
            "SELECT 1; DROP TABLE x",
            "model output",
            vec![SqlParam::from("now")],
        );
        let response = ResponseShaper::new().shape_rejection(
            "q",
            &translation,
            &Rejection::MultipleStatements,
        );
        assert_eq!(
            response.error.as_deref(),
            Some("Statement rejected: Multiple statements are not allowed")
        );
        assert_eq!(response.sql.as_deref(), Some("SELECT 1; DROP TABLE x"));
        assert!(response.result.is_none());
        assert!(response.summary.is_none());
    }
}
