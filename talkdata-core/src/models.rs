//! Request-scoped data carried between pipeline stages.
//!
//! Everything here is created and discarded within a single question's
//! handling, except [`AuditEntry`] which is persisted by the audit recorder.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single result row, keyed by column name in statement column order.
pub type Row = Map<String, Value>;

/// Reason reported when no translator handler matches.
pub const UNTRANSLATABLE_REASON: &str = "needs further translation capability";

/// Suggestion attached to a translator miss.
pub const SCHEMA_DISCOVERY_SUGGESTION: &str =
    "Use /schema to fetch table and column names, then rephrase the question.";

/// A positional value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Outcome of translating a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranslationResult {
    /// A candidate statement with a short justification
    Translated {
        sql: String,
        reason: String,
        params: Vec<SqlParam>,
        handler: String,
    },
    /// No handler could produce a statement
    Untranslatable {
        reason: String,
        suggestion: Option<String>,
    },
}

impl TranslationResult {
    /// Builds a `Translated` result.
    pub fn translated(
        handler: impl Into<String>,
        sql: impl Into<String>,
        reason: impl Into<String>,
        params: Vec<SqlParam>,
    ) -> Self {
        Self::Translated {
            sql: sql.into(),
            reason: reason.into(),
            params,
            handler: handler.into(),
        }
    }

    /// The miss returned when the handler chain is exhausted.
    pub fn no_match() -> Self {
        Self::Untranslatable {
            reason: UNTRANSLATABLE_REASON.to_string(),
            suggestion: Some(SCHEMA_DISCOVERY_SUGGESTION.to_string()),
        }
    }

    pub fn is_translated(&self) -> bool {
        matches!(self, Self::Translated { .. })
    }

    /// Generated SQL, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Translated { sql, .. } => Some(sql),
            Self::Untranslatable { .. } => None,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Translated { reason, .. } | Self::Untranslatable { reason, .. } => reason,
        }
    }
}

/// Whether a statement can alter stored data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    ReadOnly,
    Mutating,
}

impl StatementKind {
    /// `table_name` written to the audit log for this kind of statement.
    pub fn audit_table(self) -> &'static str {
        match self {
            Self::ReadOnly => "queries",
            Self::Mutating => "mutations",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatementKind::ReadOnly => write!(f, "read-only"),
            StatementKind::Mutating => write!(f, "mutating"),
        }
    }
}

/// Storage-reported metadata for a mutating statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationInfo {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

/// Outcome of executing a validated statement. Exactly one shape applies.
///
/// Serializes as `{"rows": [...]}`, `{"info": {...}}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionResult {
    #[serde(rename = "rows")]
    Rows(Vec<Row>),
    #[serde(rename = "info")]
    Mutation(MutationInfo),
    #[serde(rename = "error")]
    ExecutionError(String),
}

impl ExecutionResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ExecutionError(_))
    }

    /// Result rows, when the statement produced any.
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            Self::Rows(rows) => Some(rows),
            _ => None,
        }
    }
}

/// Outward-facing payload for one question.
///
/// Either `error` is set (translation or validation failure) or both `sql`
/// and `result` are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<SqlParam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// One append-only audit row. `timestamp` is filled in by the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Original question text
    pub event: String,
    pub table_name: String,
    pub row_id: Option<i64>,
}

impl AuditEntry {
    pub fn for_question(question: impl Into<String>, kind: StatementKind) -> Self {
        Self {
            event: question.into(),
            table_name: kind.audit_table().to_string(),
            row_id: None,
        }
    }
}
