//! Best-effort audit trail of accepted questions.
//!
//! Write failures are logged at `warn` and dropped; they never reach the
//! caller and never fail a request.

use crate::models::{AuditEntry, StatementKind};
use crate::storage::Storage;

/// Appends rows to `audit_logs`.
#[derive(Debug, Clone)]
pub struct AuditRecorder {
    storage: Storage,
    enabled: bool,
}

impl AuditRecorder {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            enabled: true,
        }
    }

    /// A recorder that writes nothing.
    pub fn disabled(storage: Storage) -> Self {
        Self {
            storage,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records `question` on a detached task and returns immediately.
    pub fn record(&self, question: &str, kind: StatementKind) {
        if !self.enabled {
            return;
        }
        let recorder = self.clone();
        let entry = AuditEntry::for_question(question, kind);
        tokio::spawn(async move {
            recorder.write(&entry).await;
        });
    }

    /// Records `question` and waits for the write. Still fail-soft.
    pub async fn record_now(&self, question: &str, kind: StatementKind) {
        if !self.enabled {
            return;
        }
        self.write(&AuditEntry::for_question(question, kind)).await;
    }

    async fn write(&self, entry: &AuditEntry) {
        let result = sqlx::query("INSERT INTO audit_logs (event, table_name, row_id) VALUES (?, ?, ?)")
            .bind(&entry.event)
            .bind(&entry.table_name)
            .bind(entry.row_id)
            .execute(self.storage.pool())
            .await;

        match result {
            Ok(_) => tracing::trace!("Audit entry written ({})", entry.table_name),
            Err(e) => tracing::warn!("Audit write failed, ignoring: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const AUDIT_DDL: &str = "CREATE TABLE audit_logs (\
        log_id INTEGER PRIMARY KEY AUTOINCREMENT, event TEXT, table_name TEXT, \
        row_id INTEGER, timestamp DATETIME DEFAULT CURRENT_TIMESTAMP)";

    async fn audit_rows(storage: &Storage) -> Vec<(String, String)> {
        sqlx::query_as("SELECT event, table_name FROM audit_logs ORDER BY log_id")
            .fetch_all(storage.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_now_writes_kind_specific_rows() {
        let storage = Storage::in_memory().await.unwrap();
        sqlx::query(AUDIT_DDL).execute(storage.pool()).await.unwrap();
        let recorder = AuditRecorder::new(storage.clone());

        recorder
            .record_now("show all transactions", StatementKind::ReadOnly)
            .await;
        recorder
            .record_now("delete old cards", StatementKind::Mutating)
            .await;

        assert_eq!(
            audit_rows(&storage).await,
            vec![
                ("show all transactions".to_string(), "queries".to_string()),
                ("delete old cards".to_string(), "mutations".to_string()),
            ]
        );

        let (row_id, timestamp): (Option<i64>, Option<String>) =
            sqlx::query_as("SELECT row_id, timestamp FROM audit_logs LIMIT 1")
                .fetch_one(storage.pool())
                .await
                .unwrap();
        assert_eq!(row_id, None);
        assert!(timestamp.is_some());
    }

    #[tokio::test]
    async fn test_detached_record_eventually_lands() {
        let storage = Storage::in_memory().await.unwrap();
        sqlx::query(AUDIT_DDL).execute(storage.pool()).await.unwrap();
        let recorder = AuditRecorder::new(storage.clone());

        recorder.record("show all transactions", StatementKind::ReadOnly);

        let mut written = Vec::new();
        for _ in 0..50 {
            written = audit_rows(&storage).await;
            if !written.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(written.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_audit_table_is_swallowed() {
        let storage = Storage::in_memory().await.unwrap();
        let recorder = AuditRecorder::new(storage);
        // Must not panic or propagate
        recorder
            .record_now("show all transactions", StatementKind::ReadOnly)
            .await;
        recorder.record("show all transactions", StatementKind::ReadOnly);
    }

    #[tokio::test]
    async fn test_disabled_recorder_writes_nothing() {
        let storage = Storage::in_memory().await.unwrap();
        sqlx::query(AUDIT_DDL).execute(storage.pool()).await.unwrap();
        let recorder = AuditRecorder::disabled(storage.clone());
        assert!(!recorder.is_enabled());

        recorder
            .record_now("show all transactions", StatementKind::ReadOnly)
            .await;
        assert!(audit_rows(&storage).await.is_empty());
    }
}
