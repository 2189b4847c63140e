//! Recipient lookup for aggregation handlers.
//!
//! Names extracted from a question are resolved to ids through a separate,
//! parameterized query before any SQL is generated. The emitted statement
//! then binds the id; the name never reaches generated SQL.

use crate::Result;
use crate::error::TalkDataError;
use crate::storage::Storage;
use async_trait::async_trait;
use sqlx::Row;

/// Upper bound on candidates fetched for one name fragment.
const MAX_CANDIDATES: i64 = 10;

/// A transfer recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub id: i64,
    pub name: String,
}

/// Resolves free-text names to recipients.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Recipients whose name contains `fragment`, case-insensitively.
    ///
    /// # Errors
    /// Returns error if the directory cannot be read
    async fn find_matches(&self, fragment: &str) -> Result<Vec<Recipient>>;
}

/// Directory backed by the `beneficiaries` table.
#[derive(Debug, Clone)]
pub struct SqliteRecipientDirectory {
    storage: Storage,
}

impl SqliteRecipientDirectory {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RecipientDirectory for SqliteRecipientDirectory {
    async fn find_matches(&self, fragment: &str) -> Result<Vec<Recipient>> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Ok(Vec::new());
        }

        // instr() instead of LIKE so '%' and '_' in the name stay literal
        let rows = sqlx::query(
            "SELECT beneficiary_id, name FROM beneficiaries \
             WHERE instr(lower(name), lower(?)) > 0 \
             ORDER BY beneficiary_id LIMIT ?",
        )
        .bind(fragment)
        .bind(MAX_CANDIDATES)
        .fetch_all(self.storage.pool())
        .await
        .map_err(|e| TalkDataError::storage_unavailable("Failed to look up recipients", e))?;

        rows.iter()
            .map(|row| {
                Ok(Recipient {
                    id: row.try_get("beneficiary_id").map_err(|e| {
                        TalkDataError::storage_unavailable("Failed to read beneficiary_id", e)
                    })?,
                    name: row.try_get::<Option<String>, _>("name")
                        .map_err(|e| TalkDataError::storage_unavailable("Failed to read name", e))?
                        .unwrap_or_default(),
                })
            })
            .collect()
    }
}
