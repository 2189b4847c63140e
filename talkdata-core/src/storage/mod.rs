//! Explicit storage handle shared by the pipeline components.
//!
//! A [`Storage`] is acquired once at process start and handed to the
//! schema catalog, executor, recipient directory and audit recorder. There
//! is no process-wide database handle. Cloning is cheap: clones share the
//! same pool.
//!
//! # Module Structure
//! - `config`: pool and timeout settings
//! - `connection`: connection string validation and pool creation

mod config;
pub mod connection;

pub use config::ConnectionConfig;
pub use connection::{is_in_memory, validate_sqlite_connection_string};

use crate::Result;
use crate::error::{TalkDataError, redact_database_url};
use sqlx::SqlitePool;

/// Shared handle to the backing SQLite database.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
    config: ConnectionConfig,
    in_memory: bool,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("config", &self.config)
            .field("in_memory", &self.in_memory)
            // Note: connection string is intentionally omitted
            .finish_non_exhaustive()
    }
}

impl Storage {
    /// Opens a pool for `connection_string`.
    ///
    /// # Errors
    /// Returns error if:
    /// - The configuration is invalid
    /// - The connection string format is invalid
    /// - The database cannot be opened
    pub async fn connect(connection_string: &str, config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        validate_sqlite_connection_string(connection_string)?;

        if config.create_if_missing && !is_in_memory(connection_string) {
            ensure_parent_dir(connection_string)?;
        }

        tracing::info!(
            "Opening database {}",
            redact_database_url(connection_string)
        );
        let pool = connection::create_pool(connection_string, &config).await?;

        Ok(Self {
            pool,
            config,
            in_memory: is_in_memory(connection_string),
        })
    }

    /// Opens a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(":memory:", ConnectionConfig::default()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    /// Verifies connectivity and that the schema tables are readable.
    pub async fn test_connection(&self) -> Result<()> {
        let connectivity_result: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(TalkDataError::connection_failed)?;

        if connectivity_result != 1 {
            return Err(TalkDataError::configuration(
                "Basic connectivity test failed: unexpected result",
            ));
        }

        let _: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TalkDataError::storage_unavailable("Cannot read sqlite_master", e))?;

        Ok(())
    }

    /// Checks if the connection is healthy.
    pub async fn is_healthy(&self) -> bool {
        match sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
        {
            Ok(result) => result == 1,
            Err(_) => false,
        }
    }

    /// Closes the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Creates the directory holding a file database, if needed.
fn ensure_parent_dir(connection_string: &str) -> Result<()> {
    let path = connection_string
        .strip_prefix("sqlite://")
        .unwrap_or(connection_string);
    let path = path.split('?').next().unwrap_or(path);

    if let Some(parent) = std::path::Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| TalkDataError::Io {
            context: format!("Failed to create database directory {}", parent.display()),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_storage_is_healthy() {
        let storage = Storage::in_memory().await.unwrap();
        assert!(storage.is_in_memory());
        assert!(storage.is_healthy().await);
        assert!(storage.test_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_storage_keeps_state_across_queries() {
        let storage = Storage::in_memory().await.unwrap();
        sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .execute(storage.pool())
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 't'",
        )
        .fetch_one(storage.pool())
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_file_storage_created_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("banking.db");
        let connection_string = format!("sqlite://{}", path.display());

        let storage = Storage::connect(
            &connection_string,
            ConnectionConfig::default().with_create_if_missing(true),
        )
        .await
        .unwrap();

        assert!(!storage.is_in_memory());
        assert!(path.exists());
        storage.close().await;
    }

    #[tokio::test]
    async fn test_missing_file_rejected_without_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");

        let result = Storage::connect(
            path.to_str().unwrap(),
            ConnectionConfig::default().with_create_if_missing(false),
        )
        .await;

        assert!(matches!(result, Err(e) if e.is_storage_failure()));
    }

    #[tokio::test]
    async fn test_invalid_connection_string_rejected() {
        let result = Storage::connect("postgres://localhost/db", ConnectionConfig::default()).await;
        assert!(matches!(
            result,
            Err(TalkDataError::Configuration { .. })
        ));
    }
}
