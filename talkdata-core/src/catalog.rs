//! Live schema catalog: user tables and their column descriptors.
//!
//! The catalog grounds translation (handlers check that the tables and
//! columns they target exist) and backs the schema-discovery endpoint.
//!
//! # SQLite System Tables
//! - `sqlite_master`: table enumeration (internal `sqlite_%` tables skipped)
//! - `PRAGMA table_info()`: column name, declared type and primary-key flag

use crate::Result;
use crate::error::TalkDataError;
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One column of a table, as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    /// Not exposed through schema discovery
    #[serde(skip)]
    pub primary_key: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            primary_key: false,
        }
    }

    /// Marks the column as (part of) the primary key.
    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Whether the declared type stores a date or time.
    pub fn is_temporal(&self) -> bool {
        let upper = self.declared_type.to_uppercase();
        upper.contains("DATE") || upper.contains("TIME")
    }
}

/// Table name → ordered column descriptors.
///
/// Serializes as `{ "table": [{ "name": ..., "type": ... }, ...], ... }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, Vec<ColumnDescriptor>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used when assembling a catalog by hand.
    pub fn with_table(mut self, name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        self.insert_table(name, columns);
        self
    }

    pub fn insert_table(&mut self, name: impl Into<String>, columns: Vec<ColumnDescriptor>) {
        self.tables.insert(name.into(), columns);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[ColumnDescriptor])> {
        self.tables
            .iter()
            .map(|(name, columns)| (name.as_str(), columns.as_slice()))
    }

    /// Columns of `table`, matched case-insensitively.
    pub fn table(&self, table: &str) -> Option<&[ColumnDescriptor]> {
        if let Some(columns) = self.tables.get(table) {
            return Some(columns);
        }
        self.tables
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, columns)| columns.as_slice())
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.table(table).is_some()
    }

    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnDescriptor> {
        self.table(table)?
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
    }

    /// Whether `table` exists and has every column in `columns`.
    pub fn has_columns(&self, table: &str, columns: &[&str]) -> bool {
        columns.iter().all(|c| self.column(table, c).is_some())
    }

    /// Resolves a word from a question to a catalog table name.
    ///
    /// Accepts the exact name or a singular/plural variant
    /// ("transaction" → "transactions", "beneficiary" → "beneficiaries").
    pub fn find_table(&self, word: &str) -> Option<&str> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return None;
        }

        let mut candidates = vec![word.clone(), format!("{}s", word), format!("{}es", word)];
        if let Some(stem) = word.strip_suffix('y') {
            candidates.push(format!("{}ies", stem));
        }
        if let Some(stem) = word.strip_suffix("ies") {
            candidates.push(format!("{}y", stem));
        }
        if let Some(stem) = word.strip_suffix('s') {
            candidates.push(stem.to_string());
        }

        candidates.iter().find_map(|candidate| {
            self.tables
                .keys()
                .find(|name| name.eq_ignore_ascii_case(candidate))
                .map(String::as_str)
        })
    }
}

/// Loads the catalog from storage, optionally caching it.
///
/// Without caching every [`CatalogLoader::load`] reads the live schema. With
/// caching the first load is kept until [`CatalogLoader::invalidate`].
#[derive(Debug)]
pub struct CatalogLoader {
    storage: Storage,
    cache: Option<RwLock<Option<Arc<SchemaCatalog>>>>,
}

impl CatalogLoader {
    /// Loader that reads the live schema on every call.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            cache: None,
        }
    }

    /// Loader that keeps the first successful load until invalidated.
    pub fn cached(storage: Storage) -> Self {
        Self {
            storage,
            cache: Some(RwLock::new(None)),
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Returns the current catalog.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the database cannot be read.
    pub async fn load(&self) -> Result<Arc<SchemaCatalog>> {
        let Some(cache) = &self.cache else {
            return collect_catalog(&self.storage).await.map(Arc::new);
        };

        if let Some(catalog) = cache.read().await.as_ref() {
            return Ok(Arc::clone(catalog));
        }

        let mut slot = cache.write().await;
        if let Some(catalog) = slot.as_ref() {
            return Ok(Arc::clone(catalog));
        }
        let catalog = Arc::new(collect_catalog(&self.storage).await?);
        *slot = Some(Arc::clone(&catalog));
        Ok(catalog)
    }

    /// Drops any cached catalog so the next load reads the live schema.
    pub async fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            tracing::debug!("Invalidating cached schema catalog");
            *cache.write().await = None;
        }
    }
}

/// Reads every user table and its columns.
pub async fn collect_catalog(storage: &Storage) -> Result<SchemaCatalog> {
    let start_time = std::time::Instant::now();

    let tables_query = r#"
        SELECT name
        FROM sqlite_master
        WHERE type = 'table'
        AND name NOT LIKE 'sqlite_%'
        ORDER BY name
    "#;

    let table_rows = sqlx::query(tables_query)
        .fetch_all(storage.pool())
        .await
        .map_err(|e| TalkDataError::storage_unavailable("Failed to enumerate tables", e))?;

    let mut catalog = SchemaCatalog::new();

    for row in &table_rows {
        let table_name: String = row
            .try_get("name")
            .map_err(|e| TalkDataError::storage_unavailable("Failed to parse table name", e))?;

        let columns = collect_table_columns(storage, &table_name).await?;
        tracing::trace!(
            "Collected table '{}' with {} columns",
            table_name,
            columns.len()
        );
        catalog.insert_table(table_name, columns);
    }

    tracing::debug!(
        "Loaded schema catalog with {} tables in {:.2}ms",
        catalog.len(),
        start_time.elapsed().as_secs_f64() * 1000.0
    );

    Ok(catalog)
}

async fn collect_table_columns(
    storage: &Storage,
    table_name: &str,
) -> Result<Vec<ColumnDescriptor>> {
    // PRAGMA arguments cannot be bound; the name comes from sqlite_master
    let columns_query = format!("PRAGMA table_info('{}')", table_name.replace('\'', "''"));

    let column_rows = sqlx::query(&columns_query)
        .fetch_all(storage.pool())
        .await
        .map_err(|e| {
            TalkDataError::storage_unavailable(
                format!("Failed to collect columns for table '{}'", table_name),
                e,
            )
        })?;

    let mut columns: Vec<(i32, ColumnDescriptor)> = column_rows
        .iter()
        .map(|row| {
            let cid: i32 = row.try_get("cid").unwrap_or(0);
            let name: String = row.try_get("name").unwrap_or_default();
            let declared_type: String = row.try_get("type").unwrap_or_default();
            let pk: i32 = row.try_get("pk").unwrap_or(0);

            let mut column = ColumnDescriptor::new(name, declared_type);
            column.primary_key = pk > 0;
            (cid, column)
        })
        .collect();

    columns.sort_by_key(|(cid, _)| *cid);
    Ok(columns.into_iter().map(|(_, column)| column).collect())
}
