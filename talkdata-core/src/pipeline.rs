//! End-to-end question handling.
//!
//! question → catalog → translator → guard → executor → audit → shaper
//!
//! Only a catalog load failure is an `Err`; every other outcome is a
//! [`QueryResponse`].

use crate::Result;
use crate::audit::AuditRecorder;
use crate::catalog::{CatalogLoader, SchemaCatalog};
use crate::executor::QueryExecutor;
use crate::guard::{GuardPolicy, StatementGuard};
use crate::models::{QueryResponse, StatementKind, TranslationResult};
use crate::shaper::ResponseShaper;
use crate::storage::Storage;
use crate::translator::{SqliteRecipientDirectory, Translator, TranslatorConfig};
use std::sync::Arc;

/// Settings for a [`QueryPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub translator: TranslatorConfig,
    pub guard: GuardPolicy,
    /// Write accepted questions to `audit_logs`
    pub audit: bool,
    /// Wait for the audit write before answering, for one-shot callers that
    /// exit right after the response
    pub await_audit: bool,
    /// Keep the schema catalog between requests
    pub cache_schema: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            translator: TranslatorConfig::default(),
            guard: GuardPolicy::default(),
            audit: true,
            await_audit: false,
            cache_schema: false,
        }
    }
}

impl PipelineConfig {
    /// Read-only, audited, uncached defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if any nested setting is invalid
    pub fn validate(&self) -> Result<()> {
        self.translator.validate()
    }
}

/// The assembled query pipeline. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct QueryPipeline {
    catalog: CatalogLoader,
    translator: Translator,
    guard: StatementGuard,
    executor: QueryExecutor,
    audit: AuditRecorder,
    await_audit: bool,
    shaper: ResponseShaper,
}

impl QueryPipeline {
    /// Builds the pipeline with the standard translator chain.
    ///
    /// # Errors
    /// Returns error if `config` is invalid
    pub fn new(storage: Storage, config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let directory = Arc::new(SqliteRecipientDirectory::new(storage.clone()));
        let translator = Translator::standard(&config.translator, directory);
        Self::with_translator(storage, config, translator)
    }

    /// Builds the pipeline around a caller-assembled translator.
    ///
    /// # Errors
    /// Returns error if `config` is invalid
    pub fn with_translator(
        storage: Storage,
        config: &PipelineConfig,
        translator: Translator,
    ) -> Result<Self> {
        config.validate()?;

        let catalog = if config.cache_schema {
            CatalogLoader::cached(storage.clone())
        } else {
            CatalogLoader::new(storage.clone())
        };
        let audit = if config.audit {
            AuditRecorder::new(storage.clone())
        } else {
            AuditRecorder::disabled(storage.clone())
        };

        tracing::debug!(
            "Query pipeline ready (handlers: {:?}, mutations allowed: {}, audit: {})",
            translator.handler_names(),
            config.guard.allow_mutations,
            config.audit
        );

        Ok(Self {
            catalog,
            translator,
            guard: StatementGuard::new(config.guard),
            executor: QueryExecutor::new(storage),
            audit,
            await_audit: config.await_audit,
            shaper: ResponseShaper::new(),
        })
    }

    /// Current schema catalog, for schema discovery.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the schema cannot be read
    pub async fn schema(&self) -> Result<Arc<SchemaCatalog>> {
        self.catalog.load().await
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Answers one question.
    ///
    /// # Errors
    /// Returns `StorageUnavailable` if the schema catalog cannot be loaded
    pub async fn answer(&self, question: &str) -> Result<QueryResponse> {
        tracing::debug!("Answering question: {}", question);

        let schema = self.catalog.load().await.inspect_err(|e| {
            tracing::error!("Schema load failed: {}", e);
        })?;

        let translation = self.translator.translate(question, &schema).await;
        let TranslationResult::Translated { sql, params, .. } = &translation else {
            return Ok(self.shaper.shape(question, &translation, None));
        };
        tracing::debug!("Generated SQL: {}", sql);

        let statement = match self.guard.validate_with_params(sql, params.clone()) {
            Ok(statement) => statement,
            Err(rejection) => {
                return Ok(self
                    .shaper
                    .shape_rejection(question, &translation, &rejection));
            }
        };

        let execution = self.executor.execute(&statement).await;

        if statement.kind() == StatementKind::Mutating && !execution.is_error() {
            self.catalog.invalidate().await;
        }
        if self.await_audit {
            self.audit.record_now(question, statement.kind()).await;
        } else {
            self.audit.record(question, statement.kind());
        }

        Ok(self.shaper.shape(question, &translation, Some(execution)))
    }
}
