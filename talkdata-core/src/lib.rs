//! Core pipeline for Talk-to-Your-Data.
//!
//! This crate turns a natural-language question about a SQLite banking
//! database into a single validated SQL statement, executes it and shapes
//! the outcome into a response. The HTTP API and CLI live in
//! `talkdata-server`.
//!
//! # Safety Guarantees
//! - Every statement passes the [`guard::StatementGuard`] before execution
//! - Multi-statement input is never executed
//! - User-derived values are bound as parameters, never spliced into SQL
//! - Audit writes are best-effort and never fail a request
//!
//! # Architecture
//! Components are constructed with an explicit [`storage::Storage`] handle;
//! there is no process-wide connection. The translator is an ordered chain
//! of [`translator::TranslationHandler`] implementations.

pub mod audit;
pub mod catalog;
pub mod error;
pub mod executor;
pub mod guard;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod shaper;
pub mod storage;
pub mod translator;

// Re-export commonly used types
pub use audit::AuditRecorder;
pub use catalog::{CatalogLoader, ColumnDescriptor, SchemaCatalog};
pub use error::{Result, TalkDataError};
pub use executor::QueryExecutor;
pub use guard::{GuardPolicy, Rejection, StatementGuard, ValidatedStatement};
pub use models::{
    AuditEntry, ExecutionResult, MutationInfo, QueryResponse, Row, SqlParam, StatementKind,
    TranslationResult,
};
pub use pipeline::{PipelineConfig, QueryPipeline};
pub use shaper::ResponseShaper;
pub use storage::{ConnectionConfig, Storage};
pub use translator::{DateAnchor, TranslationHandler, Translator, TranslatorConfig};
