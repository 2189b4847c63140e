//! Natural-language to SQL translation.
//!
//! The [`Translator`] is an ordered chain of [`TranslationHandler`]s. Each
//! handler inspects the normalized question and the live schema catalog and
//! either declines (`None`) or answers. Handlers are tried in registration
//! order and the first answer wins; there is no scoring across handlers.
//! When every handler declines the result is
//! [`TranslationResult::no_match`].
//!
//! # Module Structure
//! - `period`: relative date windows and their SQL predicates
//! - `ordering`: reverse-chronological ordering detection
//! - `directory`: recipient name to id lookup
//! - `largest_transaction`, `recipient_total`, `bulk_listing`: built-in handlers
//! - `bounded`: timeout wrapper for slow handlers
//! - `completion`: model-backed handler (feature `llm`)

mod bounded;
mod bulk_listing;
#[cfg(feature = "llm")]
mod completion;
mod directory;
mod largest_transaction;
pub mod ordering;
pub mod period;
mod recipient_total;

pub use bounded::BoundedHandler;
pub use bulk_listing::BulkListingHandler;
#[cfg(feature = "llm")]
pub use completion::{CompletionConfig, CompletionError, CompletionHandler};
pub use directory::{Recipient, RecipientDirectory, SqliteRecipientDirectory};
pub use largest_transaction::LargestTransactionHandler;
pub use period::{DateAnchor, Period};
pub use recipient_total::RecipientTotalHandler;

use crate::Result;
use crate::catalog::SchemaCatalog;
use crate::error::TalkDataError;
use crate::models::TranslationResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Largest row cap a listing handler may emit.
pub const MAX_ROW_CAP: u32 = 200;

/// A question as received, plus the normalized form handlers match against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    original: String,
    normalized: String,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        let original = text.into();
        let normalized = original
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        Self {
            original,
            normalized,
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    /// Lower-cased text with whitespace runs collapsed.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

/// One unit of question matching and SQL generation.
///
/// Implementations must be pure functions of the question and schema, apart
/// from parameterized lookups. Every user-derived value in the emitted SQL
/// travels as a bound parameter.
///
/// # Object Safety
/// This trait is object-safe and is registered as `Arc<dyn TranslationHandler>`.
#[async_trait]
pub trait TranslationHandler: Send + Sync {
    /// Stable name reported in `Translated::handler` and in logs
    fn name(&self) -> &str;

    /// Answers the question, or returns `None` to let the next handler try.
    async fn try_translate(
        &self,
        question: &Question,
        schema: &SchemaCatalog,
    ) -> Option<TranslationResult>;
}

/// Settings shared by the built-in handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConfig {
    /// LIMIT applied by listing handlers
    pub row_cap: u32,
    /// Reference date for relative periods
    pub anchor: DateAnchor,
    /// Upper bound for handlers that call out to slow services
    pub handler_timeout: Duration,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            row_cap: MAX_ROW_CAP,
            anchor: DateAnchor::Now,
            handler_timeout: Duration::from_secs(5),
        }
    }
}

impl TranslatorConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if the row cap is outside `1..=200` or the timeout is zero
    pub fn validate(&self) -> Result<()> {
        if self.row_cap == 0 || self.row_cap > MAX_ROW_CAP {
            return Err(TalkDataError::configuration(format!(
                "row_cap must be between 1 and {}",
                MAX_ROW_CAP
            )));
        }
        if self.handler_timeout.is_zero() {
            return Err(TalkDataError::configuration(
                "handler_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Ordered handler chain.
#[derive(Clone, Default)]
pub struct Translator {
    handlers: Vec<Arc<dyn TranslationHandler>>,
}

impl std::fmt::Debug for Translator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Translator")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

impl Translator {
    /// An empty chain; every question is a miss.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in chain: largest transaction, recipient total, bulk listing.
    pub fn standard(config: &TranslatorConfig, directory: Arc<dyn RecipientDirectory>) -> Self {
        Self::new()
            .with_handler(LargestTransactionHandler::new(config.anchor))
            .with_handler(RecipientTotalHandler::new(directory, config.anchor))
            .with_handler(BulkListingHandler::new(config.row_cap))
    }

    /// Appends a handler with the lowest priority so far.
    pub fn with_handler(mut self, handler: impl TranslationHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Runs the chain for `question` against `schema`.
    ///
    /// A `Translated` answer with empty SQL counts as a decline.
    pub async fn translate(&self, question: &str, schema: &SchemaCatalog) -> TranslationResult {
        let question = Question::new(question);
        tracing::debug!("Translating question: {}", question.normalized());

        for handler in &self.handlers {
            match handler.try_translate(&question, schema).await {
                Some(TranslationResult::Translated { ref sql, .. }) if sql.trim().is_empty() => {
                    tracing::warn!(
                        "Handler '{}' produced an empty statement, skipping",
                        handler.name()
                    );
                }
                Some(result) => {
                    tracing::debug!(
                        "Handler '{}' answered (translated: {})",
                        handler.name(),
                        result.is_translated()
                    );
                    return result;
                }
                None => {
                    tracing::trace!("Handler '{}' declined", handler.name());
                }
            }
        }

        tracing::debug!("No handler matched question");
        TranslationResult::no_match()
    }
}
