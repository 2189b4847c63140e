//! Time limit for handlers that call slow or external services.

use super::{Question, TranslationHandler};
use crate::catalog::SchemaCatalog;
use crate::models::TranslationResult;
use async_trait::async_trait;
use std::time::Duration;

/// Wraps a handler with a timeout.
///
/// When the inner handler does not answer in time the wrapper answers
/// `Untranslatable` on its behalf, ending the chain.
#[derive(Debug, Clone)]
pub struct BoundedHandler<H> {
    inner: H,
    timeout: Duration,
}

impl<H: TranslationHandler> BoundedHandler<H> {
    pub fn new(inner: H, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<H: TranslationHandler> TranslationHandler for BoundedHandler<H> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn try_translate(
        &self,
        question: &Question,
        schema: &SchemaCatalog,
    ) -> Option<TranslationResult> {
        match tokio::time::timeout(self.timeout, self.inner.try_translate(question, schema)).await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "Handler '{}' timed out after {:?}",
                    self.inner.name(),
                    self.timeout
                );
                Some(TranslationResult::no_match())
            }
        }
    }
}
