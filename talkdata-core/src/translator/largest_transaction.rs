//! "What was my biggest transaction last month?"

use super::ordering::quote_identifier;
use super::{DateAnchor, Period, Question, TranslationHandler};
use crate::catalog::SchemaCatalog;
use crate::models::TranslationResult;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

static TRIGGER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:biggest|largest|highest|most expensive)\s+(?:single\s+)?(?:transaction|purchase|expense|payment)s?\b",
    )
    .expect("Invalid largest transaction pattern")
});

const TABLE: &str = "transactions";

/// Columns reported for the winning transaction, when present.
const DISPLAY_COLUMNS: &[&str] = &["merchant", "category", "amount", "date"];

/// Selects the single highest-amount transaction in a period.
///
/// Without an explicit period the previous calendar month is used.
#[derive(Debug, Clone)]
pub struct LargestTransactionHandler {
    anchor: DateAnchor,
}

impl LargestTransactionHandler {
    pub fn new(anchor: DateAnchor) -> Self {
        Self { anchor }
    }
}

#[async_trait]
impl TranslationHandler for LargestTransactionHandler {
    fn name(&self) -> &str {
        "largest_transaction"
    }

    async fn try_translate(
        &self,
        question: &Question,
        schema: &SchemaCatalog,
    ) -> Option<TranslationResult> {
        let text = question.normalized();
        if !TRIGGER_RE.is_match(text) || !schema.has_columns(TABLE, &["amount", "date"]) {
            return None;
        }

        let period = Period::find(text).unwrap_or(Period::LastMonth);
        let columns: Vec<&str> = DISPLAY_COLUMNS
            .iter()
            .copied()
            .filter(|c| schema.column(TABLE, c).is_some())
            .collect();
        let (predicate, params) = period.predicate("date", self.anchor);

        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY amount DESC LIMIT 1",
            columns.join(", "),
            quote_identifier(TABLE),
            predicate
        );

        Some(TranslationResult::translated(
            self.name(),
            sql,
            format!("biggest transaction {}", period.describe()),
            params,
        ))
    }
}
