//! "Show all transactions" and similar listing requests.

use super::ordering::{detect_ordering_strategy, generate_order_by_clause, quote_identifier};
use super::{MAX_ROW_CAP, Question, TranslationHandler};
use crate::catalog::SchemaCatalog;
use crate::models::TranslationResult;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

static LISTING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:show|list|display|get|give)\b(?: me)? all(?: of)?(?: (?:my|the))? (?P<table>[a-z_]+(?: [a-z_]+)?)\b",
    )
    .expect("Invalid listing pattern")
});

/// Bounded, most-recent-first listing of any catalog table.
#[derive(Debug, Clone)]
pub struct BulkListingHandler {
    row_cap: u32,
}

impl BulkListingHandler {
    /// `row_cap` is clamped to `1..=200`.
    pub fn new(row_cap: u32) -> Self {
        Self {
            row_cap: row_cap.clamp(1, MAX_ROW_CAP),
        }
    }
}

/// Resolves the listed noun phrase to a table, trying "loan payments" as
/// `loan_payments` before falling back to its first word.
fn resolve_table<'a>(phrase: &str, schema: &'a SchemaCatalog) -> Option<&'a str> {
    schema.find_table(&phrase.replace(' ', "_")).or_else(|| {
        phrase
            .split_whitespace()
            .next()
            .and_then(|word| schema.find_table(word))
    })
}

#[async_trait]
impl TranslationHandler for BulkListingHandler {
    fn name(&self) -> &str {
        "bulk_listing"
    }

    async fn try_translate(
        &self,
        question: &Question,
        schema: &SchemaCatalog,
    ) -> Option<TranslationResult> {
        let caps = LISTING_RE.captures(question.normalized())?;
        let table = resolve_table(caps.name("table")?.as_str(), schema)?;
        let columns = schema.table(table)?;

        let order_by = generate_order_by_clause(&detect_ordering_strategy(columns));
        let sql = format!(
            "SELECT * FROM {} {} LIMIT {}",
            quote_identifier(table),
            order_by,
            self.row_cap
        );

        Some(TranslationResult::translated(
            self.name(),
            sql,
            format!("list all {}", table),
            Vec::new(),
        ))
    }
}
