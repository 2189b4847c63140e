//! "How much did I send to John last year?"

use super::period::PERIOD_PATTERN;
use super::{DateAnchor, Period, Question, RecipientDirectory, TranslationHandler};
use crate::catalog::SchemaCatalog;
use crate::models::{SqlParam, TranslationResult};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};

static TRIGGER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:how much|total)\b.*\b(?:send|sent|transfer|transferred|pay|paid|money)\b")
        .expect("Invalid recipient total pattern")
});

static EXTRACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\bto\s+(?P<name>\p{{L}}[\p{{L}}\p{{M}} .'\-]*?)\s+(?P<period>{})\b",
        PERIOD_PATTERN
    ))
    .expect("Invalid recipient extraction pattern")
});

/// Sums transfers to one named recipient over a period.
///
/// The name must resolve to exactly one recipient; otherwise the handler
/// declines and the chain moves on.
#[derive(Clone)]
pub struct RecipientTotalHandler {
    directory: Arc<dyn RecipientDirectory>,
    anchor: DateAnchor,
}

impl std::fmt::Debug for RecipientTotalHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipientTotalHandler")
            .field("anchor", &self.anchor)
            .finish_non_exhaustive()
    }
}

impl RecipientTotalHandler {
    pub fn new(directory: Arc<dyn RecipientDirectory>, anchor: DateAnchor) -> Self {
        Self { directory, anchor }
    }
}

/// Pulls `(name, period)` out of a normalized question.
fn extract(text: &str) -> Option<(String, Period)> {
    let caps = EXTRACT_RE.captures(text)?;
    let mut name = caps.name("name")?.as_str().trim();
    for prefix in ["my ", "the "] {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest.trim_start();
        }
    }
    if name.is_empty() {
        return None;
    }
    let period = Period::from_phrase(caps.name("period")?.as_str())?;
    Some((name.to_string(), period))
}

#[async_trait]
impl TranslationHandler for RecipientTotalHandler {
    fn name(&self) -> &str {
        "recipient_total"
    }

    async fn try_translate(
        &self,
        question: &Question,
        schema: &SchemaCatalog,
    ) -> Option<TranslationResult> {
        let text = question.normalized();
        if !TRIGGER_RE.is_match(text)
            || !schema.has_columns("transfers", &["amount", "date", "to_beneficiary_id"])
        {
            return None;
        }

        let (name, period) = extract(text)?;

        let matches = match self.directory.find_matches(&name).await {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!("Recipient lookup failed, declining: {}", e);
                return None;
            }
        };

        let [recipient] = matches.as_slice() else {
            tracing::debug!(
                "Recipient '{}' matched {} beneficiaries, declining",
                name,
                matches.len()
            );
            return None;
        };

        let (predicate, period_params) = period.predicate("date", self.anchor);
        let sql = format!(
            "SELECT SUM(amount) AS total_sent FROM transfers WHERE to_beneficiary_id = ? AND {}",
            predicate
        );

        let mut params = vec![SqlParam::from(recipient.id)];
        params.extend(period_params);

        Some(TranslationResult::translated(
            self.name(),
            sql,
            format!(
                "total money sent to {} ({})",
                recipient.name,
                period.describe()
            ),
            params,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;
    use crate::catalog::ColumnDescriptor;
    use crate::translator::Recipient;

    struct StaticDirectory(Vec<Recipient>);

    #[async_trait]
    impl RecipientDirectory for StaticDirectory {
        async fn find_matches(&self, fragment: &str) -> Result<Vec<Recipient>> {
            let fragment = fragment.to_lowercase();
            Ok(self
                .0
                .iter()
                .filter(|r| r.name.to_lowercase().contains(&fragment))
                .cloned()
                .collect())
        }
    }

    fn recipient(id: i64, name: &str) -> Recipient {
        Recipient {
            id,
            name: name.to_string(),
        }
    }

    fn schema() -> SchemaCatalog {
        SchemaCatalog::new().with_table(
            "transfers",
            vec![
                ColumnDescriptor::new("transfer_id", "INTEGER").primary(),
                ColumnDescriptor::new("to_beneficiary_id", "INTEGER"),
                ColumnDescriptor::new("date", "DATE"),
                ColumnDescriptor::new("amount", "NUMERIC"),
            ],
        )
    }

    fn handler(recipients: Vec<Recipient>) -> RecipientTotalHandler {
        RecipientTotalHandler::new(Arc::new(StaticDirectory(recipients)), DateAnchor::Now)
    }

    #[test]
    fn test_extract_name_and_period() {
        assert_eq!(
            extract("how much did i send to john last year?"),
            Some(("john".to_string(), Period::TrailingYear))
        );
        assert_eq!(
            extract("total money sent to john smith in the last year"),
            Some(("john smith".to_string(), Period::TrailingYear))
        );
        assert_eq!(
            extract("how much did i send to my landlord in 2024"),
            Some(("landlord".to_string(), Period::CalendarYear(2024)))
        );
        assert_eq!(extract("how much did i send to john"), None);
    }

    #[test]
    fn test_extract_non_ascii_names() {
        assert_eq!(
            extract("how much did i send to josé last year?"),
            Some(("josé".to_string(), Period::TrailingYear))
        );
        assert_eq!(
            extract("total paid to zoë müller in 2024"),
            Some(("zoë müller".to_string(), Period::CalendarYear(2024)))
        );
    }

    #[tokio::test]
    async fn test_non_ascii_recipient_resolves() {
        let handler = handler(vec![recipient(4, "José Álvarez"), recipient(1, "John Smith")]);
        let result = handler
            .try_translate(&Question::new("How much did I send to José last year?"), &schema())
            .await
            .unwrap();

        let TranslationResult::Translated { params, reason, .. } = result else {
            panic!("expected a translation");
        };
        assert_eq!(params[0], SqlParam::Integer(4));
        assert_eq!(reason, "total money sent to José Álvarez (the last year)");
    }

    #[tokio::test]
    async fn test_unique_recipient_binds_id() {
        let handler = handler(vec![recipient(1, "John Smith"), recipient(2, "Alice Brown")]);
        let result = handler
            .try_translate(&Question::new("How much did I send to John last year?"), &schema())
            .await
            .unwrap();

        let TranslationResult::Translated { sql, params, .. } = result else {
            panic!("expected a translation");
        };
        assert_eq!(
            sql,
            "SELECT SUM(amount) AS total_sent FROM transfers WHERE to_beneficiary_id = ? \
             AND date >= date(?, '-1 year') AND date < date(?, '+1 day')"
        );
        assert_eq!(params[0], SqlParam::Integer(1));
        assert_eq!(params.len(), 3);
    }

    #[tokio::test]
    async fn test_name_never_reaches_sql() {
        let handler = handler(vec![recipient(7, "O'Brien")]);
        let result = handler
            .try_translate(
                &Question::new("how much did i send to o'brien last year"),
                &schema(),
            )
            .await
            .unwrap();
        assert!(!result.sql().unwrap().contains("brien"));
    }

    #[tokio::test]
    async fn test_zero_or_many_matches_decline() {
        let question = Question::new("How much did I send to John last year?");

        let none = handler(vec![recipient(2, "Alice Brown")]);
        assert!(none.try_translate(&question, &schema()).await.is_none());

        let many = handler(vec![recipient(1, "John Smith"), recipient(3, "Johnny Cash")]);
        assert!(many.try_translate(&question, &schema()).await.is_none());
    }

    #[tokio::test]
    async fn test_declines_without_transfers_table() {
        let handler = handler(vec![recipient(1, "John Smith")]);
        let question = Question::new("How much did I send to John last year?");
        assert!(
            handler
                .try_translate(&question, &SchemaCatalog::new())
                .await
                .is_none()
        );
    }
}
