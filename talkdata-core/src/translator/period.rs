//! Relative periods ("last month", "in 2024", ...) and their SQL predicates.
//!
//! Predicates are SQLite `date()` expressions anchored on a bound reference
//! date, so the statement text for a given period never changes; only the
//! bound anchor does. The anchor is the literal `now` unless a fixed
//! reference date is configured.

use crate::models::SqlParam;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// Regex fragment matching every phrase [`Period::from_phrase`] understands.
pub(crate) const PERIOD_PATTERN: &str = r"(?:(?:in|during|over|for) )?(?:the )?(?:last|past|previous|this|current) (?:12 months|month|year)|(?:in|during|for) (?:19|20)\d{2}";

static PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", PERIOD_PATTERN)).expect("Invalid period pattern")
});

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("Invalid year pattern"));

/// Date every relative period is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateAnchor {
    /// The database's current date
    #[default]
    Now,
    /// A fixed reference date
    Fixed(NaiveDate),
}

impl DateAnchor {
    /// The value bound for each anchor placeholder.
    pub fn as_param(&self) -> SqlParam {
        match self {
            Self::Now => SqlParam::from("now"),
            Self::Fixed(date) => SqlParam::from(date.format("%Y-%m-%d").to_string()),
        }
    }
}

/// A time window named in a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// The previous calendar month
    LastMonth,
    /// The current calendar month up to its end
    ThisMonth,
    /// The twelve months up to and including the anchor date
    TrailingYear,
    /// The current calendar year
    ThisYear,
    /// A specific calendar year
    CalendarYear(i32),
}

impl Period {
    /// First period phrase found in `text` (expected lower-cased).
    pub fn find(text: &str) -> Option<Self> {
        PERIOD_RE
            .find(text)
            .and_then(|m| Self::from_phrase(m.as_str()))
    }

    /// Interprets a phrase matched by [`PERIOD_PATTERN`].
    pub fn from_phrase(phrase: &str) -> Option<Self> {
        let phrase = phrase.trim().to_lowercase();

        if let Some(caps) = YEAR_RE.captures(&phrase) {
            return caps[1].parse().ok().map(Self::CalendarYear);
        }

        let current = phrase.contains("this") || phrase.contains("current");
        let previous =
            phrase.contains("last") || phrase.contains("past") || phrase.contains("previous");

        if phrase.contains("12 months") && previous {
            Some(Self::TrailingYear)
        } else if phrase.ends_with("month") {
            match (previous, current) {
                (true, _) => Some(Self::LastMonth),
                (false, true) => Some(Self::ThisMonth),
                _ => None,
            }
        } else if phrase.ends_with("year") {
            match (previous, current) {
                (true, _) => Some(Self::TrailingYear),
                (false, true) => Some(Self::ThisYear),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Human-readable name used in translation reasons.
    pub fn describe(&self) -> String {
        match self {
            Self::LastMonth => "last month".to_string(),
            Self::ThisMonth => "this month".to_string(),
            Self::TrailingYear => "the last year".to_string(),
            Self::ThisYear => "this year".to_string(),
            Self::CalendarYear(year) => year.to_string(),
        }
    }

    /// Renders `column` restricted to this period, plus the values to bind.
    ///
    /// `column` must already be a safe identifier.
    pub fn predicate(&self, column: &str, anchor: DateAnchor) -> (String, Vec<SqlParam>) {
        let a = anchor.as_param();
        match self {
            Self::LastMonth => (
                format!(
                    "{c} >= date(?, 'start of month', '-1 month') AND {c} < date(?, 'start of month')",
                    c = column
                ),
                vec![a.clone(), a],
            ),
            Self::ThisMonth => (
                format!(
                    "{c} >= date(?, 'start of month') AND {c} < date(?, 'start of month', '+1 month')",
                    c = column
                ),
                vec![a.clone(), a],
            ),
            Self::TrailingYear => (
                format!(
                    "{c} >= date(?, '-1 year') AND {c} < date(?, '+1 day')",
                    c = column
                ),
                vec![a.clone(), a],
            ),
            Self::ThisYear => (
                format!(
                    "{c} >= date(?, 'start of year') AND {c} < date(?, 'start of year', '+1 year')",
                    c = column
                ),
                vec![a.clone(), a],
            ),
            Self::CalendarYear(year) => (
                format!("{c} >= ? AND {c} < ?", c = column),
                vec![
                    SqlParam::from(format!("{:04}-01-01", year)),
                    SqlParam::from(format!("{:04}-01-01", year.saturating_add(1))),
                ],
            ),
        }
    }
}
