//! Ordering detection for generated listings, driven by the schema catalog.
//!
//! The detection priority is:
//! 1. Date columns (`date`, `*_date`, `date_*`)
//! 2. Well-known timestamp columns (`created_at`, `updated_at`, ...)
//! 3. Any other date/time-typed column
//! 4. Primary key columns
//! 5. ROWID (SQLite's built-in row identifier)

use crate::catalog::ColumnDescriptor;

/// Common timestamp column names used for ordering by "most recent"
const TIMESTAMP_COLUMN_NAMES: &[&str] = &[
    "created_at",
    "updated_at",
    "modified_at",
    "inserted_at",
    "timestamp",
    "created",
    "updated",
    "date_created",
    "date_updated",
    "creation_time",
    "create_time",
];

/// How rows of a table can be put in reverse-chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderingStrategy {
    /// Order by a date or timestamp column
    Temporal { column: String },
    /// Order by primary key columns
    PrimaryKey { columns: Vec<String> },
    /// Order by SQLite's ROWID
    RowId,
}

/// Detects the best ordering for a table from its column descriptors.
pub fn detect_ordering_strategy(columns: &[ColumnDescriptor]) -> OrderingStrategy {
    let temporal: Vec<&ColumnDescriptor> = columns.iter().filter(|c| c.is_temporal()).collect();

    let by_name = |pred: &dyn Fn(&str) -> bool| {
        temporal
            .iter()
            .find(|c| pred(&c.name.to_lowercase()))
            .map(|c| OrderingStrategy::Temporal {
                column: c.name.clone(),
            })
    };

    if let Some(strategy) = by_name(&|n| n == "date")
        .or_else(|| by_name(&|n| n.ends_with("_date") || n.starts_with("date_")))
        .or_else(|| by_name(&|n| TIMESTAMP_COLUMN_NAMES.contains(&n)))
    {
        return strategy;
    }

    if let Some(column) = temporal.first() {
        return OrderingStrategy::Temporal {
            column: column.name.clone(),
        };
    }

    let pk: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.clone())
        .collect();
    if !pk.is_empty() {
        return OrderingStrategy::PrimaryKey { columns: pk };
    }

    OrderingStrategy::RowId
}

/// Quotes an identifier unless it is a plain lower-case word.
pub fn quote_identifier(identifier: &str) -> String {
    let plain = identifier
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && identifier
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if plain {
        identifier.to_string()
    } else {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }
}

/// Generates a descending ORDER BY clause for the given strategy.
pub fn generate_order_by_clause(strategy: &OrderingStrategy) -> String {
    match strategy {
        OrderingStrategy::Temporal { column } => {
            format!("ORDER BY {} DESC", quote_identifier(column))
        }
        OrderingStrategy::PrimaryKey { columns } => {
            let cols: Vec<String> = columns
                .iter()
                .map(|c| format!("{} DESC", quote_identifier(c)))
                .collect();
            format!("ORDER BY {}", cols.join(", "))
        }
        OrderingStrategy::RowId => "ORDER BY rowid DESC".to_string(),
    }
}
