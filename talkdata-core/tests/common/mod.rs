//! Shared fixtures for talkdata-core integration tests.
//!
//! Builds an in-memory banking database with the same table layout the
//! production database uses, plus a small, date-stable data set.

#![allow(dead_code)]

use chrono::NaiveDate;
use talkdata_core::{DateAnchor, PipelineConfig, QueryPipeline, Storage};

pub const BANKING_DDL: &[&str] = &[
    "CREATE TABLE customers (
        customer_id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT,
        last_name TEXT,
        email TEXT,
        phone TEXT,
        dob DATE,
        address TEXT,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE branches (
        branch_id INTEGER PRIMARY KEY AUTOINCREMENT,
        branch_name TEXT,
        branch_code TEXT,
        address TEXT
    )",
    "CREATE TABLE accounts (
        account_id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER,
        branch_id INTEGER,
        account_number TEXT UNIQUE,
        account_type TEXT,
        status TEXT,
        balance NUMERIC,
        currency TEXT,
        opened_date DATE,
        closed_date DATE
    )",
    "CREATE TABLE transactions (
        transaction_id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER,
        date DATE,
        type TEXT,
        category TEXT,
        merchant TEXT,
        description TEXT,
        amount NUMERIC,
        related_account_id INTEGER,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE beneficiaries (
        beneficiary_id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        account_number TEXT,
        relationship TEXT,
        added_on DATE
    )",
    "CREATE TABLE transfers (
        transfer_id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_account_id INTEGER,
        to_beneficiary_id INTEGER,
        date DATE,
        amount NUMERIC,
        status TEXT,
        note TEXT
    )",
    "CREATE TABLE audit_logs (
        log_id INTEGER PRIMARY KEY AUTOINCREMENT,
        event TEXT,
        table_name TEXT,
        row_id INTEGER,
        timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
    )",
];

/// Transactions: (account, date, type, category, merchant, description, amount).
///
/// 950.00 on 2024-11-05 is the largest debit in November 2024.
pub const TRANSACTIONS: &[(i64, &str, &str, &str, &str, &str, f64)] = &[
    (1, "2024-09-12", "debit", "dining", "Kebab House", "Family lunch", 80.50),
    (1, "2024-10-01", "credit", "salary", "ABC Corp", "Monthly salary", 2500.00),
    (1, "2024-10-10", "debit", "utilities", "Electric Co", "Electric bill", 300.00),
    (3, "2024-11-05", "debit", "travel", "Airline", "Flight to Dubai", 950.00),
    (1, "2024-11-12", "debit", "shopping", "Nike Store", "Shoes purchase", 250.00),
    (1, "2024-11-22", "debit", "dining", "Domino's", "Dinner", 75.00),
    (1, "2024-12-02", "debit", "groceries", "Supermarket A", "Grocery refill", 100.00),
    (2, "2024-12-05", "credit", "refund", "Amazon", "Product refund", 60.00),
];

/// Beneficiaries in id order.
pub const BENEFICIARIES: &[&str] = &["John Smith", "Alice Brown", "David Lee"];

/// Transfers: (from account, beneficiary id, date, amount).
///
/// John Smith (id 1) received 1600.00 between 2024-06-01 and 2025-06-01.
pub const TRANSFERS: &[(i64, i64, &str, f64)] = &[
    (2, 1, "2024-09-15", 400.00),
    (1, 2, "2024-10-08", 700.00),
    (3, 3, "2024-10-30", 950.00),
    (2, 1, "2024-11-05", 1200.00),
];

/// Creates the banking tables in `storage`.
pub async fn create_schema(storage: &Storage) {
    for ddl in BANKING_DDL {
        sqlx::query(ddl)
            .execute(storage.pool())
            .await
            .expect("Failed to create table");
    }
}

/// Fills the banking tables created by [`create_schema`].
pub async fn seed(storage: &Storage) {
    for (account, date, kind, category, merchant, description, amount) in TRANSACTIONS {
        sqlx::query(
            "INSERT INTO transactions (account_id, date, type, category, merchant, description, amount) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(account)
        .bind(date)
        .bind(kind)
        .bind(category)
        .bind(merchant)
        .bind(description)
        .bind(amount)
        .execute(storage.pool())
        .await
        .expect("Failed to insert transaction");
    }

    for name in BENEFICIARIES {
        sqlx::query("INSERT INTO beneficiaries (name, relationship) VALUES (?, 'Friend')")
            .bind(name)
            .execute(storage.pool())
            .await
            .expect("Failed to insert beneficiary");
    }

    for (from, to, date, amount) in TRANSFERS {
        sqlx::query(
            "INSERT INTO transfers (from_account_id, to_beneficiary_id, date, amount, status) \
             VALUES (?, ?, ?, ?, 'Completed')",
        )
        .bind(from)
        .bind(to)
        .bind(date)
        .bind(amount)
        .execute(storage.pool())
        .await
        .expect("Failed to insert transfer");
    }
}

/// In-memory storage with the banking schema and seed data.
pub async fn seeded_storage() -> Storage {
    let storage = Storage::in_memory()
        .await
        .expect("Failed to open in-memory storage");
    create_schema(&storage).await;
    seed(&storage).await;
    storage
}

pub fn anchor(year: i32, month: u32, day: u32) -> DateAnchor {
    DateAnchor::Fixed(NaiveDate::from_ymd_opt(year, month, day).expect("Invalid anchor date"))
}

/// Pipeline config anchored on `anchor` with auditing on.
pub fn config_at(anchor: DateAnchor) -> PipelineConfig {
    let mut config = PipelineConfig::new();
    config.translator.anchor = anchor;
    config
}

/// Seeded storage plus a pipeline anchored on `anchor`.
pub async fn pipeline_at(anchor: DateAnchor) -> (Storage, QueryPipeline) {
    let storage = seeded_storage().await;
    let pipeline =
        QueryPipeline::new(storage.clone(), &config_at(anchor)).expect("Failed to build pipeline");
    (storage, pipeline)
}

/// Number of rows in `audit_logs` with the given `table_name`.
pub async fn audit_count(storage: &Storage, table_name: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE table_name = ?")
        .bind(table_name)
        .fetch_one(storage.pool())
        .await
        .expect("Failed to count audit rows")
}

/// Polls until `audit_logs` holds `expected` rows for `table_name`.
pub async fn wait_for_audit(storage: &Storage, table_name: &str, expected: i64) -> i64 {
    let mut count = 0;
    for _ in 0..100 {
        count = audit_count(storage, table_name).await;
        if count >= expected {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    count
}
