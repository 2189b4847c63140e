//! Property tests for the statement guard.
//!
//! These tests verify:
//! - Any content after a statement separator is rejected
//! - Separators inside string literals and comments never split a statement
//! - Keyword case never changes classification

use proptest::prelude::*;
use talkdata_core::{GuardPolicy, Rejection, StatementGuard, StatementKind};

fn guard() -> StatementGuard {
    StatementGuard::new(GuardPolicy::permissive())
}

proptest! {
    /// Test a second statement after `;` is always rejected
    #[test]
    fn test_guard_rejects_any_trailing_statement(
        tail in "[A-Za-z][A-Za-z0-9_ ]{0,30}",
        spacing in "[ \t\n]{0,3}",
    ) {
        let sql = format!("SELECT * FROM transactions;{}{}", spacing, tail);
        prop_assert_eq!(guard().validate(&sql), Err(Rejection::MultipleStatements));
    }

    /// Test separators hidden in literals keep the statement whole
    #[test]
    fn test_guard_literal_separators_are_inert(body in "[a-z0-9 ;]{0,40}") {
        let sql = format!("SELECT * FROM transfers WHERE note = '{}'", body);
        let statement = guard().validate(&sql);
        prop_assert!(statement.is_ok());
        prop_assert_eq!(statement.unwrap().kind(), StatementKind::ReadOnly);
    }

    /// Test separators hidden in comments keep the statement whole
    #[test]
    fn test_guard_comment_separators_are_inert(body in "[a-z0-9 ;]{0,40}") {
        let line = format!("SELECT 1 -- {}", body);
        prop_assert!(guard().validate(&line).is_ok());

        let block = format!("SELECT /* {} */ 1", body);
        prop_assert!(guard().validate(&block).is_ok());
    }

    /// Test leading keyword case does not change classification
    #[test]
    fn test_guard_classification_ignores_case(
        upper in proptest::collection::vec(any::<bool>(), 6),
    ) {
        let verb: String = "select"
            .chars()
            .zip(upper.iter())
            .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
            .collect();
        let sql = format!("  {} amount FROM transactions", verb);
        prop_assert_eq!(StatementGuard::classify(&sql), Some(StatementKind::ReadOnly));
    }

    /// Test the read-only policy refuses every non-read verb
    #[test]
    fn test_guard_read_only_refuses_writes(
        verb in prop::sample::select(vec!["insert", "update", "delete", "drop", "alter", "create", "replace"]),
    ) {
        let sql = format!("{} something", verb);
        let result = StatementGuard::new(GuardPolicy::read_only()).validate(&sql);
        prop_assert!(
            matches!(result, Err(Rejection::MutationNotPermitted { .. })),
            "unexpected result: {:?}",
            result
        );
    }
}
