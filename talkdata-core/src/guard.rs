//! Safety policy applied to every candidate statement before execution.
//!
//! # Security
//! - Input containing more than one statement is always rejected
//! - Separators inside string literals, quoted identifiers and comments are
//!   ignored; a single trailing `;` is accepted
//! - Mutating statements are rejected unless the policy allows them
//!
//! A [`ValidatedStatement`] can only be obtained from
//! [`StatementGuard::validate`], so the executor cannot be handed
//! unvalidated SQL.

use crate::models::{SqlParam, StatementKind};
use thiserror::Error;

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Statement is empty")]
    Empty,

    #[error("Multiple statements are not allowed")]
    MultipleStatements,

    #[error("{verb} statements are not permitted")]
    MutationNotPermitted { verb: String },
}

/// What the guard lets through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Permit statements classified as [`StatementKind::Mutating`]
    pub allow_mutations: bool,
}

impl GuardPolicy {
    pub fn read_only() -> Self {
        Self {
            allow_mutations: false,
        }
    }

    pub fn permissive() -> Self {
        Self {
            allow_mutations: true,
        }
    }
}

/// A single statement that passed the guard.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedStatement {
    sql: String,
    params: Vec<SqlParam>,
    kind: StatementKind,
}

impl ValidatedStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }
}

/// Verbs whose statements never write.
const READ_ONLY_VERBS: &[&str] = &["select", "values", "explain"];

/// Pragmas that only report state when called without a value.
const QUERY_PRAGMAS: &[&str] = &[
    "application_id",
    "auto_vacuum",
    "cache_size",
    "collation_list",
    "compile_options",
    "data_version",
    "database_list",
    "encoding",
    "foreign_keys",
    "freelist_count",
    "function_list",
    "journal_mode",
    "module_list",
    "page_count",
    "page_size",
    "pragma_list",
    "schema_version",
    "synchronous",
    "user_version",
];

/// Pragmas whose argument names an object to inspect.
const INSPECTION_PRAGMAS: &[&str] = &[
    "foreign_key_check",
    "foreign_key_list",
    "index_info",
    "index_list",
    "index_xinfo",
    "integrity_check",
    "quick_check",
    "table_info",
    "table_list",
    "table_xinfo",
];

#[derive(Debug)]
struct Word {
    /// Lower-cased
    text: String,
    /// Parenthesis depth
    depth: u32,
    /// Directly preceded by a `)` that closed back to depth 0
    after_group: bool,
}

#[derive(Debug, Default)]
struct Scan {
    words: Vec<Word>,
    /// An `=` outside literals and comments
    has_assignment: bool,
    /// A `(` outside literals and comments
    has_group: bool,
    /// Something other than whitespace or comments after the first `;`
    content_after_terminator: bool,
}

impl Scan {
    fn verb(&self) -> Option<&str> {
        self.words.first().map(|w| w.text.as_str())
    }
}

/// Splits `sql` into bare words, skipping literals, quoted identifiers and
/// comments.
fn scan(sql: &str) -> Scan {
    let chars: Vec<char> = sql.chars().collect();
    let len = chars.len();
    let mut scan = Scan::default();
    let mut depth: u32 = 0;
    let mut terminated = false;
    let mut closed_group = false;
    let mut i = 0;

    while i < len {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '-' && next == Some('-') {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && next == Some('*') {
            i += 2;
            while i < len && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i = (i + 2).min(len);
            continue;
        }

        if terminated {
            scan.content_after_terminator = true;
        }
        let after_group = std::mem::take(&mut closed_group);

        match c {
            ';' => {
                terminated = true;
                i += 1;
            }
            '\'' | '"' | '`' => {
                i += 1;
                while i < len {
                    if chars[i] == c {
                        // A doubled quote is an escaped quote
                        if chars.get(i + 1) == Some(&c) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            '[' => {
                while i < len && chars[i] != ']' {
                    i += 1;
                }
                i += 1;
            }
            '(' => {
                scan.has_group = true;
                depth += 1;
                i += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                closed_group = depth == 0;
                i += 1;
            }
            '=' => {
                scan.has_assignment = true;
                i += 1;
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < len && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                scan.words.push(Word {
                    text: word.to_lowercase(),
                    depth,
                    after_group,
                });
            }
            _ => i += 1,
        }
    }

    scan
}

fn classify_scan(scan: &Scan) -> Option<StatementKind> {
    let kind = match scan.verb()? {
        v if READ_ONLY_VERBS.contains(&v) => StatementKind::ReadOnly,
        "pragma" => classify_pragma(scan),
        "with" => classify_with(scan),
        _ => StatementKind::Mutating,
    };
    Some(kind)
}

/// `PRAGMA name`, `PRAGMA name = v` and `PRAGMA name(v)`; only the
/// reporting forms of known pragmas are read-only.
fn classify_pragma(scan: &Scan) -> StatementKind {
    let name = scan
        .words
        .iter()
        .skip(1)
        .rev()
        .find(|w| w.depth == 0)
        .map(|w| w.text.as_str());

    let read_only = match name {
        _ if scan.has_assignment => false,
        Some(name) if scan.has_group => INSPECTION_PRAGMAS.contains(&name),
        Some(name) => QUERY_PRAGMAS.contains(&name) || INSPECTION_PRAGMAS.contains(&name),
        None => false,
    };

    if read_only {
        StatementKind::ReadOnly
    } else {
        StatementKind::Mutating
    }
}

/// A `WITH` statement takes the kind of the verb after its last common
/// table expression.
fn classify_with(scan: &Scan) -> StatementKind {
    let body_verb = scan
        .words
        .iter()
        .find(|w| w.depth == 0 && w.after_group && w.text != "as")
        .map(|w| w.text.as_str());

    match body_verb {
        Some(verb) if READ_ONLY_VERBS.contains(&verb) => StatementKind::ReadOnly,
        _ => StatementKind::Mutating,
    }
}

/// Validates candidate SQL against a [`GuardPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementGuard {
    policy: GuardPolicy,
}

impl StatementGuard {
    pub fn new(policy: GuardPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    /// Classifies a statement by its leading keyword.
    ///
    /// Returns `None` for input without any keyword.
    pub fn classify(sql: &str) -> Option<StatementKind> {
        classify_scan(&scan(sql))
    }

    /// Validates a statement that takes no parameters.
    pub fn validate(&self, sql: &str) -> Result<ValidatedStatement, Rejection> {
        self.validate_with_params(sql, Vec::new())
    }

    /// Validates `sql`, carrying `params` along for execution.
    ///
    /// # Errors
    /// Returns the first [`Rejection`] that applies
    pub fn validate_with_params(
        &self,
        sql: &str,
        params: Vec<SqlParam>,
    ) -> Result<ValidatedStatement, Rejection> {
        let scan = scan(sql);

        if scan.content_after_terminator {
            tracing::warn!("Rejected multi-statement input");
            return Err(Rejection::MultipleStatements);
        }

        let kind = classify_scan(&scan).ok_or(Rejection::Empty)?;

        if kind == StatementKind::Mutating && !self.policy.allow_mutations {
            let verb = scan.verb().map(str::to_uppercase).unwrap_or_default();
            tracing::warn!("Rejected {} statement under read-only policy", verb);
            return Err(Rejection::MutationNotPermitted { verb });
        }

        Ok(ValidatedStatement {
            sql: sql.trim().to_string(),
            params,
            kind,
        })
    }
}
