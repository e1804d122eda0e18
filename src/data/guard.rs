//! Syntactic read-only guard for raw SQL.
//!
//! This is a token filter, not a parser. Adversarial input can get past it,
//! so the Postgres backend also runs raw statements inside a `READ ONLY`
//! transaction and should connect with a role that has no write grants.

use thiserror::Error;

/// Statements must open with one of these.
const ALLOWED_LEADING_KEYWORDS: &[&str] = &["select", "with"];

/// Mutating or privileged keywords rejected anywhere as a standalone token.
const DENIED_KEYWORDS: &[&str] = &[
    "drop", "delete", "truncate", "alter", "create", "insert", "update", "grant", "revoke",
    "exec", "execute",
];

/// Why a statement was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("empty statement")]
    Empty,

    #[error("statement must begin with SELECT, found '{0}'")]
    NotSelect(String),

    #[error("forbidden keyword '{0}'")]
    DeniedKeyword(String),

    #[error("multiple statements are not allowed")]
    MultipleStatements,

    #[error("SQL comments are not allowed")]
    Comment,
}

/// `true` when the statement passes the guard.
pub fn validate_sql(sql: &str) -> bool {
    check_sql(sql).is_ok()
}

/// Check a statement, returning the first violation found.
pub fn check_sql(sql: &str) -> Result<(), GuardViolation> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(GuardViolation::Empty);
    }

    if trimmed.contains("--") || trimmed.contains("/*") {
        return Err(GuardViolation::Comment);
    }

    // A single trailing semicolon is fine; anything after one is a second statement.
    let body = trimmed.trim_end_matches(';').trim_end();
    if body.contains(';') {
        return Err(GuardViolation::MultipleStatements);
    }

    let tokens: Vec<String> = body
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();

    let first = tokens.first().ok_or(GuardViolation::Empty)?;
    if !ALLOWED_LEADING_KEYWORDS.contains(&first.as_str()) || !starts_with_keyword(body, first) {
        return Err(GuardViolation::NotSelect(first.clone()));
    }

    if let Some(bad) = tokens
        .iter()
        .find(|t| DENIED_KEYWORDS.contains(&t.as_str()))
    {
        return Err(GuardViolation::DeniedKeyword(bad.clone()));
    }

    Ok(())
}

/// Reject things like `(select ...)` or `"select" ...` where the first token
/// is not literally the first word of the statement.
fn starts_with_keyword(body: &str, keyword: &str) -> bool {
    body.get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
}
