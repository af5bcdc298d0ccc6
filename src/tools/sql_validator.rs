//! Generated SQL extraction and structural validation.
//!
//! The generator returns free text that may wrap its SQL in a fenced markdown
//! block. This module pulls the statement out of that text and checks that it
//! queries the one table the tool is allowed to touch.
//!
//! The check is deliberately structural: it looks for a backtick-quoted
//! `FROM` clause naming the table and leaves syntax and semantics to the
//! warehouse. It does not prove that no other table is referenced.

use crate::error::{AgentError, AgentResult};
use regex::Regex;
use std::sync::LazyLock;

/// Matches a fenced block with an optional language tag: ```sql\n ... ```
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```\w*\n(.*?)```").unwrap_or_else(|e| unreachable!("invalid regex: {e}"))
});

/// A `FROM` followed by a backtick-quoted name, which prose does not contain.
static QUOTED_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bfrom\s+`").unwrap_or_else(|e| unreachable!("invalid regex: {e}"))
});

/// Statement keywords that mark unfenced text as SQL rather than prose.
const SQL_LEADING_KEYWORDS: &[&str] = &["select", "with"];

/// A candidate produced by one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Text that should be validated and executed.
    Query(GeneratedQuery),
    /// The generator answered in prose instead of writing a query.
    Reply(String),
}

/// One generated SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery {
    /// Text exactly as returned by the generator
    pub raw: String,
    /// Statement body with any markdown fencing removed
    pub sql: String,
}

/// Strip markdown fencing from generated text.
///
/// Returns the trimmed interior of the first fenced block, or the input
/// unchanged when no fenced block is present.
///
/// # Examples
///
/// ```
/// use pypi_downloads_mcp::tools::sql_validator::extract_sql;
///
/// assert_eq!(extract_sql("```sql\nSELECT 1\n```"), "SELECT 1");
/// assert_eq!(extract_sql("SELECT 1"), "SELECT 1");
/// ```
pub fn extract_sql(text: &str) -> &str {
    match FENCED_BLOCK.captures(text).and_then(|caps| caps.get(1)) {
        Some(body) => body.as_str().trim(),
        None => text,
    }
}

/// Decide whether generated text is a query or a prose reply.
///
/// Text is a query when it holds a fenced block, opens with `SELECT`/`WITH`
/// (after any leading comments and parentheses), or names a backtick-quoted
/// table in a `FROM` clause. Everything else is prose.
pub fn classify_candidate(text: &str) -> Candidate {
    if FENCED_BLOCK.is_match(text) || starts_with_sql_keyword(text) || QUOTED_FROM.is_match(text)
    {
        Candidate::Query(GeneratedQuery {
            raw: text.to_string(),
            sql: extract_sql(text).to_string(),
        })
    } else {
        Candidate::Reply(text.trim().to_string())
    }
}

fn starts_with_sql_keyword(text: &str) -> bool {
    let first_word = skip_leading_trivia(text)
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    SQL_LEADING_KEYWORDS
        .iter()
        .any(|kw| first_word.eq_ignore_ascii_case(kw))
}

/// Skip whitespace, `--`/`#` line comments, `/* */` block comments and
/// opening parentheses at the start of `text`.
fn skip_leading_trivia(mut text: &str) -> &str {
    loop {
        let trimmed = text.trim_start();
        if let Some(rest) = trimmed
            .strip_prefix("--")
            .or_else(|| trimmed.strip_prefix('#'))
        {
            text = rest.split_once('\n').map_or("", |(_, after)| after);
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            text = rest.split_once("*/").map_or("", |(_, after)| after);
        } else if let Some(rest) = trimmed.strip_prefix('(') {
            text = rest;
        } else {
            return trimmed;
        }
    }
}

/// The message fed back to the generator when the table check fails.
pub fn table_requirement_message(table: &str) -> String {
    format!("Query must be against the `{table}` table")
}

/// Check that `sql` selects from the backtick-quoted `table`, ignoring case.
///
/// # Examples
///
/// ```
/// use pypi_downloads_mcp::tools::sql_validator::validate_table_reference;
///
/// let table = "bigquery-public-data.pypi.file_downloads";
/// assert!(validate_table_reference(
///     "SELECT * FROM `bigquery-public-data.pypi.file_downloads` LIMIT 1",
///     table,
/// )
/// .is_ok());
/// assert!(validate_table_reference("SELECT * FROM other.table", table).is_err());
/// ```
pub fn validate_table_reference(sql: &str, table: &str) -> AgentResult<()> {
    let required = format!("from `{}`", table.to_lowercase());
    if sql.to_lowercase().contains(&required) {
        Ok(())
    } else {
        Err(AgentError::validation(table_requirement_message(table)))
    }
}
