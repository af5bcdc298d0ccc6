//! Integration tests for generated SQL extraction and the table check.

use pypi_downloads_mcp::agent::TABLE_NAME;
use pypi_downloads_mcp::error::AgentError;
use pypi_downloads_mcp::tools::sql_validator::{
    Candidate, classify_candidate, extract_sql, validate_table_reference,
};

/// Test that a fenced block with a language tag yields its trimmed interior.
#[test]
fn test_extract_with_language_tag() {
    let text = "```sql\n\n  SELECT COUNT(*) FROM `bigquery-public-data.pypi.file_downloads`  \n```";
    assert_eq!(
        extract_sql(text),
        "SELECT COUNT(*) FROM `bigquery-public-data.pypi.file_downloads`"
    );
}

/// Test that a fenced block without a tag is handled the same way.
#[test]
fn test_extract_without_language_tag() {
    assert_eq!(extract_sql("```\nSELECT 1\n```"), "SELECT 1");
}

/// Test that surrounding prose is dropped and only the first block is used.
#[test]
fn test_extract_first_block_only() {
    let text = "Here is the query:\n```sql\nSELECT 1\n```\nand an alternative:\n```sql\nSELECT 2\n```";
    assert_eq!(extract_sql(text), "SELECT 1");
}

/// Test that unfenced input is returned unchanged, whitespace included.
#[test]
fn test_extract_unfenced_is_identity() {
    let text = "  SELECT 1\n";
    assert_eq!(extract_sql(text), text);
}

/// Test that an unterminated fence is not treated as a block.
#[test]
fn test_extract_unterminated_fence() {
    let text = "```sql\nSELECT 1";
    assert_eq!(extract_sql(text), text);
}

/// Test that the table check ignores case in both keyword and table name.
#[test]
fn test_table_check_case_insensitive() {
    for sql in [
        "SELECT * FROM `bigquery-public-data.pypi.file_downloads`",
        "select * from `bigquery-public-data.pypi.file_downloads`",
        "SELECT * From `BigQuery-Public-Data.PyPI.File_Downloads` LIMIT 1",
    ] {
        assert!(validate_table_reference(sql, TABLE_NAME).is_ok(), "{sql}");
    }
}

/// Test that references without backticks or to other tables are rejected.
#[test]
fn test_table_check_rejections() {
    for sql in [
        "SELECT * FROM bigquery-public-data.pypi.file_downloads",
        "SELECT * FROM `bigquery-public-data.pypi.simple_requests`",
        "SELECT 1",
        "SELECT * FROM\n`bigquery-public-data.pypi.file_downloads`",
    ] {
        let err = validate_table_reference(sql, TABLE_NAME).unwrap_err();
        assert!(matches!(err, AgentError::Validation { .. }), "{sql}");
        assert_eq!(
            err.to_string(),
            "Query must be against the `bigquery-public-data.pypi.file_downloads` table"
        );
    }
}

/// Test that the check is presence-only: a join to another table still passes.
#[test]
fn test_table_check_is_presence_only() {
    let sql = "SELECT * FROM `bigquery-public-data.pypi.file_downloads` d \
               JOIN `other.dataset.table` o ON d.project = o.project";
    assert!(validate_table_reference(sql, TABLE_NAME).is_ok());
}

/// Test how generator output is split into queries and prose replies.
#[test]
fn test_classify_candidates() {
    assert!(matches!(
        classify_candidate("```sql\nSELECT 1\n```"),
        Candidate::Query(_)
    ));
    assert!(matches!(classify_candidate("select 1"), Candidate::Query(_)));
    assert!(matches!(
        classify_candidate("WITH t AS (SELECT 1) SELECT * FROM t"),
        Candidate::Query(_)
    ));
    assert!(matches!(
        classify_candidate("Sorry, I can only help with PyPI downloads."),
        Candidate::Reply(_)
    ));
    // A word that merely starts with a keyword is prose
    assert!(matches!(
        classify_candidate("Selection of packages is not supported"),
        Candidate::Reply(_)
    ));
}

/// Test that the raw text is kept alongside the extracted statement.
#[test]
fn test_query_candidate_keeps_raw_text() {
    let raw = "```sql\nSELECT 1\n```";
    match classify_candidate(raw) {
        Candidate::Query(query) => {
            assert_eq!(query.raw, raw);
            assert_eq!(query.sql, "SELECT 1");
        }
        Candidate::Reply(text) => panic!("expected query, got reply {text}"),
    }
}
