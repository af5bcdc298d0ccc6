//! Black-box fuzzing tests for the PyPI Downloads MCP Server.
//!
//! This test suite feeds random, malicious, and edge-case inputs through the
//! SQL extraction, validation, formatting and agent paths to discover panics.

mod common;

use common::{GOOD_SQL, ScriptedGenerator, StubWarehouse, row};
use pypi_downloads_mcp::agent::{AnswerKind, NoopNotifier, QueryAgent, TABLE_NAME};
use pypi_downloads_mcp::error::AgentError;
use pypi_downloads_mcp::models::QueryResult;
use pypi_downloads_mcp::tools::format::format_rows_as_xml;
use pypi_downloads_mcp::tools::sql_validator::{
    Candidate, classify_candidate, extract_sql, validate_table_reference,
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::json;
use std::sync::Arc;

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate various edge-case strings
fn edge_case_strings() -> Vec<String> {
    vec![
        String::new(),                           // Empty
        " ".to_string(),                         // Single space
        "\n\r\t".to_string(),                    // Whitespace chars
        "\0".to_string(),                        // Null byte
        "🚀".repeat(100),                        // Unicode
        "'OR 1=1--".to_string(),                 // SQL injection
        "'; DROP TABLE users--".to_string(),     // SQL injection
        "<script>alert(1)</script>".to_string(), // Markup
        "a".repeat(100_000),                     // Very long string
        random_string(100),
        random_string(1000),
        "\u{0000}\u{FFFF}".to_string(), // Special unicode
        "```".to_string(),
        "```\n```".to_string(),
        "``````".to_string(),
        "```sql\n".to_string(),
        "```sql\n```".to_string(),
        "```\u{00e9}\nSELECT 1\n```".to_string(), // Non-word tag
        format!("FROM `{TABLE_NAME}`"),
        format!("from `{}`", TABLE_NAME.to_uppercase()),
        "SELECT".to_string(),
        "WITH".to_string(),
        "(SELECT 1)".to_string(),
        "İ".repeat(50), // Lowercasing changes byte length
    ]
}

#[test]
fn fuzz_extract_and_classify() {
    for text in edge_case_strings() {
        let extracted = extract_sql(&text);
        assert!(extracted.len() <= text.len());

        match classify_candidate(&text) {
            Candidate::Query(query) => {
                assert_eq!(query.raw, text);
                assert_eq!(query.sql, extracted);
            }
            Candidate::Reply(reply) => assert_eq!(reply, text.trim()),
        }
    }
}

#[test]
fn fuzz_table_check_never_panics() {
    for text in edge_case_strings() {
        let result = validate_table_reference(&text, TABLE_NAME);
        if let Err(err) = result {
            assert!(matches!(err, AgentError::Validation { .. }));
        }
    }
}

#[test]
fn fuzz_table_check_accepts_padded_reference() {
    for _ in 0..100 {
        let sql = format!(
            "SELECT {} FROM `{TABLE_NAME}` WHERE x = '{}'",
            random_string(rand::thread_rng().gen_range(1..20)),
            random_string(rand::thread_rng().gen_range(0..50)),
        );
        assert!(validate_table_reference(&sql, TABLE_NAME).is_ok(), "{sql}");
    }
}

#[test]
fn fuzz_format_escapes_all_values() {
    for text in edge_case_strings() {
        let rows = vec![row(json!({ "value": text }))];
        let xml = format_rows_as_xml(&rows);
        let inner = xml
            .strip_prefix("<row>\n  <value>")
            .and_then(|s| s.strip_suffix("</value>\n</row>"))
            .unwrap();
        assert!(!inner.contains('<'));
        assert!(!inner.contains('>'));
    }
}

#[tokio::test]
async fn fuzz_agent_questions() {
    for question in edge_case_strings() {
        let generator = ScriptedGenerator::new([GOOD_SQL]);
        let warehouse = Arc::new(StubWarehouse::new([Ok(QueryResult::default())]));
        let agent = QueryAgent::new(generator, warehouse, NoopNotifier);

        match agent.answer(&question).await {
            Ok(answer) => {
                assert!(!question.trim().is_empty());
                assert_eq!(answer.kind, AnswerKind::Rows { row_count: 0 });
            }
            Err(err) => {
                assert!(question.trim().is_empty(), "unexpected error {err:?}");
                assert!(matches!(err, AgentError::InvalidInput { .. }));
            }
        }
    }
}

#[tokio::test]
async fn fuzz_agent_generator_output() {
    for output in edge_case_strings() {
        let generator = ScriptedGenerator::new([output.clone(), output.clone(), output.clone()]);
        let warehouse = Arc::new(StubWarehouse::new(
            (0..3).map(|_| Err(AgentError::bad_request("rejected", None))),
        ));
        let agent = QueryAgent::new(generator, warehouse, NoopNotifier);

        // Whatever the generator says, the agent settles on an answer
        let answer = agent.answer("downloads of pydantic").await.unwrap();
        assert!(answer.attempts >= 1 && answer.attempts <= 3);
    }
}
