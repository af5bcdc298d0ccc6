//! Shared test doubles for the query agent.

#![allow(dead_code)]

use pypi_downloads_mcp::agent::{NotifyLevel, ProgressNotifier};
use pypi_downloads_mcp::error::{AgentError, AgentResult};
use pypi_downloads_mcp::llm::Generator;
use pypi_downloads_mcp::models::{Message, QueryResult, Row};
use pypi_downloads_mcp::warehouse::Warehouse;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TABLE: &str = "bigquery-public-data.pypi.file_downloads";

pub const GOOD_SQL: &str = "```sql\nSELECT *\nFROM `bigquery-public-data.pypi.file_downloads`\nWHERE file.project = 'pydantic' AND DATE(timestamp) = current_date()\nLIMIT 1\n```";

pub const WRONG_TABLE_SQL: &str = "```sql\nSELECT * FROM `other-project.pypi.downloads` LIMIT 1\n```";

/// Generator that replays scripted responses and records every request.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    responses: Arc<Mutex<VecDeque<AgentResult<String>>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Arc::new(Mutex::new(
                responses.into_iter().map(|s| Ok(s.into())).collect(),
            )),
            requests: Arc::default(),
        }
    }

    pub fn failing(error: AgentError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from([Err(error)]))),
            requests: Arc::default(),
        }
    }

    /// Conversation histories received, one per generation request.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Generator for ScriptedGenerator {
    async fn generate(&self, _system_prompt: &str, history: &[Message]) -> AgentResult<String> {
        self.requests.lock().unwrap().push(history.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::generation("script exhausted")))
    }
}

/// Warehouse that replays scripted results and records executed SQL.
#[derive(Default)]
pub struct StubWarehouse {
    responses: Mutex<VecDeque<AgentResult<QueryResult>>>,
    executed: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl StubWarehouse {
    pub fn new(responses: impl IntoIterator<Item = AgentResult<QueryResult>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            executed: Mutex::default(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl Warehouse for StubWarehouse {
    async fn query(&self, sql: &str) -> AgentResult<QueryResult> {
        self.executed.lock().unwrap().push(sql.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(AgentError::internal("no scripted warehouse response")))
    }
}

/// Notifier that keeps every message it receives.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<(NotifyLevel, String)>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<(NotifyLevel, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events().into_iter().map(|(_, msg)| msg).collect()
    }
}

impl ProgressNotifier for RecordingNotifier {
    async fn notify(&self, level: NotifyLevel, message: &str) {
        self.events.lock().unwrap().push((level, message.to_string()));
    }
}

pub fn row(value: JsonValue) -> Row {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub fn result_with_rows(rows: Vec<JsonValue>) -> QueryResult {
    QueryResult::from_rows(rows.into_iter().map(row).collect())
}
