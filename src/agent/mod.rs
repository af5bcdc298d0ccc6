//! Query agent: turns a question into rows from the PyPI downloads table.
//!
//! The agent drives a small state machine:
//!
//! ```text
//! Generating -> Validating -> Executing -> Succeeded
//!      ^            |             |
//!      |            v             v
//!      +------- Retrying <--------+----> Failed
//! ```
//!
//! Candidates that miss the table reference, or that the warehouse rejects
//! as malformed, are handed back to the generator together with the reason.
//! Each hand-back costs one unit of [`RetryBudget`]. Any other failure ends
//! the call.

pub mod notify;
pub mod prompt;
pub mod state;

pub use notify::{NoopNotifier, NotifyLevel, ProgressNotifier};
pub use prompt::{SYSTEM_PROMPT, TABLE_NAME};
pub use state::{AgentState, RetryBudget};

use crate::config::{DEFAULT_MAX_RETRIES, DEFAULT_QUERY_TIMEOUT_SECS};
use crate::error::{AgentError, AgentResult};
use crate::llm::Generator;
use crate::models::{Message, QueryResult};
use crate::tools::format::format_rows_as_xml;
use crate::tools::sql_validator::{Candidate, classify_candidate, validate_table_reference};
use crate::warehouse::Warehouse;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const MSG_RUNNING_QUERY: &str = "running query";
pub const MSG_QUERY_SUCCESSFUL: &str = "query successful";
/// Sent when the warehouse rejects a query and a new one is requested.
pub const MSG_QUERY_RETRYING: &str = "query error retrying";

/// How an [`Answer`] was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKind {
    /// A query ran; the text holds its rows.
    Rows { row_count: usize },
    /// The generator replied in prose without writing a query.
    Reply,
    /// Every attempt was rejected.
    RetriesExhausted,
}

/// Final outcome of [`QueryAgent::answer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub kind: AnswerKind,
    /// Number of generation requests made
    pub attempts: u32,
}

impl Answer {
    fn rows(result: &QueryResult, attempts: u32) -> Self {
        Self {
            text: format_rows_as_xml(&result.rows),
            kind: AnswerKind::Rows {
                row_count: result.row_count(),
            },
            attempts,
        }
    }

    fn reply(text: String, attempts: u32) -> Self {
        Self {
            text,
            kind: AnswerKind::Reply,
            attempts,
        }
    }

    fn exhausted(error: &AgentError, attempts: u32) -> Self {
        Self {
            text: format!(
                "Unable to answer the question after {attempts} attempts. \
                 The last query was rejected: {error}"
            ),
            kind: AnswerKind::RetriesExhausted,
            attempts,
        }
    }
}

/// Answers download questions with a generator and a warehouse.
pub struct QueryAgent<G, W, N> {
    generator: G,
    warehouse: Arc<W>,
    notifier: N,
    max_retries: u32,
    query_timeout: Duration,
}

impl<G, W, N> QueryAgent<G, W, N>
where
    G: Generator,
    W: Warehouse,
    N: ProgressNotifier,
{
    pub fn new(generator: G, warehouse: Arc<W>, notifier: N) -> Self {
        Self {
            generator,
            warehouse,
            notifier,
            max_retries: DEFAULT_MAX_RETRIES,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    /// Set how many regenerations a single question may use.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Answer `question`.
    ///
    /// Recoverable rejections never escape: once the budget is spent the
    /// last rejection becomes an explanatory [`AnswerKind::RetriesExhausted`]
    /// answer. Terminal errors (generation, credentials, warehouse failures
    /// other than a bad request) are returned as `Err`.
    pub async fn answer(&self, question: &str) -> AgentResult<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::invalid_input("question must not be empty"));
        }

        let mut history = vec![Message::user(question)];
        let mut budget = RetryBudget::new(self.max_retries);
        let mut attempts = 0u32;
        let mut state = AgentState::Generating;

        loop {
            debug!(state = state.name(), attempts, "Agent step");
            state = match state {
                AgentState::Generating => {
                    attempts += 1;
                    match self.generator.generate(&SYSTEM_PROMPT, &history).await {
                        Ok(text) => match classify_candidate(&text) {
                            Candidate::Query(query) => AgentState::Validating(query),
                            Candidate::Reply(reply) => {
                                info!(attempts, "Generator replied without a query");
                                AgentState::Succeeded(Answer::reply(reply, attempts))
                            }
                        },
                        Err(e) => AgentState::Failed(e),
                    }
                }

                AgentState::Validating(query) => {
                    info!(attempt = attempts, sql = %query.sql, "Generated query");
                    match validate_table_reference(&query.sql, TABLE_NAME) {
                        Ok(()) => AgentState::Executing(query),
                        Err(error) => AgentState::Retrying {
                            candidate: query.raw,
                            error,
                        },
                    }
                }

                AgentState::Executing(query) => {
                    self.notifier.notify(NotifyLevel::Info, MSG_RUNNING_QUERY).await;
                    match self.execute(&query.sql).await {
                        Ok(result) => {
                            self.notifier
                                .notify(NotifyLevel::Info, MSG_QUERY_SUCCESSFUL)
                                .await;
                            AgentState::Succeeded(Answer::rows(&result, attempts))
                        }
                        Err(error) if error.is_retryable() => AgentState::Retrying {
                            candidate: query.raw,
                            error,
                        },
                        Err(error) => AgentState::Failed(error),
                    }
                }

                AgentState::Retrying { candidate, error } => {
                    if budget.try_consume() {
                        warn!(
                            attempt = attempts,
                            remaining = budget.remaining(),
                            error = %error,
                            "Query rejected, asking for a new one"
                        );
                        // Table-check misses retry silently
                        if matches!(error, AgentError::BadRequest { .. }) {
                            self.notifier
                                .notify(NotifyLevel::Warning, MSG_QUERY_RETRYING)
                                .await;
                        }
                        history.push(Message::assistant(candidate));
                        history.push(Message::retry_feedback(&error));
                        AgentState::Generating
                    } else {
                        warn!(attempts, error = %error, "Retry budget exhausted");
                        AgentState::Succeeded(Answer::exhausted(&error, attempts))
                    }
                }

                AgentState::Succeeded(answer) => return Ok(answer),
                AgentState::Failed(error) => return Err(error),
            };
        }
    }

    /// Run `sql` on its own task, bounded by the query timeout.
    async fn execute(&self, sql: &str) -> AgentResult<QueryResult> {
        let warehouse = Arc::clone(&self.warehouse);
        let sql = sql.to_string();
        let task = tokio::spawn(async move { warehouse.query(&sql).await });

        match tokio::time::timeout(self.query_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(AgentError::internal(format!(
                "Query task failed: {}",
                join_error
            ))),
            Err(_) => Err(AgentError::timeout(
                "query execution",
                self.query_timeout.as_secs(),
            )),
        }
    }
}
