//! The `pypi_downloads` MCP tool.
//!
//! Each call builds its own warehouse client, generator and retry budget, so
//! concurrent calls share nothing mutable.

use crate::agent::{NotifyLevel, ProgressNotifier, QueryAgent};
use crate::config::{Config, DeploymentEnvironment};
use crate::error::{AgentError, AgentResult};
use crate::llm::SamplingGenerator;
use crate::warehouse::{BigQueryClient, BigQuerySettings, CredentialSource};
use rmcp::model::{LoggingLevel, LoggingMessageNotificationParam};
use rmcp::{Peer, RoleServer};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info, info_span};

/// Logger name attached to progress notifications.
pub const NOTIFICATION_LOGGER: &str = "pypi_downloads";

/// Input for the pypi_downloads tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PypiDownloadsInput {
    /// Question about PyPI package downloads, e.g. "how many downloads did pydantic get last month?"
    pub question: String,
}

/// Settings shared by every invocation of the tool.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub bigquery: BigQuerySettings,
    pub environment: DeploymentEnvironment,
    pub max_retries: u32,
    pub tool_timeout: Duration,
    pub max_tokens: u32,
}

impl ToolSettings {
    pub fn from_config(
        config: &Config,
        environment: DeploymentEnvironment,
        credentials: CredentialSource,
    ) -> Self {
        Self {
            bigquery: BigQuerySettings {
                endpoint: config.bigquery_endpoint.clone(),
                project: config.project.clone(),
                location: config.location.clone(),
                credentials,
                query_timeout: config.query_timeout_duration(),
            },
            environment,
            max_retries: config.max_retries,
            tool_timeout: config.tool_timeout_duration(),
            max_tokens: config.max_tokens,
        }
    }
}

/// Sends progress as MCP `notifications/message` to the calling client.
#[derive(Clone)]
pub struct PeerNotifier {
    peer: Peer<RoleServer>,
}

impl PeerNotifier {
    pub fn new(peer: Peer<RoleServer>) -> Self {
        Self { peer }
    }
}

impl ProgressNotifier for PeerNotifier {
    async fn notify(&self, level: NotifyLevel, message: &str) {
        let param = LoggingMessageNotificationParam {
            level: match level {
                NotifyLevel::Info => LoggingLevel::Info,
                NotifyLevel::Warning => LoggingLevel::Warning,
            },
            logger: Some(NOTIFICATION_LOGGER.to_string()),
            data: serde_json::json!({ "msg": message }),
        };
        if let Err(e) = self.peer.notify_logging_message(param).await {
            debug!(error = %e, %level, notification = message, "Failed to deliver progress notification");
        }
    }
}

/// Handler for the pypi_downloads tool.
pub struct PypiDownloadsHandler {
    settings: Arc<ToolSettings>,
}

impl PypiDownloadsHandler {
    pub fn new(settings: Arc<ToolSettings>) -> Self {
        Self { settings }
    }

    /// Answer one question for the client behind `peer`.
    pub async fn answer(
        &self,
        peer: Peer<RoleServer>,
        input: PypiDownloadsInput,
    ) -> AgentResult<String> {
        let span = info_span!(
            "pypi_downloads",
            environment = %self.settings.environment,
        );
        async move {
            let settings = &self.settings;
            let warehouse = Arc::new(BigQueryClient::new(settings.bigquery.clone())?);
            let generator = SamplingGenerator::new(peer.clone(), settings.max_tokens);
            let agent = QueryAgent::new(generator, warehouse, PeerNotifier::new(peer))
                .with_max_retries(settings.max_retries)
                .with_query_timeout(settings.bigquery.query_timeout);

            info!(question = %input.question, "Answering question");
            let answer = tokio::time::timeout(settings.tool_timeout, agent.answer(&input.question))
                .await
                .map_err(|_| {
                    AgentError::timeout("pypi_downloads", settings.tool_timeout.as_secs())
                })??;

            info!(attempts = answer.attempts, kind = ?answer.kind, "Question answered");
            Ok(answer.text)
        }
        .instrument(span)
        .await
    }
}
