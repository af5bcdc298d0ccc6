//! Generator backed by MCP sampling.
//!
//! The server does not hold model credentials. Instead it sends a
//! `sampling/createMessage` request to the connected client, which runs the
//! conversation through whatever model the client is configured with.

use crate::error::{AgentError, AgentResult};
use crate::llm::Generator;
use crate::models::{Message, MessageRole};
use rmcp::model::{Content, CreateMessageRequestParam, Role, SamplingMessage};
use rmcp::{Peer, RoleServer};
use tracing::debug;

/// Generator that asks the MCP client's model for each candidate.
#[derive(Clone)]
pub struct SamplingGenerator {
    peer: Peer<RoleServer>,
    max_tokens: u32,
}

impl SamplingGenerator {
    /// Create a generator for the session behind `peer`.
    pub fn new(peer: Peer<RoleServer>, max_tokens: u32) -> Self {
        Self { peer, max_tokens }
    }

    /// Whether the client declared the sampling capability during initialization.
    pub fn client_supports_sampling(&self) -> bool {
        self.peer
            .peer_info()
            .is_some_and(|info| info.capabilities.sampling.is_some())
    }

    fn request(&self, system_prompt: &str, history: &[Message]) -> CreateMessageRequestParam {
        CreateMessageRequestParam {
            messages: history.iter().map(to_sampling_message).collect(),
            model_preferences: None,
            system_prompt: Some(system_prompt.to_string()),
            include_context: None,
            temperature: None,
            max_tokens: self.max_tokens,
            stop_sequences: None,
            metadata: None,
        }
    }
}

impl Generator for SamplingGenerator {
    async fn generate(&self, system_prompt: &str, history: &[Message]) -> AgentResult<String> {
        if !self.client_supports_sampling() {
            return Err(AgentError::generation(
                "The MCP client does not support sampling, which this tool needs to write queries",
            ));
        }

        let result = self
            .peer
            .create_message(self.request(system_prompt, history))
            .await
            .map_err(|e| AgentError::generation(format!("Sampling request failed: {}", e)))?;

        debug!(
            model = %result.model,
            stop_reason = ?result.stop_reason,
            "Sampling response received"
        );

        result
            .message
            .content
            .as_text()
            .map(|text| text.text.clone())
            .ok_or_else(|| AgentError::generation("Sampling response did not contain text"))
    }
}

fn to_sampling_message(message: &Message) -> SamplingMessage {
    let role = match message.role {
        MessageRole::User => Role::User,
        MessageRole::Assistant => Role::Assistant,
    };
    SamplingMessage {
        role,
        content: Content::text(message.content.clone()),
    }
}
