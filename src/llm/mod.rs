//! Language-model generation boundary.
//!
//! The query agent only needs one capability from a model: given a system
//! prompt and the conversation so far, return the next piece of text. This
//! module defines that seam and the MCP sampling implementation used in
//! production, where the connected client runs the model on the server's
//! behalf.

pub mod sampling;

pub use sampling::SamplingGenerator;

use crate::error::AgentResult;
use crate::models::Message;
use std::future::Future;

/// Produces the next candidate answer for a conversation.
pub trait Generator: Send + Sync {
    /// Generate text for `history` under `system_prompt`.
    ///
    /// `history` always starts with the user's question and alternates
    /// assistant candidates with corrective user feedback.
    fn generate(
        &self,
        system_prompt: &str,
        history: &[Message],
    ) -> impl Future<Output = AgentResult<String>> + Send;
}
