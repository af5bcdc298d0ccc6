//! Stdio transport for the MCP server.
//!
//! This transport uses standard input/output for communication,
//! which is how local MCP clients launch the server as a subprocess.

use crate::error::{AgentError, AgentResult};
use crate::mcp::PypiService;
use crate::tools::ToolSettings;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::info;

/// Stdio transport implementation.
///
/// This transport reads JSON-RPC messages from stdin and writes
/// responses to stdout. Logs go to stderr.
pub struct StdioTransport {
    settings: Arc<ToolSettings>,
}

impl StdioTransport {
    pub fn new(settings: Arc<ToolSettings>) -> Self {
        Self { settings }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> AgentResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = PypiService::new(self.settings.clone());

        let running_service = service.serve(stdio()).await.map_err(|e| {
            AgentError::internal(format!("Failed to start stdio transport: {}", e))
        })?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => {
                        info!("Stdio transport completed normally");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Stdio transport error");
                        return Err(AgentError::internal(format!(
                            "Stdio transport error: {}",
                            e
                        )));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            // tokio::select! cannot interrupt a blocking stdin read
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
