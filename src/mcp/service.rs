//! MCP service implementation using rmcp.
//!
//! This module defines the PypiService struct exposing the `pypi_downloads`
//! tool via the MCP protocol using the rmcp framework's macros.

use crate::tools::{PypiDownloadsHandler, PypiDownloadsInput, ToolSettings};
use rmcp::{
    ErrorData as McpError, Peer, RoleServer, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct PypiService {
    /// Settings shared by every session
    settings: Arc<ToolSettings>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl PypiService {
    /// Create a new PypiService instance.
    pub fn new(settings: Arc<ToolSettings>) -> Self {
        Self {
            settings,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl PypiService {
    #[tool(
        description = "Analyze downloads of packages from the Python package index PyPI to answer questions about package downloads."
    )]
    async fn pypi_downloads(
        &self,
        Parameters(input): Parameters<PypiDownloadsInput>,
        peer: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let handler = PypiDownloadsHandler::new(self.settings.clone());
        let text = handler.answer(peer, input).await.map_err(McpError::from)?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

#[tool_handler]
impl ServerHandler for PypiService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_logging()
                .build(),
            server_info: Implementation {
                name: "pypi-downloads-mcp".to_owned(),
                title: Some("PyPI Downloads MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Answers questions about Python package downloads from PyPI.\n\
                \n\
                Call `pypi_downloads` with a plain-language question, for example \
                \"monthly downloads of pydantic by python version this year\". \
                The server writes and runs a BigQuery query against \
                `bigquery-public-data.pypi.file_downloads` and returns matching rows \
                as `<row>` elements.\n\
                \n\
                The tool uses MCP sampling to write queries, so the client must \
                support `sampling/createMessage`."
                    .to_string(),
            ),
        }
    }
}
