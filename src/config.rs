//! Configuration handling for the PyPI Downloads MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use clap::{Parser, ValueEnum};
use std::time::Duration;
use url::Url;

pub const DEFAULT_HTTP_HOST_LOCAL: &str = "127.0.0.1";
pub const DEFAULT_HTTP_HOST_CLOUD: &str = "0.0.0.0";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/mcp";
pub const DEFAULT_BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SAMPLING_MAX_TOKENS: u32 = 2048;

/// Environment variable whose presence marks a serverless (AWS Lambda) deployment.
pub const LAMBDA_MARKER_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Environment variable carrying service-account JSON credentials.
pub const SERVICE_ACCOUNT_ENV: &str = "SERVICE_ACCOUNT_CONTENT";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    Stdio,
    /// Streamable HTTP (for hosted deployments)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Where the server is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentEnvironment {
    /// Serverless host (AWS Lambda)
    Cloud,
    /// Developer machine or MCP client subprocess
    Local,
}

impl DeploymentEnvironment {
    /// Detect the environment from the process environment.
    pub fn detect() -> Self {
        Self::from_lambda_marker(std::env::var_os(LAMBDA_MARKER_ENV).is_some())
    }

    pub fn from_lambda_marker(present: bool) -> Self {
        if present { Self::Cloud } else { Self::Local }
    }

    /// Transport used when none is configured explicitly.
    pub fn default_transport(self) -> TransportMode {
        match self {
            Self::Cloud => TransportMode::Http,
            Self::Local => TransportMode::Stdio,
        }
    }

    pub fn default_http_host(self) -> &'static str {
        match self {
            Self::Cloud => DEFAULT_HTTP_HOST_CLOUD,
            Self::Local => DEFAULT_HTTP_HOST_LOCAL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cloud => "cloud",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for DeploymentEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the PyPI Downloads MCP Server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pypi-downloads-mcp",
    about = "MCP server that answers questions about PyPI package downloads using BigQuery",
    version,
    author
)]
pub struct Config {
    /// Transport mode (stdio or http). Defaults to http on AWS Lambda, stdio elsewhere.
    #[arg(short, long, value_enum, env = "MCP_TRANSPORT")]
    pub transport: Option<TransportMode>,

    /// HTTP host to bind to (only used with http transport)
    #[arg(long, env = "MCP_HTTP_HOST")]
    pub http_host: Option<String>,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Google Cloud project billed for queries. Defaults to the credentials' project.
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project: Option<String>,

    /// BigQuery job location (e.g. "US")
    #[arg(long, env = "BIGQUERY_LOCATION")]
    pub location: Option<String>,

    /// BigQuery REST API base URL
    #[arg(
        long,
        default_value = DEFAULT_BIGQUERY_ENDPOINT,
        env = "BIGQUERY_ENDPOINT"
    )]
    pub bigquery_endpoint: Url,

    /// Number of times a rejected query may be regenerated
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_RETRIES,
        env = "MCP_MAX_RETRIES"
    )]
    pub max_retries: u32,

    /// Warehouse query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Overall tool call timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_TOOL_TIMEOUT_SECS,
        env = "MCP_TOOL_TIMEOUT"
    )]
    pub tool_timeout: u64,

    /// Maximum tokens requested from the client's model per sampling call
    #[arg(
        long,
        default_value_t = DEFAULT_SAMPLING_MAX_TOKENS,
        env = "MCP_SAMPLING_MAX_TOKENS"
    )]
    pub max_tokens: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Service-account JSON used for BigQuery. Application default credentials are used when unset.
    #[arg(long, env = SERVICE_ACCOUNT_ENV, hide_env_values = true)]
    pub service_account_content: Option<String>,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            transport: None,
            http_host: None,
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            project: None,
            location: None,
            bigquery_endpoint: Url::parse(DEFAULT_BIGQUERY_ENDPOINT)
                .unwrap_or_else(|_| unreachable!("default endpoint is a valid URL")),
            max_retries: DEFAULT_MAX_RETRIES,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT_SECS,
            max_tokens: DEFAULT_SAMPLING_MAX_TOKENS,
            log_level: "info".to_string(),
            json_logs: false,
            service_account_content: None,
        }
    }

    /// Resolve the transport, falling back to the environment's default.
    pub fn resolved_transport(&self, env: DeploymentEnvironment) -> TransportMode {
        self.transport.unwrap_or_else(|| env.default_transport())
    }

    /// Resolve the HTTP host, falling back to the environment's default.
    pub fn resolved_http_host(&self, env: DeploymentEnvironment) -> String {
        self.http_host
            .clone()
            .unwrap_or_else(|| env.default_http_host().to_string())
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self, env: DeploymentEnvironment) -> String {
        format!("{}:{}", self.resolved_http_host(env), self.http_port)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the tool timeout as a Duration.
    pub fn tool_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.tool_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
